//! Stopping criteria for trials

use serde::{Deserialize, Serialize};

use crate::rl::algorithms::TrainResult;

/// Thresholds that end a trial; any one reached stops it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopCriteria {
    pub training_iteration: Option<u64>,
    pub timesteps_total: Option<u64>,
    pub episode_reward_mean: Option<f64>,
}

impl StopCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_training_iteration(mut self, iterations: u64) -> Self {
        self.training_iteration = Some(iterations);
        self
    }

    pub fn with_timesteps_total(mut self, timesteps: u64) -> Self {
        self.timesteps_total = Some(timesteps);
        self
    }

    pub fn with_episode_reward_mean(mut self, reward: f64) -> Self {
        self.episode_reward_mean = Some(reward);
        self
    }

    /// No threshold set
    pub fn is_empty(&self) -> bool {
        self.training_iteration.is_none()
            && self.timesteps_total.is_none()
            && self.episode_reward_mean.is_none()
    }

    /// Name of the first criterion met by `result`
    pub fn triggered(&self, result: &TrainResult) -> Option<&'static str> {
        if let Some(limit) = self.training_iteration {
            if result.training_iteration >= limit {
                return Some("training_iteration");
            }
        }
        if let Some(limit) = self.timesteps_total {
            if result.timesteps_total >= limit {
                return Some("timesteps_total");
            }
        }
        if let (Some(target), Some(mean)) = (self.episode_reward_mean, result.episode_reward_mean)
        {
            if mean >= target {
                return Some("episode_reward_mean");
            }
        }
        None
    }

    pub fn should_stop(&self, result: &TrainResult) -> bool {
        self.triggered(result).is_some()
    }
}
