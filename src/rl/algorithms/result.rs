//! Training iteration results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Learner statistics averaged over the minibatch updates of an iteration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearnerStats {
    pub policy_loss: f32,
    pub vf_loss: f32,
    pub entropy: f32,
    pub kl: f32,
    pub cur_kl_coeff: f32,
    pub cur_lr: f64,
    pub total_loss: f32,
    pub num_minibatches: usize,
}

/// Result of one `train()` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainResult {
    pub training_iteration: u64,
    pub timesteps_total: u64,
    pub timesteps_this_iter: u64,
    pub episodes_total: u64,
    pub episodes_this_iter: u64,
    /// Mean over the smoothing window; `None` until an episode completes
    pub episode_reward_mean: Option<f64>,
    pub episode_reward_min: Option<f64>,
    pub episode_reward_max: Option<f64>,
    pub episode_len_mean: Option<f64>,
    pub info: LearnerStats,
    pub time_this_iter_s: f64,
    pub time_total_s: f64,
    pub date: DateTime<Utc>,
}

impl TrainResult {
    /// Look up a numeric metric by name
    pub fn metric(&self, name: &str) -> Option<f64> {
        match name {
            "training_iteration" => Some(self.training_iteration as f64),
            "timesteps_total" => Some(self.timesteps_total as f64),
            "timesteps_this_iter" => Some(self.timesteps_this_iter as f64),
            "episodes_total" => Some(self.episodes_total as f64),
            "episodes_this_iter" => Some(self.episodes_this_iter as f64),
            "episode_reward_mean" => self.episode_reward_mean,
            "episode_reward_min" => self.episode_reward_min,
            "episode_reward_max" => self.episode_reward_max,
            "episode_len_mean" => self.episode_len_mean,
            "time_total_s" => Some(self.time_total_s),
            _ => None,
        }
    }
}

/// Indented JSON rendering of a result
pub fn pretty_print(result: &TrainResult) -> String {
    serde_json::to_string_pretty(result).unwrap_or_else(|_| format!("{:#?}", result))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> TrainResult {
        TrainResult {
            training_iteration: 3,
            timesteps_total: 12_000,
            timesteps_this_iter: 4000,
            episodes_total: 5,
            episodes_this_iter: 2,
            episode_reward_mean: Some(0.25),
            episode_reward_min: Some(-0.1),
            episode_reward_max: Some(0.6),
            episode_len_mean: Some(240.0),
            info: LearnerStats::default(),
            time_this_iter_s: 1.5,
            time_total_s: 4.5,
            date: Utc::now(),
        }
    }

    #[test]
    fn test_metric_lookup() {
        let r = result();
        assert_eq!(r.metric("training_iteration"), Some(3.0));
        assert_eq!(r.metric("episode_reward_mean"), Some(0.25));
        assert_eq!(r.metric("unknown"), None);
    }

    #[test]
    fn test_pretty_print() {
        let text = pretty_print(&result());
        assert!(text.contains("\"timesteps_total\": 12000"));
        assert!(text.contains("\n  \"info\""));
    }
}
