//! RL Configuration
//!
//! Configuration structs for the PPO learner, rollouts and the trading
//! environment.

use serde::{Deserialize, Serialize};

/// PPO algorithm hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PPOConfig {
    /// Learning rate
    pub lr: f64,
    /// Discount factor (gamma)
    pub gamma: f32,
    /// GAE lambda
    pub lambda: f32,
    /// PPO clip range for the policy ratio
    pub clip_param: f32,
    /// Clip for the squared value error
    pub vf_clip_param: f32,
    /// Value function coefficient
    pub vf_loss_coeff: f32,
    /// Entropy bonus coefficient
    pub entropy_coeff: f32,
    /// Initial KL penalty coefficient
    pub kl_coeff: f32,
    /// Target KL divergence for the adaptive penalty
    pub kl_target: f32,
    /// Env steps collected per training iteration
    pub train_batch_size: usize,
    /// Mini-batch size
    pub sgd_minibatch_size: usize,
    /// Number of SGD epochs per iteration
    pub num_sgd_iter: usize,
    /// Maximum global gradient norm
    pub grad_clip: Option<f32>,
    /// Episodes averaged into the reported episode statistics
    pub metrics_num_episodes_for_smoothing: usize,
}

impl Default for PPOConfig {
    fn default() -> Self {
        Self {
            lr: 5e-5,
            gamma: 0.99,
            lambda: 1.0,
            clip_param: 0.3,
            vf_clip_param: 10.0,
            vf_loss_coeff: 1.0,
            entropy_coeff: 0.0,
            kl_coeff: 0.2,
            kl_target: 0.01,
            train_batch_size: 4000,
            sgd_minibatch_size: 128,
            num_sgd_iter: 30,
            grad_clip: None,
            metrics_num_episodes_for_smoothing: 100,
        }
    }
}

/// Rollout collection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolloutConfig {
    /// Number of remote rollout workers (0 = sample on the local worker)
    pub num_rollout_workers: usize,
    /// Base seed for environments and action sampling
    pub seed: Option<u64>,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            num_rollout_workers: 1,
            seed: None,
        }
    }
}

/// Trading environment settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingEnvSettings {
    /// Starting cash
    pub initial_capital: f64,
    /// Transaction cost (fraction of notional)
    pub transaction_cost: f64,
    /// Episode truncation length
    pub max_episode_steps: Option<usize>,
    /// Start each episode at a random bar
    pub random_start: bool,
    /// Normalization applied to the bar features
    pub normalization: NormalizationMethod,
}

impl Default for TradingEnvSettings {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            transaction_cost: 0.0003,
            max_episode_steps: None,
            random_start: false,
            normalization: NormalizationMethod::ZScore,
        }
    }
}

/// Normalization methods for state features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMethod {
    /// No normalization
    None,
    /// Min-max scaling to [0, 1]
    MinMax,
    /// Z-score standardization
    ZScore,
}
