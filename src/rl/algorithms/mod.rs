//! RL Algorithms
//!
//! Algorithm registry, configuration builder and the PPO implementation.

pub mod config;
pub mod ppo;
pub mod result;

pub use config::{AlgorithmConfig, EnvSpec, Framework, TrainingOverrides};
pub use ppo::{update_kl_coeff, Ppo};
pub use result::{pretty_print, LearnerStats, TrainResult};

use crate::error::{DrlError, Result};

/// Id of the PPO algorithm
pub const PPO: &str = "PPO";

/// Algorithm ids that can be trained
pub const REGISTERED_ALGORITHMS: &[&str] = &[PPO];

/// Default configuration for a registered algorithm id
pub fn get_trainable(run: &str) -> Result<AlgorithmConfig> {
    match run {
        PPO => Ok(AlgorithmConfig::ppo()),
        other => Err(DrlError::UnknownAlgorithm(format!(
            "{} (registered: {})",
            other,
            REGISTERED_ALGORITHMS.join(", ")
        ))),
    }
}
