//! Algorithm Checkpointing
//!
//! A checkpoint is a directory holding the policy weights (burn named
//! MessagePack record) and a JSON file with the algorithm counters.

use std::fs;
use std::path::{Path, PathBuf};

use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{DrlError, Result};

/// Weights file stem inside a checkpoint directory
pub const MODEL_FILE: &str = "policy";
/// Counter file inside a checkpoint directory
pub const STATE_FILE: &str = "algorithm_state.json";

/// Counters persisted alongside the weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmState {
    pub algorithm: String,
    pub training_iteration: u64,
    pub timesteps_total: u64,
    pub episodes_total: u64,
    pub kl_coeff: f32,
    pub lr: f64,
    pub saved_at: chrono::DateTime<chrono::Utc>,
}

/// Reads and writes checkpoint directories
pub struct Checkpointer {
    dir: PathBuf,
}

impl Checkpointer {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Weights path (the recorder appends `.mpk`)
    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    pub fn exists(&self) -> bool {
        self.state_path().exists() && self.model_path().with_extension("mpk").exists()
    }

    /// Save weights and counters
    pub fn save<B, M>(&self, model: &M, state: &AlgorithmState) -> Result<PathBuf>
    where
        B: Backend,
        M: Module<B>,
    {
        fs::create_dir_all(&self.dir)?;

        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        model
            .clone()
            .save_file(self.model_path(), &recorder)
            .map_err(|e| DrlError::Checkpoint(format!("failed to save weights: {}", e)))?;

        fs::write(self.state_path(), serde_json::to_vec_pretty(state)?)?;

        info!("Saved checkpoint to {:?}", self.dir);
        Ok(self.dir.clone())
    }

    /// Load weights into `model` and read the counters
    pub fn load<B, M>(&self, model: M, device: &B::Device) -> Result<(M, AlgorithmState)>
    where
        B: Backend,
        M: Module<B>,
    {
        if !self.exists() {
            return Err(DrlError::Checkpoint(format!(
                "checkpoint not found: {:?}",
                self.dir
            )));
        }

        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let model = model
            .load_file(self.model_path(), &recorder, device)
            .map_err(|e| DrlError::Checkpoint(format!("failed to load weights: {}", e)))?;

        let state: AlgorithmState = serde_json::from_slice(&fs::read(self.state_path())?)?;

        info!("Restored checkpoint from {:?}", self.dir);
        Ok((model, state))
    }
}

/// Checkpoint directory name for an iteration
pub fn iteration_name(iteration: u64) -> String {
    format!("checkpoint_{:06}", iteration)
}

/// Name with a UTC timestamp suffix
pub fn timestamped_name(prefix: &str) -> String {
    let now = chrono::Utc::now();
    format!("{}_{}", prefix, now.format("%Y-%m-%d_%H-%M-%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;

    #[test]
    fn test_paths() {
        let checkpointer = Checkpointer::new(temp_dir().join("test_ckpt_paths"));
        assert!(checkpointer.model_path().ends_with("policy"));
        assert!(checkpointer.state_path().ends_with(STATE_FILE));
    }

    #[test]
    fn test_missing_checkpoint() {
        let dir = temp_dir().join(format!("missing_ckpt_{}", uuid::Uuid::new_v4()));
        assert!(!Checkpointer::new(dir).exists());
    }

    #[test]
    fn test_names() {
        assert_eq!(iteration_name(12), "checkpoint_000012");
        assert!(timestamped_name("PPO").starts_with("PPO_"));
    }
}
