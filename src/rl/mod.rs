//! Reinforcement Learning Module
//!
//! PPO training over the TDX trading environment using the Burn framework.
//!
//! # Layout
//!
//! - **core**: action space and observation encoding
//! - **environment**: reset/step contract and `TdxRawEnv`
//! - **networks**: fully connected policy/value net and the model catalog
//! - **memory**: on-policy sample batches with GAE
//! - **training**: rollout workers, episode metrics, checkpoints
//! - **algorithms**: registry, config builder, PPO

pub mod algorithms;
pub mod config;
pub mod core;
pub mod environment;
pub mod memory;
pub mod networks;
pub mod training;

use burn::prelude::*;

use crate::error::{DrlError, Result};

/// Backend for rollouts and evaluation
pub type InferenceBackend = burn_ndarray::NdArray<f32>;
/// Backend for gradient updates
pub type TrainBackend = burn::backend::Autodiff<InferenceBackend>;

// Config exports
pub use config::{NormalizationMethod, PPOConfig, RolloutConfig, TradingEnvSettings};

// Core exports
pub use core::{AccountState, ObservationEncoder, TradeAction, NUM_ACTIONS};

// Environment exports
pub use environment::{
    EnvConfig, EnvContext, EnvCreator, Environment, StepInfo, StepResult, TdxRawEnv,
};

// Model exports
pub use networks::{FcNet, FcNetConfig, ModelCatalog, ModelSpec};

// Algorithm exports
pub use algorithms::{
    get_trainable, pretty_print, AlgorithmConfig, Framework, Ppo, TrainResult,
    TrainingOverrides,
};

/// Copy a float tensor to host memory
pub(crate) fn tensor_to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| DrlError::Tensor(format!("{:?}", e)))
}
