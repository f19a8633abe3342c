//! Trading Environments for RL Training
//!
//! A gym-like reset/step contract and the TDX trading environment that
//! implements it over a [`MarketFrame`].

mod tdx_raw;

pub use tdx_raw::TdxRawEnv;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::data::MarketFrame;
use crate::error::Result;
use crate::rl::config::TradingEnvSettings;

/// Sequential decision process consumed by rollout workers
pub trait Environment: Send {
    /// Length of the observation vector
    fn observation_dim(&self) -> usize;

    /// Number of discrete actions
    fn num_actions(&self) -> usize;

    /// Start a new episode, optionally reseeding
    fn reset(&mut self, seed: Option<u64>) -> Vec<f32>;

    /// Apply an action
    fn step(&mut self, action: usize) -> Result<StepResult>;
}

/// Result of taking a step in the environment
#[derive(Debug, Clone)]
pub struct StepResult {
    /// New observation after action
    pub observation: Vec<f32>,
    /// Reward signal
    pub reward: f32,
    /// Episode ended by the environment (data exhausted, bankruptcy)
    pub terminated: bool,
    /// Episode cut by the step limit
    pub truncated: bool,
    /// Additional info
    pub info: StepInfo,
}

impl StepResult {
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Additional step information
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StepInfo {
    /// Cash plus marked-to-market position
    pub net_worth: f64,
    /// Shares held
    pub position: f64,
    /// Cash balance
    pub cash: f64,
    /// Steps taken this episode
    pub step: usize,
    /// Completed round trips
    pub num_trades: usize,
}

/// Environment configuration: the data feed plus trading settings
#[derive(Clone, Serialize)]
pub struct EnvConfig {
    #[serde(skip)]
    pub data: Arc<MarketFrame>,
    /// Column labels of `data`
    pub columns: Vec<String>,
    #[serde(flatten)]
    pub settings: TradingEnvSettings,
}

impl EnvConfig {
    pub fn new(frame: MarketFrame, settings: TradingEnvSettings) -> Self {
        let columns = frame.columns().to_vec();
        Self {
            data: Arc::new(frame),
            columns,
            settings,
        }
    }
}

impl fmt::Debug for EnvConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvConfig")
            .field("rows", &self.data.len())
            .field("columns", &self.columns)
            .field("settings", &self.settings)
            .finish()
    }
}

/// Per-instance context passed to an environment creator
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvContext {
    pub worker_index: usize,
    pub num_workers: usize,
    pub seed: Option<u64>,
}

/// Factory for environment instances
pub type EnvCreator =
    Arc<dyn Fn(&EnvConfig, &EnvContext) -> Result<Box<dyn Environment>> + Send + Sync>;
