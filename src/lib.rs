pub mod cli;
pub mod config;
pub mod data;
pub mod driver;
pub mod error;
pub mod rl;
pub mod tune;

pub use config::AppConfig;
pub use data::{unpack_data, MarketFrame};
pub use driver::{run, ManualRun, RunOutcome};
pub use error::{DrlError, Result};
pub use rl::algorithms::{get_trainable, AlgorithmConfig, Ppo, TrainResult};
pub use tune::{check_learning_achieved, ParamSpace, ResultGrid, RunConfig, StopCriteria, Tuner};
