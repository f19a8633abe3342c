//! Training Infrastructure
//!
//! Rollout workers, episode metrics and checkpointing.

pub mod checkpointing;
pub mod metrics;
pub mod worker;

pub use checkpointing::{AlgorithmState, Checkpointer};
pub use metrics::{EpisodeStats, EpisodeWindow};
pub use worker::{EpisodeSummary, Fragment, RolloutWorker, WorkerSet};
