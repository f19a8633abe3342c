//! Trial results and experiment-level queries

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{DrlError, Result};
use crate::rl::algorithms::TrainResult;

/// Final state of a trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrialStatus {
    Terminated,
    Error,
}

impl fmt::Display for TrialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            TrialStatus::Terminated => "TERMINATED",
            TrialStatus::Error => "ERROR",
        })
    }
}

/// Optimization direction for best-result lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Max,
    Min,
}

/// Outcome of one trial
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial_id: String,
    pub config: serde_json::Value,
    pub last_result: Option<TrainResult>,
    pub status: TrialStatus,
    pub error: Option<String>,
    pub checkpoint: Option<PathBuf>,
    pub path: PathBuf,
}

impl TrialResult {
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.last_result.as_ref().and_then(|r| r.metric(name))
    }
}

/// All trial results of one `fit()`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultGrid {
    pub experiment_path: PathBuf,
    pub results: Vec<TrialResult>,
}

impl ResultGrid {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrialResult> {
        self.results.iter()
    }

    pub fn num_errors(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == TrialStatus::Error)
            .count()
    }

    pub fn num_terminated(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == TrialStatus::Terminated)
            .count()
    }

    /// Trial with the best last-reported `metric`; trials without it are skipped
    pub fn get_best_result(&self, metric: &str, mode: Mode) -> Option<&TrialResult> {
        self.results
            .iter()
            .filter_map(|r| r.metric(metric).map(|value| (r, value)))
            .filter(|(_, value)| !value.is_nan())
            .max_by(|(_, a), (_, b)| {
                let ord = a.total_cmp(b);
                match mode {
                    Mode::Max => ord,
                    Mode::Min => ord.reverse(),
                }
            })
            .map(|(r, _)| r)
    }
}

/// Fail unless some trial reached `min_reward` mean episode reward
pub fn check_learning_achieved(grid: &ResultGrid, min_reward: f64) -> Result<()> {
    let best = grid
        .get_best_result("episode_reward_mean", Mode::Max)
        .and_then(|r| r.metric("episode_reward_mean"));

    match best {
        Some(value) if value >= min_reward => {
            info!("ok: episode_reward_mean {} >= {}", value, min_reward);
            Ok(())
        }
        other => Err(DrlError::LearningNotAchieved {
            target: min_reward,
            best: other.map_or_else(|| "n/a".to_string(), |v| v.to_string()),
        }),
    }
}
