//! State Representation
//!
//! Encodes a bar of the market frame plus the account state into the
//! observation vector seen by the policy.

use crate::data::{ColumnStats, MarketFrame};
use crate::rl::config::NormalizationMethod;

/// Account features appended after the bar features
pub const ACCOUNT_FEATURES: usize = 3;

/// Account state at one step
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AccountState {
    /// Whether shares are held
    pub holding: bool,
    /// Return of the open position relative to its entry price
    pub unrealized_return: f64,
    /// Cash relative to initial capital
    pub cash_ratio: f64,
}

/// Per-column normalizer fitted on a whole frame
#[derive(Debug, Clone)]
pub struct ObservationEncoder {
    method: NormalizationMethod,
    stats: Vec<ColumnStats>,
}

impl ObservationEncoder {
    pub fn fit(frame: &MarketFrame, method: NormalizationMethod) -> Self {
        Self {
            method,
            stats: frame.column_stats(),
        }
    }

    /// Observation dimension for this frame
    pub fn dim(&self) -> usize {
        self.stats.len() + ACCOUNT_FEATURES
    }

    pub fn encode(&self, row: &[f64], account: &AccountState) -> Vec<f32> {
        let mut obs = Vec::with_capacity(self.dim());

        for (value, stats) in row.iter().zip(&self.stats) {
            obs.push(self.normalize(*value, stats) as f32);
        }

        obs.push(if account.holding { 1.0 } else { 0.0 });
        obs.push(account.unrealized_return as f32);
        obs.push(account.cash_ratio as f32);

        obs
    }

    fn normalize(&self, value: f64, stats: &ColumnStats) -> f64 {
        match self.method {
            NormalizationMethod::None => value,
            NormalizationMethod::ZScore => {
                if stats.std > f64::EPSILON {
                    (value - stats.mean) / stats.std
                } else {
                    0.0
                }
            }
            NormalizationMethod::MinMax => {
                let range = stats.max - stats.min;
                if range > f64::EPSILON {
                    (value - stats.min) / range
                } else {
                    0.0
                }
            }
        }
    }
}
