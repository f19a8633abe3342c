//! Action Space
//!
//! Discrete trading actions for the single-instrument environment.

use serde::{Deserialize, Serialize};

/// Number of discrete actions
pub const NUM_ACTIONS: usize = 3;

/// Action that can be taken in the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeAction {
    /// Do nothing
    Hold,
    /// Spend all cash on shares
    Buy,
    /// Sell the whole position
    Sell,
}

impl TradeAction {
    pub fn index(self) -> usize {
        match self {
            TradeAction::Hold => 0,
            TradeAction::Buy => 1,
            TradeAction::Sell => 2,
        }
    }

    pub fn all() -> [TradeAction; NUM_ACTIONS] {
        [TradeAction::Hold, TradeAction::Buy, TradeAction::Sell]
    }
}

impl From<usize> for TradeAction {
    fn from(action: usize) -> Self {
        match action {
            1 => TradeAction::Buy,
            2 => TradeAction::Sell,
            _ => TradeAction::Hold,
        }
    }
}
