//! Core RL abstractions
//!
//! Fundamental types for state representation and actions.

pub mod action;
pub mod state;

pub use action::{TradeAction, NUM_ACTIONS};
pub use state::{AccountState, ObservationEncoder, ACCOUNT_FEATURES};
