//! Trial management
//!
//! Runs one or more training trials from a param space until their
//! stopping criteria are met, and answers questions about the results.

pub mod param_space;
pub mod result_grid;
pub mod stop;
pub mod tuner;

pub use param_space::ParamSpace;
pub use result_grid::{check_learning_achieved, Mode, ResultGrid, TrialResult, TrialStatus};
pub use stop::StopCriteria;
pub use tuner::{RunConfig, Tuner};
