use thiserror::Error;

/// Main error type for the training driver
#[derive(Error, Debug)]
pub enum DrlError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Market data errors
    #[error("Invalid market data: {0}")]
    InvalidMarketData(String),

    // Registry lookups
    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Unknown custom model: {0}")]
    UnknownModel(String),

    // State machine errors
    #[error("Invalid state: {0}")]
    InvalidState(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // Model persistence
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Tensor error: {0}")]
    Tensor(String),

    #[error("`stop-reward` of {target} not reached! (best episode_reward_mean: {best})")]
    LearningNotAchieved { target: f64, best: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Result type alias for DrlError
pub type Result<T> = std::result::Result<T, DrlError>;
