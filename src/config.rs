use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::rl::config::{PPOConfig, RolloutConfig, TradingEnvSettings};
use crate::rl::networks::ModelSpec;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Trading environment settings
    pub env: TradingEnvSettings,
    /// PPO hyperparameters used as the base config
    pub ppo: PPOConfig,
    /// Rollout workers and seeding
    pub rollouts: RolloutConfig,
    /// Network architecture
    pub model: ModelSpec,
    /// Trial manager settings
    pub tune: TuneSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuneSettings {
    /// Root directory for experiment results
    pub storage_path: PathBuf,
    /// Experiment directory name (default: `<run>_<timestamp>`)
    pub experiment_name: Option<String>,
    /// Repeats of the param grid
    pub num_samples: usize,
    /// Learning rates to grid-search (empty = use `ppo.lr`)
    pub lr_grid: Vec<f64>,
    /// Trials trained at once (0 = all)
    pub max_concurrent_trials: usize,
    /// Save a checkpoint when a trial ends
    pub checkpoint_at_end: bool,
    /// Trial logging verbosity (0-2)
    pub verbose: u8,
}

impl Default for TuneSettings {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("./drl_results"),
            experiment_name: None,
            num_samples: 1,
            lr_grid: Vec::new(),
            max_concurrent_trials: 0,
            checkpoint_at_end: true,
            verbose: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load defaults, then environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from an optional file and the environment
    ///
    /// Sources, lowest precedence first: built-in defaults, the TOML file
    /// (required when given), `DRL_`-prefixed variables such as
    /// `DRL_PPO__LR=0.001` (sections and keys split on `__`).
    pub fn load_from(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(config_file, env_overrides())
    }

    fn load_with(config_file: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?;

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder.add_source(env).build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.env.initial_capital <= 0.0 {
            errors.push("env.initial_capital must be positive".to_string());
        }
        if !(0.0..1.0).contains(&self.env.transaction_cost) {
            errors.push("env.transaction_cost must be in [0, 1)".to_string());
        }
        if self.env.max_episode_steps == Some(0) {
            errors.push("env.max_episode_steps must be positive when set".to_string());
        }
        if self.tune.num_samples == 0 {
            errors.push("tune.num_samples must be at least 1".to_string());
        }
        if self.tune.lr_grid.iter().any(|lr| !(lr.is_finite() && *lr > 0.0)) {
            errors.push(format!(
                "tune.lr_grid values must be positive, got {:?}",
                self.tune.lr_grid
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn env_overrides() -> Environment {
    Environment::with_prefix("DRL")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;

    #[test]
    fn test_defaults_without_file() {
        let config = AppConfig::load_from(None).unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.tune.num_samples, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_overrides() {
        let path = temp_dir().join(format!("drl_config_{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"
[env]
initial_capital = 50000.0
normalization = "min_max"

[ppo]
train_batch_size = 512
sgd_minibatch_size = 64

[model]
fcnet_hiddens = [64, 64]

[tune]
lr_grid = [0.001, 0.0001]
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.env.initial_capital, 50_000.0);
        assert_eq!(config.ppo.train_batch_size, 512);
        assert_eq!(config.ppo.num_sgd_iter, 30);
        assert_eq!(config.model.fcnet_hiddens, vec![64, 64]);
        assert_eq!(config.tune.lr_grid, vec![0.001, 0.0001]);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_env_overrides_use_single_underscore_prefix() {
        let vars: config::Map<String, String> = [
            ("DRL_PPO__LR".to_string(), "0.123".to_string()),
            ("DRL_TUNE__NUM_SAMPLES".to_string(), "3".to_string()),
        ]
        .into_iter()
        .collect();

        let config = AppConfig::load_with(None, env_overrides().source(Some(vars))).unwrap();
        assert_eq!(config.ppo.lr, 0.123);
        assert_eq!(config.tune.num_samples, 3);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let path = temp_dir().join("drl_config_does_not_exist.toml");
        assert!(AppConfig::load_from(Some(&path)).is_err());
    }

    #[test]
    fn test_validate_collects_errors() {
        let mut config = AppConfig::default();
        config.env.initial_capital = 0.0;
        config.tune.num_samples = 0;
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
