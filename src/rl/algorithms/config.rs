//! Algorithm configuration builder
//!
//! Chainable settings for an algorithm: environment, framework, rollout
//! workers, training hyperparameters, resources and debugging options.

use std::fmt;
use std::sync::Mutex;

use burn::optim::{AdamConfig, Optimizer};
use burn::prelude::Backend;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::ppo::Ppo;
use crate::error::{DrlError, Result};
use crate::rl::config::{PPOConfig, RolloutConfig};
use crate::rl::environment::{EnvConfig, EnvContext, EnvCreator};
use crate::rl::networks::{FcNet, ModelCatalog, ModelSpec};
use crate::rl::training::{RolloutWorker, WorkerSet};
use crate::rl::TrainBackend;

/// Held while seeding the backend and initializing weights; the backend
/// RNG is process-global and shared by concurrently built trials.
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Deep learning framework requested on the command line
///
/// All frameworks run on the same burn backend; the value is recorded in
/// the config for reporting.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    Tf,
    Tf2,
    #[default]
    Torch,
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Framework::Tf => "tf",
            Framework::Tf2 => "tf2",
            Framework::Torch => "torch",
        };
        write!(f, "{}", name)
    }
}

/// Named environment factory
#[derive(Clone)]
pub struct EnvSpec {
    pub name: String,
    pub creator: EnvCreator,
}

impl fmt::Debug for EnvSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvSpec").field("name", &self.name).finish()
    }
}

/// Partial update of the training section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingOverrides {
    pub lr: Option<f64>,
    pub gamma: Option<f32>,
    pub lambda: Option<f32>,
    pub train_batch_size: Option<usize>,
    pub sgd_minibatch_size: Option<usize>,
    pub num_sgd_iter: Option<usize>,
    pub entropy_coeff: Option<f32>,
    pub model: Option<ModelSpec>,
}

impl TrainingOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lr(mut self, lr: f64) -> Self {
        self.lr = Some(lr);
        self
    }

    pub fn with_train_batch_size(mut self, size: usize) -> Self {
        self.train_batch_size = Some(size);
        self
    }

    pub fn with_sgd_minibatch_size(mut self, size: usize) -> Self {
        self.sgd_minibatch_size = Some(size);
        self
    }

    pub fn with_num_sgd_iter(mut self, iters: usize) -> Self {
        self.num_sgd_iter = Some(iters);
        self
    }

    pub fn with_model(mut self, model: ModelSpec) -> Self {
        self.model = Some(model);
        self
    }
}

/// Full algorithm configuration
#[derive(Debug, Clone, Serialize)]
pub struct AlgorithmConfig {
    /// Registered algorithm id
    pub algorithm: String,
    /// Environment name (the factory itself is not serialized)
    pub env: Option<String>,
    #[serde(skip)]
    pub env_spec: Option<EnvSpec>,
    pub env_config: Option<EnvConfig>,
    pub framework: Framework,
    #[serde(flatten)]
    pub rollouts: RolloutConfig,
    #[serde(flatten)]
    pub ppo: PPOConfig,
    pub model: ModelSpec,
    pub num_gpus: usize,
    pub local_mode: bool,
}

impl AlgorithmConfig {
    /// PPO with default hyperparameters
    pub fn ppo() -> Self {
        Self {
            algorithm: super::PPO.to_string(),
            env: None,
            env_spec: None,
            env_config: None,
            framework: Framework::default(),
            rollouts: RolloutConfig::default(),
            ppo: PPOConfig::default(),
            model: ModelSpec::default(),
            num_gpus: 0,
            local_mode: false,
        }
    }

    pub fn environment(
        mut self,
        name: impl Into<String>,
        creator: EnvCreator,
        env_config: EnvConfig,
    ) -> Self {
        let name = name.into();
        self.env = Some(name.clone());
        self.env_spec = Some(EnvSpec { name, creator });
        self.env_config = Some(env_config);
        self
    }

    pub fn framework(mut self, framework: Framework) -> Self {
        self.framework = framework;
        self
    }

    pub fn rollouts(mut self, num_rollout_workers: usize) -> Self {
        self.rollouts.num_rollout_workers = num_rollout_workers;
        self
    }

    /// Replace all PPO hyperparameters
    pub fn hyperparameters(mut self, ppo: PPOConfig) -> Self {
        self.ppo = ppo;
        self
    }

    /// Apply a partial update of the training section
    pub fn training(mut self, overrides: TrainingOverrides) -> Self {
        if let Some(lr) = overrides.lr {
            self.ppo.lr = lr;
        }
        if let Some(gamma) = overrides.gamma {
            self.ppo.gamma = gamma;
        }
        if let Some(lambda) = overrides.lambda {
            self.ppo.lambda = lambda;
        }
        if let Some(size) = overrides.train_batch_size {
            self.ppo.train_batch_size = size;
        }
        if let Some(size) = overrides.sgd_minibatch_size {
            self.ppo.sgd_minibatch_size = size;
        }
        if let Some(iters) = overrides.num_sgd_iter {
            self.ppo.num_sgd_iter = iters;
        }
        if let Some(coeff) = overrides.entropy_coeff {
            self.ppo.entropy_coeff = coeff;
        }
        if let Some(model) = overrides.model {
            self.model = model;
        }
        self
    }

    pub fn resources(mut self, num_gpus: usize) -> Self {
        self.num_gpus = num_gpus;
        self
    }

    pub fn debugging(mut self, seed: Option<u64>, local_mode: bool) -> Self {
        self.rollouts.seed = seed;
        self.local_mode = local_mode;
        self
    }

    /// Serialized view of the config
    pub fn to_dict(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Number of environment runners actually created
    pub fn num_env_runners(&self) -> usize {
        self.rollouts.num_rollout_workers.max(1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.env_spec.is_none() || self.env_config.is_none() {
            return Err(DrlError::Validation(
                "no environment configured, call .environment() first".to_string(),
            ));
        }

        let ppo = &self.ppo;
        if ppo.train_batch_size == 0 || ppo.sgd_minibatch_size == 0 {
            return Err(DrlError::Validation(
                "train_batch_size and sgd_minibatch_size must be positive".to_string(),
            ));
        }
        if ppo.sgd_minibatch_size > ppo.train_batch_size {
            return Err(DrlError::Validation(format!(
                "sgd_minibatch_size ({}) must be <= train_batch_size ({})",
                ppo.sgd_minibatch_size, ppo.train_batch_size
            )));
        }
        if ppo.num_sgd_iter == 0 {
            return Err(DrlError::Validation("num_sgd_iter must be positive".to_string()));
        }
        if !(ppo.lr.is_finite() && ppo.lr > 0.0) {
            return Err(DrlError::Validation(format!("lr must be positive, got {}", ppo.lr)));
        }
        if ppo.clip_param <= 0.0 || ppo.vf_clip_param <= 0.0 {
            return Err(DrlError::Validation(
                "clip_param and vf_clip_param must be positive".to_string(),
            ));
        }
        if !(ppo.gamma > 0.0 && ppo.gamma <= 1.0) || !(0.0..=1.0).contains(&ppo.lambda) {
            return Err(DrlError::Validation(format!(
                "gamma must be in (0, 1] and lambda in [0, 1], got {} and {}",
                ppo.gamma, ppo.lambda
            )));
        }
        if ppo.kl_coeff < 0.0 || ppo.kl_target <= 0.0 {
            return Err(DrlError::Validation(
                "kl_coeff must be >= 0 and kl_target > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Validate, create workers and initialize the policy
    pub fn build(
        &self,
    ) -> Result<Ppo<impl Optimizer<FcNet<TrainBackend>, TrainBackend>>> {
        self.validate()?;

        let (spec, env_config) = match (&self.env_spec, &self.env_config) {
            (Some(spec), Some(env_config)) => (spec, env_config),
            _ => return Err(DrlError::Validation("no environment configured".to_string())),
        };

        if self.num_gpus > 0 {
            warn!(
                "num_gpus = {} requested but the ndarray backend is CPU-only",
                self.num_gpus
            );
        }

        let num_workers = self.num_env_runners();
        let seed = self.rollouts.seed;
        let mut workers = Vec::with_capacity(num_workers);
        for worker_index in 0..num_workers {
            let ctx = EnvContext {
                worker_index,
                num_workers,
                seed: seed.map(|s| s.wrapping_add(worker_index as u64)),
            };
            let env = (spec.creator)(env_config, &ctx)?;
            workers.push(RolloutWorker::new(worker_index, env, seed));
        }

        let (obs_dim, num_actions) = match workers.first() {
            Some(worker) => (worker.observation_dim(), worker.num_actions()),
            None => return Err(DrlError::Internal("no rollout workers created".to_string())),
        };
        if workers
            .iter()
            .any(|w| w.observation_dim() != obs_dim || w.num_actions() != num_actions)
        {
            return Err(DrlError::Validation(
                "environments disagree on observation or action space".to_string(),
            ));
        }

        let net_config = ModelCatalog::get_model_config(&self.model, obs_dim, num_actions)?;
        let device = Default::default();
        let model = {
            let _guard = INIT_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(seed) = seed {
                TrainBackend::seed(seed);
            }
            net_config.init::<TrainBackend>(&device)
        };

        let optimizer = AdamConfig::new()
            .with_grad_clipping(
                self.ppo
                    .grad_clip
                    .map(burn::grad_clipping::GradientClippingConfig::Norm),
            )
            .init::<TrainBackend, FcNet<TrainBackend>>();

        info!(
            algorithm = %self.algorithm,
            env = %spec.name,
            framework = %self.framework,
            workers = num_workers,
            obs_dim,
            num_actions,
            "Built algorithm"
        );

        Ok(Ppo::new(
            self.clone(),
            model,
            optimizer,
            WorkerSet::new(workers, self.local_mode),
            device,
        ))
    }
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self::ppo()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MarketFrame;
    use crate::rl::config::TradingEnvSettings;
    use crate::rl::environment::TdxRawEnv;
    use crate::rl::training::worker::evaluate;

    fn env_config() -> EnvConfig {
        let frame = MarketFrame::new(
            vec!["close".into()],
            (0..20).map(|i| vec![10.0 + (i as f64).sin()]).collect(),
            vec![],
        )
        .unwrap();
        EnvConfig::new(frame, TradingEnvSettings::default())
    }

    #[test]
    fn test_defaults() {
        let config = AlgorithmConfig::ppo();
        assert_eq!(config.algorithm, "PPO");
        assert_eq!(config.ppo.lr, 5e-5);
        assert_eq!(config.ppo.train_batch_size, 4000);
        assert_eq!(config.framework, Framework::Torch);
    }

    #[test]
    fn test_builder_chain() {
        let config = AlgorithmConfig::ppo()
            .environment("TdxRawEnv", TdxRawEnv::creator(), env_config())
            .framework(Framework::Tf2)
            .rollouts(2)
            .training(
                TrainingOverrides::new()
                    .with_lr(1e-3)
                    .with_model(ModelSpec {
                        custom_model: Some("my_model".into()),
                        vf_share_layers: true,
                        ..Default::default()
                    }),
            )
            .resources(1);

        assert_eq!(config.ppo.lr, 1e-3);
        assert_eq!(config.rollouts.num_rollout_workers, 2);
        assert_eq!(config.num_gpus, 1);
        assert!(config.model.vf_share_layers);
        assert!(config.validate().is_ok());

        let dict = config.to_dict().unwrap();
        assert_eq!(dict["env"], "TdxRawEnv");
        assert_eq!(dict["framework"], "tf2");
        assert_eq!(dict["lr"], 1e-3);
        assert_eq!(dict["model"]["custom_model"], "my_model");
        assert_eq!(dict["env_config"]["columns"][0], "close");
    }

    #[test]
    fn test_validate_requires_env() {
        let err = AlgorithmConfig::ppo().validate().unwrap_err();
        assert!(matches!(err, DrlError::Validation(_)));
    }

    #[test]
    fn test_validate_minibatch() {
        let config = AlgorithmConfig::ppo()
            .environment("TdxRawEnv", TdxRawEnv::creator(), env_config())
            .training(
                TrainingOverrides::new()
                    .with_train_batch_size(64)
                    .with_sgd_minibatch_size(128),
            );
        assert!(matches!(config.validate(), Err(DrlError::Validation(_))));
    }

    #[test]
    fn test_seeded_builds_match_across_threads() {
        let config = AlgorithmConfig::ppo()
            .environment("TdxRawEnv", TdxRawEnv::creator(), env_config())
            .training(
                TrainingOverrides::new()
                    .with_train_batch_size(32)
                    .with_sgd_minibatch_size(16),
            )
            .debugging(Some(11), true);

        let obs = vec![0.3, 0.0, 0.0, 1.0];
        let outputs: Vec<Vec<f32>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        let algo = config.build().unwrap();
                        let device = Default::default();
                        evaluate(&algo.get_policy(), &device, &obs).unwrap().0
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for logits in &outputs[1..] {
            assert_eq!(logits, &outputs[0]);
        }
    }

    #[test]
    fn test_framework_display() {
        assert_eq!(Framework::Tf.to_string(), "tf");
        assert_eq!(Framework::Torch.to_string(), "torch");
    }
}
