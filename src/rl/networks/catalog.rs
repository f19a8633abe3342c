//! Model catalog
//!
//! Maps symbolic model names to network architectures so algorithm
//! configs can refer to a custom model by name.

use std::sync::OnceLock;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::fc_net::{Activation, FcNetConfig};
use crate::error::{DrlError, Result};

/// Model section of an algorithm config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSpec {
    /// Name of a registered custom model
    pub custom_model: Option<String>,
    /// Hidden layer sizes
    pub fcnet_hiddens: Vec<usize>,
    /// Hidden-layer activation
    pub fcnet_activation: Activation,
    /// Compute the value from the policy's hidden stack
    pub vf_share_layers: bool,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            custom_model: None,
            fcnet_hiddens: vec![256, 256],
            fcnet_activation: Activation::Tanh,
            vf_share_layers: false,
        }
    }
}

/// Builds a network config from the model spec and space sizes
pub type ModelBuilder = fn(&ModelSpec, usize, usize) -> FcNetConfig;

fn registry() -> &'static DashMap<String, ModelBuilder> {
    static REGISTRY: OnceLock<DashMap<String, ModelBuilder>> = OnceLock::new();
    REGISTRY.get_or_init(DashMap::new)
}

/// Process-wide model registry
pub struct ModelCatalog;

impl ModelCatalog {
    /// Register (or replace) a custom model
    pub fn register_custom_model(name: &str, builder: ModelBuilder) {
        debug!("Registering custom model '{}'", name);
        registry().insert(name.to_string(), builder);
    }

    pub fn is_registered(name: &str) -> bool {
        registry().contains_key(name)
    }

    /// Resolve the network config for a spec
    pub fn get_model_config(
        spec: &ModelSpec,
        obs_dim: usize,
        num_actions: usize,
    ) -> Result<FcNetConfig> {
        if spec.fcnet_hiddens.iter().any(|&h| h == 0) {
            return Err(DrlError::Validation(format!(
                "fcnet_hiddens must be positive, got {:?}",
                spec.fcnet_hiddens
            )));
        }

        match spec.custom_model.as_deref() {
            None => Ok(default_fc_net(spec, obs_dim, num_actions)),
            Some(name) => {
                let builder = registry()
                    .get(name)
                    .map(|entry| *entry.value())
                    .ok_or_else(|| DrlError::UnknownModel(name.to_string()))?;
                Ok(builder(spec, obs_dim, num_actions))
            }
        }
    }
}

/// Fully connected net straight from the model spec
pub fn default_fc_net(spec: &ModelSpec, obs_dim: usize, num_actions: usize) -> FcNetConfig {
    FcNetConfig::new(
        obs_dim,
        num_actions,
        spec.fcnet_hiddens.clone(),
        spec.fcnet_activation,
        spec.vf_share_layers,
    )
}
