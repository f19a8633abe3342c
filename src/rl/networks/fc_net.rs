//! Fully Connected Policy/Value Network
//!
//! Shared hidden stack with a logits head for a categorical policy and a
//! value head. With `vf_share_layers` off, the value function gets its
//! own hidden stack of the same shape.

use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::relu;
use serde::{Deserialize, Serialize};

/// Hidden-layer activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Tanh,
    Relu,
}

/// Policy/value network configuration
#[derive(Config, Debug)]
pub struct FcNetConfig {
    /// Observation dimension
    pub obs_dim: usize,
    /// Number of discrete actions
    pub num_actions: usize,
    /// Hidden layer sizes
    pub hiddens: Vec<usize>,
    /// Hidden-layer activation
    pub activation: Activation,
    /// Compute the value from the policy's hidden stack
    pub vf_share_layers: bool,
}

/// Policy/value network
#[derive(Module, Debug)]
pub struct FcNet<B: Backend> {
    hidden: Vec<Linear<B>>,
    logits_head: Linear<B>,
    value_hidden: Vec<Linear<B>>,
    value_head: Linear<B>,
    tanh: bool,
}

impl FcNetConfig {
    /// Initialize the network
    pub fn init<B: Backend>(&self, device: &B::Device) -> FcNet<B> {
        let hidden = stack(self.obs_dim, &self.hiddens, device);
        let last = self.hiddens.last().copied().unwrap_or(self.obs_dim);
        let logits_head = LinearConfig::new(last, self.num_actions).init(device);

        let value_hidden = if self.vf_share_layers {
            Vec::new()
        } else {
            stack(self.obs_dim, &self.hiddens, device)
        };
        let value_head = LinearConfig::new(last, 1).init(device);

        FcNet {
            hidden,
            logits_head,
            value_hidden,
            value_head,
            tanh: self.activation == Activation::Tanh,
        }
    }
}

fn stack<B: Backend>(input: usize, sizes: &[usize], device: &B::Device) -> Vec<Linear<B>> {
    let mut layers = Vec::with_capacity(sizes.len());
    let mut width = input;
    for &size in sizes {
        layers.push(LinearConfig::new(width, size).init(device));
        width = size;
    }
    layers
}

impl<B: Backend> FcNet<B> {
    /// Forward pass returning (logits [batch, actions], values [batch])
    pub fn forward(&self, obs: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 1>) {
        let features = self.run_stack(&self.hidden, obs.clone());
        let logits = self.logits_head.forward(features.clone());

        let value_features = if self.value_hidden.is_empty() {
            features
        } else {
            self.run_stack(&self.value_hidden, obs)
        };
        let values = self.value_head.forward(value_features).squeeze::<1>(1);

        (logits, values)
    }

    /// Action probabilities (softmax over logits)
    pub fn action_probs(&self, obs: Tensor<B, 2>) -> Tensor<B, 2> {
        let (logits, _) = self.forward(obs);
        burn::tensor::activation::softmax(logits, 1)
    }

    fn run_stack(&self, layers: &[Linear<B>], x: Tensor<B, 2>) -> Tensor<B, 2> {
        layers.iter().fold(x, |x, layer| {
            let x = layer.forward(x);
            if self.tanh {
                x.tanh()
            } else {
                relu(x)
            }
        })
    }

    pub fn shares_value_layers(&self) -> bool {
        self.value_hidden.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn config(share: bool) -> FcNetConfig {
        FcNetConfig::new(9, 3, vec![16, 8], Activation::Tanh, share)
    }

    #[test]
    fn test_forward_shapes() {
        let device = Default::default();
        let net = config(true).init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 2>::zeros([4, 9], &device);
        let (logits, values) = net.forward(input);

        assert_eq!(logits.dims(), [4, 3]);
        assert_eq!(values.dims(), [4]);
        assert!(net.shares_value_layers());
    }

    #[test]
    fn test_separate_value_stack() {
        let device = Default::default();
        let net = config(false).init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 2>::ones([2, 9], &device);
        let (_, values) = net.forward(input);

        assert_eq!(values.dims(), [2]);
        assert!(!net.shares_value_layers());
    }

    #[test]
    fn test_action_probs_sum_to_one() {
        let device = Default::default();
        let net = FcNetConfig::new(9, 3, vec![8], Activation::Relu, true)
            .init::<TestBackend>(&device);

        let probs = net.action_probs(Tensor::<TestBackend, 2>::ones([1, 9], &device));
        let sum: f32 = probs.into_data().to_vec::<f32>().unwrap().iter().sum();

        assert!((sum - 1.0).abs() < 1e-5);
    }
}
