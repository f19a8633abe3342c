//! On-policy sample storage
//!
//! A `SampleBatch` holds one trajectory fragment from a rollout worker
//! (or the concatenation of several) together with the GAE advantages
//! and value targets computed for it.

use rand::seq::SliceRandom;
use rand::Rng;

/// Flat transition storage
#[derive(Debug, Clone, Default)]
pub struct SampleBatch {
    /// Observations [len][obs_dim]
    pub obs: Vec<Vec<f32>>,
    /// Taken action indices
    pub actions: Vec<usize>,
    /// Rewards
    pub rewards: Vec<f32>,
    /// Episode ended after this step
    pub dones: Vec<bool>,
    /// Log probability of the taken action under the behaviour policy
    pub action_logp: Vec<f32>,
    /// Behaviour policy logits [len][num_actions]
    pub action_logits: Vec<Vec<f32>>,
    /// Value estimates at sampling time
    pub vf_preds: Vec<f32>,
    /// GAE advantages
    pub advantages: Vec<f32>,
    /// Value function targets
    pub value_targets: Vec<f32>,
}

impl SampleBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            obs: Vec::with_capacity(capacity),
            actions: Vec::with_capacity(capacity),
            rewards: Vec::with_capacity(capacity),
            dones: Vec::with_capacity(capacity),
            action_logp: Vec::with_capacity(capacity),
            action_logits: Vec::with_capacity(capacity),
            vf_preds: Vec::with_capacity(capacity),
            advantages: Vec::new(),
            value_targets: Vec::new(),
        }
    }

    /// Add a transition
    #[allow(clippy::too_many_arguments)]
    pub fn push(
        &mut self,
        obs: Vec<f32>,
        action: usize,
        reward: f32,
        done: bool,
        logp: f32,
        logits: Vec<f32>,
        vf_pred: f32,
    ) {
        self.obs.push(obs);
        self.actions.push(action);
        self.rewards.push(reward);
        self.dones.push(done);
        self.action_logp.push(logp);
        self.action_logits.push(logits);
        self.vf_preds.push(vf_pred);
    }

    pub fn len(&self) -> usize {
        self.obs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obs.is_empty()
    }

    /// Compute advantages and value targets using GAE
    ///
    /// `last_value` bootstraps the step after the fragment; it is ignored
    /// when the last transition ended an episode.
    pub fn compute_advantages(&mut self, gamma: f32, lambda: f32, last_value: f32) {
        let n = self.len();
        self.advantages = vec![0.0; n];
        self.value_targets = vec![0.0; n];

        let mut gae = 0.0;
        let mut next_value = last_value;

        for t in (0..n).rev() {
            let mask = if self.dones[t] { 0.0 } else { 1.0 };
            let value = self.vf_preds[t];

            let delta = self.rewards[t] + gamma * next_value * mask - value;
            gae = delta + gamma * lambda * mask * gae;

            self.advantages[t] = gae;
            self.value_targets[t] = gae + value;
            next_value = value;
        }
    }

    /// Standardize advantages to zero mean and unit variance
    pub fn standardize_advantages(&mut self) {
        let n = self.advantages.len();
        if n < 2 {
            return;
        }

        let mean: f32 = self.advantages.iter().sum::<f32>() / n as f32;
        let var: f32 = self
            .advantages
            .iter()
            .map(|a| (a - mean).powi(2))
            .sum::<f32>()
            / n as f32;
        let std = var.sqrt().max(1e-8);

        for adv in &mut self.advantages {
            *adv = (*adv - mean) / std;
        }
    }

    /// Append another batch (with its computed advantages)
    pub fn extend(&mut self, other: SampleBatch) {
        self.obs.extend(other.obs);
        self.actions.extend(other.actions);
        self.rewards.extend(other.rewards);
        self.dones.extend(other.dones);
        self.action_logp.extend(other.action_logp);
        self.action_logits.extend(other.action_logits);
        self.vf_preds.extend(other.vf_preds);
        self.advantages.extend(other.advantages);
        self.value_targets.extend(other.value_targets);
    }

    /// Concatenate fragments
    pub fn concat(batches: Vec<SampleBatch>) -> SampleBatch {
        let total = batches.iter().map(|b| b.len()).sum();
        let mut out = SampleBatch::with_capacity(total);
        for batch in batches {
            out.extend(batch);
        }
        out
    }

    /// Shuffled minibatch index sets covering the batch once
    pub fn minibatch_indices<R: Rng>(&self, minibatch_size: usize, rng: &mut R) -> Vec<Vec<usize>> {
        let mut indices: Vec<usize> = (0..self.len()).collect();
        indices.shuffle(rng);
        indices
            .chunks(minibatch_size.max(1))
            .map(|chunk| chunk.to_vec())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn batch(rewards: &[f32], values: &[f32], dones: &[bool]) -> SampleBatch {
        let mut batch = SampleBatch::new();
        for i in 0..rewards.len() {
            batch.push(vec![0.0], 0, rewards[i], dones[i], -1.0, vec![0.0; 3], values[i]);
        }
        batch
    }

    #[test]
    fn test_gae_matches_hand_computation() {
        // gamma = 0.5, lambda = 1.0, bootstrapped with 2.0
        let mut b = batch(&[1.0, 1.0], &[0.0, 0.0], &[false, false]);
        b.compute_advantages(0.5, 1.0, 2.0);

        // t=1: delta = 1 + 0.5*2 = 2; t=0: delta = 1, gae = 1 + 0.5*2 = 2
        assert_eq!(b.advantages, vec![2.0, 2.0]);
        assert_eq!(b.value_targets, vec![2.0, 2.0]);
    }

    #[test]
    fn test_gae_stops_at_episode_boundary() {
        let mut b = batch(&[1.0, 5.0], &[0.5, 0.0], &[true, false]);
        b.compute_advantages(0.99, 0.95, 0.0);

        // First step ends its episode, so nothing flows back from the second
        assert!((b.advantages[0] - 0.5).abs() < 1e-6);
        assert!((b.advantages[1] - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_last_done_ignores_bootstrap() {
        let mut b = batch(&[1.0], &[0.0], &[true]);
        b.compute_advantages(0.99, 0.95, 100.0);
        assert_eq!(b.advantages, vec![1.0]);
    }

    #[test]
    fn test_standardize() {
        let mut b = batch(&[0.0; 4], &[0.0; 4], &[false; 4]);
        b.advantages = vec![1.0, 2.0, 3.0, 4.0];
        b.standardize_advantages();

        let mean: f32 = b.advantages.iter().sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-6);
        assert!(b.advantages[3] > b.advantages[0]);
    }

    #[test]
    fn test_concat_and_minibatches() {
        let mut a = batch(&[1.0; 3], &[0.0; 3], &[false; 3]);
        a.compute_advantages(0.9, 0.9, 0.0);
        let mut b = batch(&[1.0; 2], &[0.0; 2], &[false; 2]);
        b.compute_advantages(0.9, 0.9, 0.0);

        let all = SampleBatch::concat(vec![a, b]);
        assert_eq!(all.len(), 5);
        assert_eq!(all.advantages.len(), 5);

        let mut rng = StdRng::seed_from_u64(0);
        let minibatches = all.minibatch_indices(2, &mut rng);
        assert_eq!(minibatches.len(), 3);
        let mut seen: Vec<usize> = minibatches.concat();
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }
}
