//! Rollout Workers
//!
//! Each worker owns one environment instance and collects trajectory
//! fragments with a frozen copy of the current policy.

use burn::prelude::*;
use burn::tensor::TensorData;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::error::{DrlError, Result};
use crate::rl::environment::Environment;
use crate::rl::memory::SampleBatch;
use crate::rl::networks::FcNet;
use crate::rl::{tensor_to_vec, InferenceBackend};

type Device = <InferenceBackend as Backend>::Device;

/// Reward and length of a completed episode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeSummary {
    pub reward: f64,
    pub length: usize,
}

/// Samples collected by one worker in one round
#[derive(Debug, Clone, Default)]
pub struct Fragment {
    pub batch: SampleBatch,
    pub episodes: Vec<EpisodeSummary>,
}

/// Policy output for a single observation
#[derive(Debug, Clone)]
pub struct PolicyStep {
    pub action: usize,
    pub logp: f32,
    pub logits: Vec<f32>,
    pub value: f32,
}

/// Environment runner
pub struct RolloutWorker {
    index: usize,
    env: Box<dyn Environment>,
    rng: StdRng,
    obs: Option<Vec<f32>>,
    episode_reward: f64,
    episode_len: usize,
}

impl RolloutWorker {
    pub fn new(index: usize, env: Box<dyn Environment>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
            None => StdRng::from_entropy(),
        };

        Self {
            index,
            env,
            rng,
            obs: None,
            episode_reward: 0.0,
            episode_len: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn observation_dim(&self) -> usize {
        self.env.observation_dim()
    }

    pub fn num_actions(&self) -> usize {
        self.env.num_actions()
    }

    /// Collect `num_steps` transitions and compute their advantages
    pub fn sample(
        &mut self,
        policy: &FcNet<InferenceBackend>,
        device: &Device,
        num_steps: usize,
        gamma: f32,
        lambda: f32,
    ) -> Result<Fragment> {
        let mut batch = SampleBatch::with_capacity(num_steps);
        let mut episodes = Vec::new();

        for _ in 0..num_steps {
            let obs = match self.obs.take() {
                Some(obs) => obs,
                None => self.env.reset(None),
            };

            let step = sample_action(policy, device, &obs, &mut self.rng)?;
            let result = self.env.step(step.action)?;

            self.episode_reward += result.reward as f64;
            self.episode_len += 1;
            let done = result.done();

            batch.push(
                obs,
                step.action,
                result.reward,
                done,
                step.logp,
                step.logits,
                step.value,
            );

            if done {
                episodes.push(EpisodeSummary {
                    reward: self.episode_reward,
                    length: self.episode_len,
                });
                self.episode_reward = 0.0;
                self.episode_len = 0;
            } else {
                self.obs = Some(result.observation);
            }
        }

        let last_value = match &self.obs {
            Some(obs) => evaluate(policy, device, obs)?.1,
            None => 0.0,
        };
        batch.compute_advantages(gamma, lambda, last_value);

        debug!(
            worker = self.index,
            steps = batch.len(),
            episodes = episodes.len(),
            "Collected fragment"
        );

        Ok(Fragment { batch, episodes })
    }
}

/// Logits and value for one observation
pub fn evaluate(
    policy: &FcNet<InferenceBackend>,
    device: &Device,
    obs: &[f32],
) -> Result<(Vec<f32>, f32)> {
    let input = Tensor::<InferenceBackend, 2>::from_data(
        TensorData::new(obs.to_vec(), [1, obs.len()]),
        device,
    );
    let (logits, values) = policy.forward(input);
    let logits = tensor_to_vec(logits)?;
    let value = tensor_to_vec(values)?
        .first()
        .copied()
        .ok_or_else(|| DrlError::Tensor("empty value output".to_string()))?;
    Ok((logits, value))
}

/// Sample from the categorical policy
pub fn sample_action(
    policy: &FcNet<InferenceBackend>,
    device: &Device,
    obs: &[f32],
    rng: &mut StdRng,
) -> Result<PolicyStep> {
    let (logits, value) = evaluate(policy, device, obs)?;
    let log_probs = log_softmax(&logits);
    let probs: Vec<f32> = log_probs.iter().map(|lp| lp.exp()).collect();

    let dist = WeightedIndex::new(&probs)
        .map_err(|e| DrlError::Internal(format!("invalid action distribution: {}", e)))?;
    let action = dist.sample(rng);

    Ok(PolicyStep {
        action,
        logp: log_probs[action],
        logits,
        value,
    })
}

/// Greedy action (for evaluation)
pub fn greedy_action(
    policy: &FcNet<InferenceBackend>,
    device: &Device,
    obs: &[f32],
) -> Result<usize> {
    let (logits, _) = evaluate(policy, device, obs)?;
    Ok(logits
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0))
}

/// Numerically stable log-softmax
pub fn log_softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let sum: f32 = logits.iter().map(|l| (l - max).exp()).sum();
    let log_sum = max + sum.ln();
    logits.iter().map(|l| l - log_sum).collect()
}

/// The set of workers used by one algorithm
pub struct WorkerSet {
    workers: Vec<RolloutWorker>,
    local_mode: bool,
}

impl WorkerSet {
    pub fn new(workers: Vec<RolloutWorker>, local_mode: bool) -> Self {
        Self {
            workers,
            local_mode,
        }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn first(&self) -> Option<&RolloutWorker> {
        self.workers.first()
    }

    /// Split `total_steps` across workers and collect fragments
    ///
    /// Workers run on scoped threads unless in local mode or there is a
    /// single worker.
    pub fn sample(
        &mut self,
        policy: &FcNet<InferenceBackend>,
        device: &Device,
        total_steps: usize,
        gamma: f32,
        lambda: f32,
    ) -> Result<Vec<Fragment>> {
        if self.workers.is_empty() {
            return Err(DrlError::InvalidState("no rollout workers".to_string()));
        }
        let shares = split_steps(total_steps, self.workers.len());

        if self.local_mode || self.workers.len() == 1 {
            return self
                .workers
                .iter_mut()
                .zip(shares)
                .map(|(worker, steps)| worker.sample(policy, device, steps, gamma, lambda))
                .collect();
        }

        std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .workers
                .iter_mut()
                .zip(shares)
                .map(|(worker, steps)| {
                    let policy = policy.clone();
                    let device = *device;
                    scope.spawn(move || worker.sample(&policy, &device, steps, gamma, lambda))
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle.join().map_err(|_| {
                        DrlError::Internal("rollout worker thread panicked".to_string())
                    })?
                })
                .collect()
        })
    }
}

/// Near-equal split of steps, earlier workers take the remainder
pub fn split_steps(total: usize, workers: usize) -> Vec<usize> {
    let base = total / workers;
    let extra = total % workers;
    (0..workers)
        .map(|i| base + usize::from(i < extra))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MarketFrame;
    use crate::rl::config::TradingEnvSettings;
    use crate::rl::environment::{EnvConfig, TdxRawEnv};
    use crate::rl::networks::{Activation, FcNetConfig};

    fn env(seed: u64) -> Box<dyn Environment> {
        let closes = [10.0, 10.5, 10.2, 10.8, 11.0, 10.9];
        let frame = MarketFrame::new(
            vec!["close".into()],
            closes.iter().map(|c| vec![*c]).collect(),
            vec![],
        )
        .unwrap();
        let config = EnvConfig::new(frame, TradingEnvSettings::default());
        Box::new(TdxRawEnv::new(&config, Some(seed)).unwrap())
    }

    fn policy() -> FcNet<InferenceBackend> {
        FcNetConfig::new(4, 3, vec![8], Activation::Tanh, true).init(&Default::default())
    }

    #[test]
    fn test_split_steps() {
        assert_eq!(split_steps(10, 3), vec![4, 3, 3]);
        assert_eq!(split_steps(4, 4), vec![1, 1, 1, 1]);
        assert_eq!(split_steps(5, 1), vec![5]);
    }

    #[test]
    fn test_log_softmax_normalizes() {
        let lp = log_softmax(&[1.0, 2.0, 3.0]);
        let total: f32 = lp.iter().map(|l| l.exp()).sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_worker_collects_fragment_across_episodes() {
        let mut worker = RolloutWorker::new(0, env(1), Some(3));
        let fragment = worker
            .sample(&policy(), &Default::default(), 12, 0.99, 1.0)
            .unwrap();

        // 5 steps per episode over 6 bars
        assert_eq!(fragment.batch.len(), 12);
        assert_eq!(fragment.episodes.len(), 2);
        assert!(fragment.episodes.iter().all(|e| e.length == 5));
        assert_eq!(fragment.batch.advantages.len(), 12);
        assert!(fragment.batch.action_logp.iter().all(|lp| *lp <= 0.0));
    }

    #[test]
    fn test_worker_set_parallel_sampling() {
        let workers = (0..3)
            .map(|i| RolloutWorker::new(i, env(i as u64), Some(11)))
            .collect();
        let mut set = WorkerSet::new(workers, false);

        let fragments = set
            .sample(&policy(), &Default::default(), 20, 0.99, 1.0)
            .unwrap();

        let total: usize = fragments.iter().map(|f| f.batch.len()).sum();
        assert_eq!(fragments.len(), 3);
        assert_eq!(total, 20);
    }
}
