//! Proximal Policy Optimization (PPO)
//!
//! Clipped-surrogate PPO with an adaptive KL penalty, a clipped squared
//! value loss and GAE advantages computed per rollout fragment.
//!
//! One call to [`Ppo::train`] is one training iteration: sample
//! `train_batch_size` steps from the rollout workers, standardize the
//! advantages over the whole batch, then run `num_sgd_iter` epochs of
//! shuffled minibatch Adam updates.

use std::path::{Path, PathBuf};
use std::time::Instant;

use burn::module::AutodiffModule;
use burn::optim::{GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::activation::log_softmax;
use burn::tensor::{ElementConversion, TensorData};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use super::config::AlgorithmConfig;
use super::result::{LearnerStats, TrainResult};
use crate::error::{DrlError, Result};
use crate::rl::memory::SampleBatch;
use crate::rl::networks::FcNet;
use crate::rl::training::checkpointing::{AlgorithmState, Checkpointer};
use crate::rl::training::worker::{greedy_action, sample_action};
use crate::rl::training::{EpisodeWindow, WorkerSet};
use crate::rl::{InferenceBackend, TrainBackend};

type Device = <TrainBackend as Backend>::Device;

/// Tensors for one minibatch update
struct Minibatch {
    obs: Tensor<TrainBackend, 2>,
    actions: Tensor<TrainBackend, 2, Int>,
    old_logp: Tensor<TrainBackend, 1>,
    old_logits: Tensor<TrainBackend, 2>,
    advantages: Tensor<TrainBackend, 1>,
    value_targets: Tensor<TrainBackend, 1>,
}

/// Loss tensor plus detached components
struct LossOutput {
    total: Tensor<TrainBackend, 1>,
    policy_loss: f32,
    vf_loss: f32,
    entropy: f32,
    kl: f32,
}

/// PPO algorithm state
pub struct Ppo<O> {
    config: AlgorithmConfig,
    model: FcNet<TrainBackend>,
    optimizer: O,
    workers: Option<WorkerSet>,
    device: Device,
    rng: StdRng,
    kl_coeff: f32,
    iteration: u64,
    timesteps_total: u64,
    window: EpisodeWindow,
    time_total_s: f64,
}

impl<O> Ppo<O>
where
    O: Optimizer<FcNet<TrainBackend>, TrainBackend>,
{
    pub(crate) fn new(
        config: AlgorithmConfig,
        model: FcNet<TrainBackend>,
        optimizer: O,
        workers: WorkerSet,
        device: Device,
    ) -> Self {
        let rng = match config.rollouts.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let kl_coeff = config.ppo.kl_coeff;
        let window = EpisodeWindow::new(config.ppo.metrics_num_episodes_for_smoothing);

        Self {
            config,
            model,
            optimizer,
            workers: Some(workers),
            device,
            rng,
            kl_coeff,
            iteration: 0,
            timesteps_total: 0,
            window,
            time_total_s: 0.0,
        }
    }

    pub fn config(&self) -> &AlgorithmConfig {
        &self.config
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn timesteps_total(&self) -> u64 {
        self.timesteps_total
    }

    pub fn kl_coeff(&self) -> f32 {
        self.kl_coeff
    }

    pub fn is_stopped(&self) -> bool {
        self.workers.is_none()
    }

    /// Inference copy of the current policy
    pub fn get_policy(&self) -> FcNet<InferenceBackend> {
        self.model.valid()
    }

    /// Action for one observation, sampled or greedy
    pub fn compute_single_action(&mut self, obs: &[f32], explore: bool) -> Result<usize> {
        let policy = self.model.valid();
        if explore {
            Ok(sample_action(&policy, &self.device, obs, &mut self.rng)?.action)
        } else {
            greedy_action(&policy, &self.device, obs)
        }
    }

    /// Run one training iteration
    pub fn train(&mut self) -> Result<TrainResult> {
        let started = Instant::now();
        let workers = self.workers.as_mut().ok_or_else(|| {
            DrlError::InvalidState("algorithm has been stopped".to_string())
        })?;

        let policy = self.model.valid();
        let fragments = workers.sample(
            &policy,
            &self.device,
            self.config.ppo.train_batch_size,
            self.config.ppo.gamma,
            self.config.ppo.lambda,
        )?;

        let mut episodes_this_iter = 0u64;
        let mut batches = Vec::with_capacity(fragments.len());
        for fragment in fragments {
            episodes_this_iter += fragment.episodes.len() as u64;
            self.window.extend(fragment.episodes);
            batches.push(fragment.batch);
        }

        let mut batch = SampleBatch::concat(batches);
        batch.standardize_advantages();
        let timesteps_this_iter = batch.len() as u64;

        let mut info = self.learn(&batch)?;

        let previous = self.kl_coeff;
        self.kl_coeff = update_kl_coeff(self.kl_coeff, info.kl, self.config.ppo.kl_target);
        if self.kl_coeff != previous {
            debug!(kl = info.kl, from = previous, to = self.kl_coeff, "Adapted KL coefficient");
        }
        info.cur_kl_coeff = self.kl_coeff;

        self.iteration += 1;
        self.timesteps_total += timesteps_this_iter;
        let time_this_iter_s = started.elapsed().as_secs_f64();
        self.time_total_s += time_this_iter_s;

        let stats = self.window.stats();
        Ok(TrainResult {
            training_iteration: self.iteration,
            timesteps_total: self.timesteps_total,
            timesteps_this_iter,
            episodes_total: self.window.total(),
            episodes_this_iter,
            episode_reward_mean: stats.map(|s| s.reward_mean),
            episode_reward_min: stats.map(|s| s.reward_min),
            episode_reward_max: stats.map(|s| s.reward_max),
            episode_len_mean: stats.map(|s| s.len_mean),
            info,
            time_this_iter_s,
            time_total_s: self.time_total_s,
            date: Utc::now(),
        })
    }

    /// Minibatch SGD over the collected batch
    fn learn(&mut self, batch: &SampleBatch) -> Result<LearnerStats> {
        let ppo = self.config.ppo.clone();
        let mut stats = LearnerStats {
            cur_lr: ppo.lr,
            ..Default::default()
        };
        if batch.is_empty() {
            return Ok(stats);
        }

        for _ in 0..ppo.num_sgd_iter {
            for indices in batch.minibatch_indices(ppo.sgd_minibatch_size, &mut self.rng) {
                let minibatch = self.minibatch(batch, &indices);
                let output = self.loss(minibatch);

                stats.total_loss += scalar(&output.total);
                stats.policy_loss += output.policy_loss;
                stats.vf_loss += output.vf_loss;
                stats.entropy += output.entropy;
                stats.kl += output.kl;
                stats.num_minibatches += 1;

                let grads = output.total.backward();
                let grads = GradientsParams::from_grads(grads, &self.model);
                self.model = self.optimizer.step(ppo.lr, self.model.clone(), grads);
            }
        }

        let n = stats.num_minibatches.max(1) as f32;
        stats.total_loss /= n;
        stats.policy_loss /= n;
        stats.vf_loss /= n;
        stats.entropy /= n;
        stats.kl /= n;

        if !stats.total_loss.is_finite() {
            return Err(DrlError::Tensor(format!(
                "non-finite loss at iteration {}",
                self.iteration + 1
            )));
        }

        Ok(stats)
    }

    fn minibatch(&self, batch: &SampleBatch, indices: &[usize]) -> Minibatch {
        let n = indices.len();
        let obs_dim = batch.obs.first().map_or(0, |o| o.len());
        let num_actions = batch.action_logits.first().map_or(0, |l| l.len());

        let obs: Vec<f32> = indices
            .iter()
            .flat_map(|&i| batch.obs[i].iter().copied())
            .collect();
        let logits: Vec<f32> = indices
            .iter()
            .flat_map(|&i| batch.action_logits[i].iter().copied())
            .collect();
        let actions: Vec<i64> = indices.iter().map(|&i| batch.actions[i] as i64).collect();
        let pick = |values: &[f32]| indices.iter().map(|&i| values[i]).collect::<Vec<f32>>();

        Minibatch {
            obs: float_tensor(obs, [n, obs_dim], &self.device),
            actions: Tensor::from_data(
                TensorData::new(actions, [n, 1]).convert::<<TrainBackend as Backend>::IntElem>(),
                &self.device,
            ),
            old_logp: float_tensor(pick(&batch.action_logp), [n], &self.device),
            old_logits: float_tensor(logits, [n, num_actions], &self.device),
            advantages: float_tensor(pick(&batch.advantages), [n], &self.device),
            value_targets: float_tensor(pick(&batch.value_targets), [n], &self.device),
        }
    }

    fn loss(&self, mb: Minibatch) -> LossOutput {
        let ppo = &self.config.ppo;
        let (logits, values) = self.model.forward(mb.obs);

        let logp_all = log_softmax(logits, 1);
        let logp = logp_all.clone().gather(1, mb.actions).squeeze::<1>(1);

        let ratio = (logp - mb.old_logp).exp();
        let surr1 = ratio.clone() * mb.advantages.clone();
        let surr2 = ratio.clamp(1.0 - ppo.clip_param, 1.0 + ppo.clip_param) * mb.advantages;
        let surrogate = surr1.min_pair(surr2);

        // KL(old || new) over the full action distribution
        let old_logp_all = log_softmax(mb.old_logits, 1);
        let kl = (old_logp_all.clone().exp() * (old_logp_all - logp_all.clone()))
            .sum_dim(1)
            .squeeze::<1>(1);

        let entropy = (logp_all.clone().exp() * logp_all)
            .sum_dim(1)
            .squeeze::<1>(1)
            .neg();

        let vf_loss = (values - mb.value_targets)
            .powf_scalar(2.0)
            .clamp(0.0, ppo.vf_clip_param);

        let total = (surrogate.clone().neg()
            + kl.clone().mul_scalar(self.kl_coeff)
            + vf_loss.clone().mul_scalar(ppo.vf_loss_coeff)
            - entropy.clone().mul_scalar(ppo.entropy_coeff))
        .mean();

        LossOutput {
            total,
            policy_loss: scalar(&surrogate.mean().neg()),
            vf_loss: scalar(&vf_loss.mean()),
            entropy: scalar(&entropy.mean()),
            kl: scalar(&kl.mean()),
        }
    }

    /// Write weights and counters to `dir`
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let state = AlgorithmState {
            algorithm: self.config.algorithm.clone(),
            training_iteration: self.iteration,
            timesteps_total: self.timesteps_total,
            episodes_total: self.window.total(),
            kl_coeff: self.kl_coeff,
            lr: self.config.ppo.lr,
            saved_at: Utc::now(),
        };
        Checkpointer::new(dir).save::<TrainBackend, _>(&self.model, &state)
    }

    /// Load weights and counters from `dir`
    pub fn restore<P: AsRef<Path>>(&mut self, dir: P) -> Result<()> {
        let checkpointer = Checkpointer::new(dir);
        let (model, state) =
            checkpointer.load::<TrainBackend, _>(self.model.clone(), &self.device)?;

        if state.algorithm != self.config.algorithm {
            return Err(DrlError::Checkpoint(format!(
                "checkpoint was written by {}, not {}",
                state.algorithm, self.config.algorithm
            )));
        }

        self.model = model;
        self.iteration = state.training_iteration;
        self.timesteps_total = state.timesteps_total;
        self.kl_coeff = state.kl_coeff;
        self.window.set_total(state.episodes_total);
        Ok(())
    }

    /// Release rollout workers; later `train()` calls fail
    pub fn stop(&mut self) {
        if self.workers.take().is_some() {
            info!(
                "Stopped {} after {} iterations",
                self.config.algorithm, self.iteration
            );
        }
    }
}

/// Adaptive KL penalty schedule
pub fn update_kl_coeff(kl_coeff: f32, kl: f32, kl_target: f32) -> f32 {
    if kl > 2.0 * kl_target {
        kl_coeff * 1.5
    } else if kl < 0.5 * kl_target {
        kl_coeff * 0.5
    } else {
        kl_coeff
    }
}

fn float_tensor<const D: usize>(
    values: Vec<f32>,
    shape: [usize; D],
    device: &Device,
) -> Tensor<TrainBackend, D> {
    Tensor::from_data(
        TensorData::new(values, shape).convert::<<TrainBackend as Backend>::FloatElem>(),
        device,
    )
}

fn scalar(tensor: &Tensor<TrainBackend, 1>) -> f32 {
    tensor.clone().into_scalar().elem::<f32>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MarketFrame;
    use crate::rl::algorithms::TrainingOverrides;
    use crate::rl::config::TradingEnvSettings;
    use crate::rl::environment::{EnvConfig, TdxRawEnv};
    use crate::rl::networks::ModelSpec;
    use crate::rl::training::worker::evaluate;
    use std::env::temp_dir;

    fn small_config(seed: u64) -> AlgorithmConfig {
        let frame = MarketFrame::new(
            vec!["open".into(), "close".into()],
            (0..40)
                .map(|i| {
                    let p = 10.0 + (i as f64 * 0.4).sin();
                    vec![p - 0.05, p]
                })
                .collect(),
            vec![],
        )
        .unwrap();
        let env_config = EnvConfig::new(frame, TradingEnvSettings::default());

        AlgorithmConfig::ppo()
            .environment("TdxRawEnv", TdxRawEnv::creator(), env_config)
            .rollouts(2)
            .training(
                TrainingOverrides::new()
                    .with_lr(1e-3)
                    .with_train_batch_size(64)
                    .with_sgd_minibatch_size(16)
                    .with_num_sgd_iter(2)
                    .with_model(ModelSpec {
                        fcnet_hiddens: vec![16, 16],
                        vf_share_layers: true,
                        ..Default::default()
                    }),
            )
            .debugging(Some(seed), true)
    }

    #[test]
    fn test_update_kl_coeff() {
        assert_eq!(update_kl_coeff(0.2, 0.05, 0.01), 0.2 * 1.5);
        assert_eq!(update_kl_coeff(0.2, 0.001, 0.01), 0.1);
        assert_eq!(update_kl_coeff(0.2, 0.01, 0.01), 0.2);
    }

    #[test]
    fn test_train_iterations_advance_counters() {
        let mut algo = small_config(7).build().unwrap();

        let first = algo.train().unwrap();
        let second = algo.train().unwrap();

        assert_eq!(first.training_iteration, 1);
        assert_eq!(second.training_iteration, 2);
        assert_eq!(first.timesteps_this_iter, 64);
        assert_eq!(second.timesteps_total, 128);
        // 39 steps per episode, so episodes complete within two iterations
        assert!(second.episodes_total >= 2);
        assert!(second.episode_reward_mean.is_some());
        assert!(second.info.total_loss.is_finite());
        assert_eq!(second.info.num_minibatches, 8);
        assert_eq!(second.info.cur_lr, 1e-3);
    }

    #[test]
    fn test_stop_rejects_train() {
        let mut algo = small_config(1).build().unwrap();
        algo.stop();
        assert!(algo.is_stopped());
        assert!(matches!(algo.train(), Err(DrlError::InvalidState(_))));
    }

    #[test]
    fn test_checkpoint_roundtrip() {
        let dir = temp_dir().join(format!("ppo_ckpt_{}", uuid::Uuid::new_v4()));

        let mut algo = small_config(3).build().unwrap();
        algo.train().unwrap();
        algo.save(&dir).unwrap();

        let mut restored = small_config(99).build().unwrap();
        restored.restore(&dir).unwrap();
        assert_eq!(restored.iteration(), 1);
        assert_eq!(restored.timesteps_total(), 64);
        assert_eq!(restored.kl_coeff(), algo.kl_coeff());

        let obs = vec![0.1, -0.2, 0.0, 0.0, 1.0];
        let device = Default::default();
        let (a, _) = evaluate(&algo.get_policy(), &device, &obs).unwrap();
        let (b, _) = evaluate(&restored.get_policy(), &device, &obs).unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-6);
        }

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_restore_missing_checkpoint() {
        let dir = temp_dir().join(format!("ppo_no_ckpt_{}", uuid::Uuid::new_v4()));
        let mut algo = small_config(4).build().unwrap();
        assert!(matches!(algo.restore(&dir), Err(DrlError::Checkpoint(_))));
        assert_eq!(algo.iteration(), 0);
    }

    #[test]
    fn test_single_action_in_range() {
        let mut algo = small_config(5).build().unwrap();
        let obs = vec![0.0; 5];
        assert!(algo.compute_single_action(&obs, false).unwrap() < 3);
        assert!(algo.compute_single_action(&obs, true).unwrap() < 3);
    }
}
