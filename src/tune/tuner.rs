//! Trial runner
//!
//! Expands the param space into trials and trains each one until its
//! stopping criteria are met. Every trial gets a directory under the
//! experiment path holding `params.json`, the JSON-lines `result.json`
//! and (optionally) a final checkpoint.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::param_space::ParamSpace;
use super::result_grid::{ResultGrid, TrialResult, TrialStatus};
use super::stop::StopCriteria;
use crate::error::{DrlError, Result};
use crate::rl::algorithms::{get_trainable, AlgorithmConfig, TrainResult};
use crate::rl::training::checkpointing::{iteration_name, timestamped_name};

/// Experiment-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Experiment directory name (defaults to `<run>_<timestamp>`)
    pub name: Option<String>,
    pub storage_path: PathBuf,
    pub stop: StopCriteria,
    pub checkpoint_at_end: bool,
    /// Trials trained at once (0 = all)
    pub max_concurrent_trials: usize,
    /// 0 = silent, 1 = per-trial summaries, 2 = every result
    pub verbose: u8,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name: None,
            storage_path: PathBuf::from("./drl_results"),
            stop: StopCriteria::default(),
            checkpoint_at_end: true,
            max_concurrent_trials: 0,
            verbose: 1,
        }
    }
}

impl RunConfig {
    pub fn new(stop: StopCriteria) -> Self {
        Self {
            stop,
            ..Default::default()
        }
    }
}

pub struct Tuner {
    run: String,
    param_space: ParamSpace,
    run_config: RunConfig,
    stop_flag: Option<Arc<AtomicBool>>,
}

impl Tuner {
    pub fn new(
        run: impl Into<String>,
        param_space: impl Into<ParamSpace>,
        run_config: RunConfig,
    ) -> Self {
        Self {
            run: run.into(),
            param_space: param_space.into(),
            run_config,
            stop_flag: None,
        }
    }

    /// Shared flag that ends all trials at the next iteration boundary
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop_flag = Some(flag);
        self
    }

    fn stop_requested(&self) -> bool {
        self.stop_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Run every trial to completion
    ///
    /// Trial failures are recorded on the trial; only experiment setup
    /// errors are returned.
    pub fn fit(&self) -> Result<ResultGrid> {
        let registered = get_trainable(&self.run)?;
        if registered.algorithm != self.param_space.base.algorithm {
            return Err(DrlError::Validation(format!(
                "param space is configured for {}, not {}",
                self.param_space.base.algorithm, self.run
            )));
        }
        if self.run_config.stop.is_empty() {
            return Err(DrlError::Validation(
                "at least one stopping criterion is required".to_string(),
            ));
        }

        let configs = self.param_space.expand();
        let name = self
            .run_config
            .name
            .clone()
            .unwrap_or_else(|| timestamped_name(&self.run));
        let experiment_path = self.run_config.storage_path.join(name);
        fs::create_dir_all(&experiment_path)?;

        let experiment_id = uuid::Uuid::new_v4().simple().to_string();
        let trials: Vec<(String, AlgorithmConfig)> = configs
            .into_iter()
            .enumerate()
            .map(|(i, config)| (format!("{}_{:05}", &experiment_id[..8], i), config))
            .collect();

        let concurrency = if self.param_space.base.local_mode {
            1
        } else if self.run_config.max_concurrent_trials == 0 {
            trials.len().max(1)
        } else {
            self.run_config.max_concurrent_trials
        };

        info!(
            "Starting experiment {:?} with {} trial(s), {} at a time",
            experiment_path,
            trials.len(),
            concurrency
        );

        let mut results = Vec::with_capacity(trials.len());
        for chunk in trials.chunks(concurrency) {
            if concurrency == 1 {
                for (trial_id, config) in chunk {
                    results.push(self.run_trial(trial_id, config, &experiment_path));
                }
                continue;
            }

            let chunk_results: Vec<TrialResult> = std::thread::scope(|scope| {
                let handles: Vec<_> = chunk
                    .iter()
                    .map(|(trial_id, config)| {
                        let path = experiment_path.as_path();
                        let handle = scope.spawn(move || self.run_trial(trial_id, config, path));
                        (trial_id, config, handle)
                    })
                    .collect();

                handles
                    .into_iter()
                    .map(|(trial_id, config, handle)| {
                        handle.join().unwrap_or_else(|_| {
                            self.failed_trial(
                                trial_id,
                                config,
                                &experiment_path,
                                "trial thread panicked".to_string(),
                            )
                        })
                    })
                    .collect()
            });
            results.extend(chunk_results);
        }

        let grid = ResultGrid {
            experiment_path: experiment_path.clone(),
            results,
        };
        fs::write(
            experiment_path.join("experiment_state.json"),
            serde_json::to_vec_pretty(&grid)?,
        )?;

        info!(
            "Experiment finished: {} terminated, {} errored",
            grid.num_terminated(),
            grid.num_errors()
        );
        if self.stop_requested() {
            warn!("Experiment was interrupted before all stopping criteria were met");
        }

        Ok(grid)
    }

    fn trial_path(&self, experiment_path: &Path, trial_id: &str) -> PathBuf {
        experiment_path.join(format!("{}_{}", self.run, trial_id))
    }

    fn run_trial(
        &self,
        trial_id: &str,
        config: &AlgorithmConfig,
        experiment_path: &Path,
    ) -> TrialResult {
        let path = self.trial_path(experiment_path, trial_id);
        let params = config.to_dict().unwrap_or(serde_json::Value::Null);
        let mut last_result = None;
        let mut checkpoint = None;

        let outcome = self.execute_trial(trial_id, config, &path, &mut last_result, &mut checkpoint);

        let (status, error) = match outcome {
            Ok(()) => (TrialStatus::Terminated, None),
            Err(e) => {
                error!("Trial {} failed: {}", trial_id, e);
                (TrialStatus::Error, Some(e.to_string()))
            }
        };

        TrialResult {
            trial_id: trial_id.to_string(),
            config: params,
            last_result,
            status,
            error,
            checkpoint,
            path,
        }
    }

    fn failed_trial(
        &self,
        trial_id: &str,
        config: &AlgorithmConfig,
        experiment_path: &Path,
        message: String,
    ) -> TrialResult {
        error!("Trial {} failed: {}", trial_id, message);
        TrialResult {
            trial_id: trial_id.to_string(),
            config: config.to_dict().unwrap_or(serde_json::Value::Null),
            last_result: None,
            status: TrialStatus::Error,
            error: Some(message),
            checkpoint: None,
            path: self.trial_path(experiment_path, trial_id),
        }
    }

    fn execute_trial(
        &self,
        trial_id: &str,
        config: &AlgorithmConfig,
        path: &Path,
        last_result: &mut Option<TrainResult>,
        checkpoint: &mut Option<PathBuf>,
    ) -> Result<()> {
        fs::create_dir_all(path)?;
        fs::write(
            path.join("params.json"),
            serde_json::to_vec_pretty(&config.to_dict()?)?,
        )?;
        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.join("result.json"))?;

        let mut algo = config.build()?;
        if self.run_config.verbose > 0 {
            info!("Trial {} started (lr = {})", trial_id, config.ppo.lr);
        }

        loop {
            if self.stop_requested() {
                info!("Trial {} interrupted", trial_id);
                break;
            }

            let result = algo.train()?;
            writeln!(log, "{}", serde_json::to_string(&result)?)?;

            if self.run_config.verbose > 1 {
                info!(
                    trial = trial_id,
                    iteration = result.training_iteration,
                    timesteps = result.timesteps_total,
                    reward_mean = ?result.episode_reward_mean,
                    "Trial result"
                );
            }

            let triggered = self.run_config.stop.triggered(&result);
            *last_result = Some(result);
            if let Some(metric) = triggered {
                if self.run_config.verbose > 0 {
                    info!("Trial {} reached stopping criterion {}", trial_id, metric);
                }
                break;
            }
        }

        if self.run_config.checkpoint_at_end && algo.iteration() > 0 {
            *checkpoint = Some(algo.save(path.join(iteration_name(algo.iteration())))?);
        }
        algo.stop();

        Ok(())
    }
}
