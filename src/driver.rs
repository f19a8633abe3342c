//! Training driver
//!
//! Turns parsed CLI options and settings into an algorithm config and
//! runs it, either through a manual train loop (`--no-tune`) or through
//! the trial manager.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use burn::optim::Optimizer;
use tracing::{debug, info, warn};

use crate::cli::Cli;
use crate::config::AppConfig;
use crate::data::{unpack_data, MarketFrame};
use crate::error::{DrlError, Result};
use crate::rl::algorithms::{
    get_trainable, pretty_print, AlgorithmConfig, Ppo, TrainResult, TrainingOverrides, PPO,
};
use crate::rl::environment::{EnvConfig, TdxRawEnv};
use crate::rl::networks::{default_fc_net, FcNet, ModelCatalog, ModelSpec};
use crate::rl::TrainBackend;
use crate::tune::{check_learning_achieved, ParamSpace, ResultGrid, RunConfig, StopCriteria, Tuner};

/// Name the custom network is registered under
pub const CUSTOM_MODEL: &str = "my_model";
/// Environment variable holding the requested GPU count
pub const NUM_GPUS_VAR: &str = "RLLIB_NUM_GPUS";
/// Learning rate used by the manual train loop
pub const MANUAL_LOOP_LR: f64 = 1e-3;
const ENV_NAME: &str = "TdxRawEnv";

/// Summary of a manual train loop
#[derive(Debug, Clone)]
pub struct ManualRun {
    pub iterations: u64,
    pub last_result: Option<TrainResult>,
    /// Condition that ended the loop, `None` when `stop_iters` ran out
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Manual(ManualRun),
    Tuned(ResultGrid),
}

/// Parse the GPU count; unset or empty means 0
pub fn parse_num_gpus(value: Option<&str>) -> Result<usize> {
    match value.map(str::trim) {
        None | Some("") => Ok(0),
        Some(raw) => raw.parse::<usize>().map_err(|_| {
            DrlError::Validation(format!(
                "{} must be a non-negative integer, got {:?}",
                NUM_GPUS_VAR, raw
            ))
        }),
    }
}

pub fn num_gpus_from_env() -> Result<usize> {
    parse_num_gpus(std::env::var(NUM_GPUS_VAR).ok().as_deref())
}

/// Stopping criteria from the CLI thresholds
pub fn stop_criteria(cli: &Cli) -> StopCriteria {
    StopCriteria::new()
        .with_training_iteration(cli.stop_iters)
        .with_timesteps_total(cli.stop_timesteps)
        .with_episode_reward_mean(cli.stop_reward)
}

/// Algorithm config for `--run` over the loaded frame
pub fn build_config(
    cli: &Cli,
    settings: &AppConfig,
    frame: MarketFrame,
    num_gpus: usize,
) -> Result<AlgorithmConfig> {
    let env_config = EnvConfig::new(frame, settings.env.clone());
    let model = ModelSpec {
        custom_model: Some(CUSTOM_MODEL.to_string()),
        vf_share_layers: true,
        ..settings.model.clone()
    };

    Ok(get_trainable(&cli.run)?
        .hyperparameters(settings.ppo.clone())
        .environment(ENV_NAME, TdxRawEnv::creator(), env_config)
        .framework(cli.framework)
        .rollouts(settings.rollouts.num_rollout_workers)
        .training(TrainingOverrides::new().with_model(model))
        .resources(num_gpus)
        .debugging(settings.rollouts.seed, cli.local_mode))
}

/// Entry point shared by the binary and the tests
pub fn run(cli: &Cli, settings: &AppConfig, stop_flag: Arc<AtomicBool>) -> Result<RunOutcome> {
    info!("Running with following CLI options: {:?}", cli);

    if cli.no_tune && cli.run != PPO {
        return Err(DrlError::Validation(
            "Only support --run PPO with --no-tune.".to_string(),
        ));
    }
    settings
        .validate()
        .map_err(|errors| DrlError::Validation(errors.join("; ")))?;

    if !ModelCatalog::is_registered(CUSTOM_MODEL) {
        ModelCatalog::register_custom_model(CUSTOM_MODEL, default_fc_net);
        debug!("Registered custom model {}", CUSTOM_MODEL);
    }

    let num_gpus = num_gpus_from_env()?;
    let frame = unpack_data(&cli.path)?;
    let config = build_config(cli, settings, frame, num_gpus)?;
    debug!("Algorithm config: {}", config.to_dict()?);

    if cli.no_tune {
        run_manual(cli, config, &stop_flag).map(RunOutcome::Manual)
    } else {
        run_tuned(cli, settings, config, stop_flag).map(RunOutcome::Tuned)
    }
}

fn run_manual(cli: &Cli, config: AlgorithmConfig, stop_flag: &AtomicBool) -> Result<ManualRun> {
    info!("Running manual train loop without the trial manager.");

    let config = config.training(TrainingOverrides::new().with_lr(MANUAL_LOOP_LR));
    let mut algo = config.build()?;

    let outcome = manual_loop(&mut algo, cli, stop_flag);
    algo.stop();
    outcome
}

fn manual_loop<O>(algo: &mut Ppo<O>, cli: &Cli, stop_flag: &AtomicBool) -> Result<ManualRun>
where
    O: Optimizer<FcNet<TrainBackend>, TrainBackend>,
{
    let mut run = ManualRun {
        iterations: 0,
        last_result: None,
        stop_reason: None,
    };

    for _ in 0..cli.stop_iters {
        if stop_flag.load(Ordering::SeqCst) {
            warn!("Stop requested, leaving the train loop");
            run.stop_reason = Some("interrupted".to_string());
            break;
        }

        let result = algo.train()?;
        run.iterations += 1;
        info!(
            iteration = result.training_iteration,
            timesteps_total = result.timesteps_total,
            episode_reward_mean = ?result.episode_reward_mean,
            "Train iteration finished"
        );
        debug!("{}", pretty_print(&result));

        let reason = if result.timesteps_total >= cli.stop_timesteps {
            Some("timesteps_total")
        } else if result
            .episode_reward_mean
            .is_some_and(|mean| mean >= cli.stop_reward)
        {
            Some("episode_reward_mean")
        } else {
            None
        };
        run.last_result = Some(result);

        if let Some(reason) = reason {
            run.stop_reason = Some(reason.to_string());
            break;
        }
    }

    Ok(run)
}

fn run_tuned(
    cli: &Cli,
    settings: &AppConfig,
    config: AlgorithmConfig,
    stop_flag: Arc<AtomicBool>,
) -> Result<ResultGrid> {
    info!("Training automatically with the trial manager");

    let run_config = RunConfig {
        name: settings.tune.experiment_name.clone(),
        storage_path: cli
            .storage_path
            .clone()
            .unwrap_or_else(|| settings.tune.storage_path.clone()),
        stop: stop_criteria(cli),
        checkpoint_at_end: settings.tune.checkpoint_at_end,
        max_concurrent_trials: settings.tune.max_concurrent_trials,
        verbose: settings.tune.verbose,
    };
    let param_space = ParamSpace::new(config)
        .with_lr_grid(settings.tune.lr_grid.clone())
        .with_num_samples(settings.tune.num_samples);

    let results = Tuner::new(cli.run.clone(), param_space, run_config)
        .with_stop_flag(stop_flag)
        .fit()?;

    if cli.as_test {
        info!("Checking if learning goals were achieved");
        check_learning_achieved(&results, cli.stop_reward)?;
    }

    Ok(results)
}

/// [`run`] on the blocking thread pool
pub async fn run_blocking(
    cli: Cli,
    settings: AppConfig,
    stop_flag: Arc<AtomicBool>,
) -> Result<RunOutcome> {
    tokio::task::spawn_blocking(move || run(&cli, &settings, stop_flag))
        .await
        .map_err(join_error)?
}

fn join_error(err: tokio::task::JoinError) -> DrlError {
    if err.is_cancelled() {
        DrlError::Cancelled
    } else {
        DrlError::Internal(format!("training task failed: {}", err))
    }
}
