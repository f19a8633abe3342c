mod common;

use drl_investment::data::{unpack_data, MarketFrame};
use drl_investment::rl::algorithms::TrainingOverrides;
use drl_investment::rl::config::TradingEnvSettings;
use drl_investment::rl::environment::{EnvConfig, TdxRawEnv};
use drl_investment::rl::networks::ModelSpec;
use drl_investment::tune::{Mode, TrialStatus};
use drl_investment::{
    check_learning_achieved, AlgorithmConfig, ParamSpace, RunConfig, StopCriteria, Tuner,
};

fn base_config(frame: MarketFrame, seed: u64) -> AlgorithmConfig {
    AlgorithmConfig::ppo()
        .environment(
            "TdxRawEnv",
            TdxRawEnv::creator(),
            EnvConfig::new(frame, TradingEnvSettings::default()),
        )
        .training(
            TrainingOverrides::new()
                .with_train_batch_size(48)
                .with_sgd_minibatch_size(16)
                .with_num_sgd_iter(1)
                .with_model(ModelSpec {
                    fcnet_hiddens: vec![8],
                    ..Default::default()
                }),
        )
        .debugging(Some(seed), true)
}

fn run_config(stop: StopCriteria) -> RunConfig {
    RunConfig {
        storage_path: common::temp_dir("tuner_trials"),
        name: Some("exp".to_string()),
        verbose: 0,
        ..RunConfig::new(stop)
    }
}

/// A trial whose environment cannot be built is recorded as an error.
#[test]
fn trial_errors_are_captured_not_propagated() {
    let frame = MarketFrame::new(vec!["close".into()], vec![vec![10.0]], vec![]).unwrap();

    let grid = Tuner::new(
        "PPO",
        base_config(frame, 1),
        run_config(StopCriteria::new().with_training_iteration(1)),
    )
    .fit()
    .unwrap();

    assert_eq!(grid.len(), 1);
    assert_eq!(grid.num_errors(), 1);
    let trial = &grid.results[0];
    assert_eq!(trial.status, TrialStatus::Error);
    assert!(trial.last_result.is_none());
    assert!(trial.error.as_deref().unwrap().contains("at least 2 bars"));
}

/// Every sample of the grid runs to its stop criterion in local mode.
#[test]
fn grid_samples_run_to_stop_criterion() {
    let frame = unpack_data(common::write_csv_file(25)).unwrap();
    let space = ParamSpace::new(base_config(frame, 2))
        .with_lr_grid(vec![1e-3, 1e-4])
        .with_num_samples(2);

    let grid = Tuner::new(
        "PPO",
        space,
        run_config(StopCriteria::new().with_timesteps_total(96)),
    )
    .fit()
    .unwrap();

    assert_eq!(grid.len(), 4);
    assert_eq!(grid.num_terminated(), 4);
    for trial in grid.iter() {
        assert_eq!(trial.metric("timesteps_total"), Some(96.0));
        assert_eq!(trial.metric("training_iteration"), Some(2.0));
    }

    let best = grid
        .get_best_result("episode_reward_mean", Mode::Max)
        .expect("episodes completed");
    let best_reward = best.metric("episode_reward_mean").unwrap();
    assert!(grid
        .iter()
        .filter_map(|t| t.metric("episode_reward_mean"))
        .all(|r| r <= best_reward));

    assert!(check_learning_achieved(&grid, best_reward).is_ok());
    assert!(check_learning_achieved(&grid, best_reward + 1.0).is_err());
}

/// A reward threshold below any reachable value stops after the first episode.
#[test]
fn reward_threshold_stops_trial() {
    let frame = unpack_data(common::write_csv_file(10)).unwrap();

    let grid = Tuner::new(
        "PPO",
        base_config(frame, 3),
        run_config(
            StopCriteria::new()
                .with_training_iteration(20)
                .with_episode_reward_mean(-1e9),
        ),
    )
    .fit()
    .unwrap();

    // 9 steps per episode, so the first 48-step batch completes episodes
    assert_eq!(grid.results[0].metric("training_iteration"), Some(1.0));
}
