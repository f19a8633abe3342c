use clap::Parser;
use std::path::PathBuf;

use crate::rl::algorithms::Framework;

#[derive(Parser, Debug, Clone)]
#[command(name = "tdx-raw-fcnet-ppo")]
#[command(version = "0.1.0")]
#[command(
    about = "Train a PPO agent with a custom fully connected model on TDX daily data",
    long_about = None
)]
pub struct Cli {
    /// Data source: a TDX `.day` file or a CSV file
    #[arg(long, default_value = "")]
    pub path: String,

    /// The registered algorithm to run
    #[arg(long, default_value = "PPO")]
    pub run: String,

    /// The DL framework specifier
    #[arg(long, value_enum, default_value_t = Framework::Torch)]
    pub framework: Framework,

    /// Check that `--stop-reward` was reached once the stopping criteria are met
    #[arg(long)]
    pub as_test: bool,

    /// Number of iterations to train
    #[arg(long, default_value_t = 500_000_000)]
    pub stop_iters: u64,

    /// Number of timesteps to train
    #[arg(long, default_value_t = 100_000_000)]
    pub stop_timesteps: u64,

    /// Reward at which we stop training
    #[arg(long, default_value_t = 100_000_000.0)]
    pub stop_reward: f64,

    /// Run without the trial manager, using a manual train loop
    #[arg(long)]
    pub no_tune: bool,

    /// Run everything on the calling thread
    #[arg(long)]
    pub local_mode: bool,

    /// Settings file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Results directory (overrides `tune.storage_path`)
    #[arg(long)]
    pub storage_path: Option<PathBuf>,
}
