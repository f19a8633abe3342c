use clap::Parser;
use drl_investment::cli::Cli;
use drl_investment::config::AppConfig;
use drl_investment::driver::{self, RunOutcome};
use drl_investment::error::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

mod main_runtime;

use main_runtime::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = AppConfig::load_from(cli.config.as_deref())?;
    init_logging(&settings.logging);

    let stop_flag = Arc::new(AtomicBool::new(false));
    let watcher = {
        let stop_flag = Arc::clone(&stop_flag);
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                warn!("Ctrl+C received, stopping at the next iteration boundary");
                stop_flag.store(true, Ordering::SeqCst);
            }
        })
    };

    let outcome = driver::run_blocking(cli, settings, stop_flag).await?;
    watcher.abort();

    match outcome {
        RunOutcome::Manual(run) => {
            println!("\n╔══════════════════════════════════════════════════════════╗");
            println!("║                  MANUAL TRAINING DONE                    ║");
            println!("╚══════════════════════════════════════════════════════════╝\n");
            println!("  Iterations:      {}", run.iterations);
            if let Some(result) = &run.last_result {
                println!("  Timesteps:       {}", result.timesteps_total);
                println!("  Episodes:        {}", result.episodes_total);
                match result.episode_reward_mean {
                    Some(mean) => println!("  Reward mean:     {:.4}", mean),
                    None => println!("  Reward mean:     n/a"),
                }
            }
            println!(
                "  Stopped by:      {}",
                run.stop_reason.as_deref().unwrap_or("stop_iters")
            );
        }
        RunOutcome::Tuned(grid) => {
            println!("\n╔══════════════════════════════════════════════════════════╗");
            println!("║                   EXPERIMENT FINISHED                    ║");
            println!("╚══════════════════════════════════════════════════════════╝\n");
            println!("  Results:         {}", grid.experiment_path.display());
            for trial in grid.iter() {
                let reward = trial
                    .metric("episode_reward_mean")
                    .map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v));
                println!(
                    "  {:<24} {:<11} reward_mean={} iters={}",
                    trial.trial_id,
                    trial.status,
                    reward,
                    trial
                        .last_result
                        .as_ref()
                        .map_or(0, |r| r.training_iteration)
                );
                if let Some(error) = &trial.error {
                    println!("    error: {}", error);
                }
            }
        }
    }

    info!("Done");
    Ok(())
}
