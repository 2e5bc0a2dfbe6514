// Simulation optimizer entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file)
// 2. Load config
// 3. Install the SIGINT/SIGTERM listener
// 4. Discover seasons and open the output directory
// 5. Run or resume the optimization
// 6. Tear down the signal listener and report the outcome

use gridiron_sim::config;
use gridiron_sim::optimizer::{OptimizationManager, RunOutcome};
use gridiron_sim::pool::{spawn_signal_listener, CancelFlag};

use anyhow::Context;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("Gridiron simulation starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: mode={:?}, {} parameters, {} teams x {} rounds, {} workers",
        config.run.mode,
        config.run.parameter_order.len(),
        config.league.num_teams,
        config.league.draft_rounds,
        config.run.workers
    );

    // 3. Signal listener
    let cancel = CancelFlag::new();
    let listener = spawn_signal_listener(cancel.clone());

    // 4-5. Optimize
    let outcome = match OptimizationManager::new(config, cancel) {
        Ok(manager) => manager.run().await,
        Err(e) => Err(e),
    };

    // 6. Cleanup
    listener.abort();

    match outcome {
        Ok(RunOutcome::Completed { optimal }) => {
            info!("Optimal configuration written to {}", optimal.display());
            println!("Optimal configuration: {}", optimal.display());
        }
        Ok(RunOutcome::Cancelled { last_checkpoint }) => {
            let last = last_checkpoint
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "none".to_string());
            info!("Cancelled; last checkpoint: {}", last);
            println!("Cancelled. Last checkpoint: {last}");
        }
        Err(e) => {
            error!("Optimization failed: {:#}", e);
            return Err(e);
        }
    }

    info!("Gridiron simulation shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to `logs/gridiron-sim.log`.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("gridiron-sim.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("gridiron_sim=info,gridiron_core=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
