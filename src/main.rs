//! Main entry point for the fan curve controller

use anyhow::Context;
use clap::Parser;
use fan_curve_controller::{
    args::{Args, Commands, RunArgs},
    console,
    daemon::{ControlLoop, LoopSettings},
    logging,
    simulated::SimulatedPlatform,
    ConfigStore, Controller,
};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logging::setup(args.verbose, args.log_dir.as_deref()).context("failed to set up logging")?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    let result = runtime.block_on(dispatch(args));
    // A pending stdin read would otherwise keep the process alive
    runtime.shutdown_timeout(Duration::from_millis(200));
    result
}

async fn dispatch(args: Args) -> anyhow::Result<()> {
    match args.command {
        Commands::Run(run_args) => run(run_args).await,
        Commands::ShowConfig { config } => {
            let path = config.unwrap_or_else(ConfigStore::default_path);
            let state = ConfigStore::read(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            println!("{}", path.display());
            println!("{}", console::describe_state(&state));
            Ok(())
        }
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let store = ConfigStore::new(args.config.unwrap_or_else(ConfigStore::default_path));

    warn!("No vendor fan interface linked, using the simulated platform");
    let platform = Arc::new(SimulatedPlatform::new(args.seed));

    let controller = Arc::new(
        Controller::start(platform, store).context("failed to initialise fan hardware")?,
    );
    info!("Configuration file: {}", controller.store().path().display());

    let settings = LoopSettings {
        interval: Duration::from_millis(args.interval_ms),
        hardware_timeout: Duration::from_millis(args.hardware_timeout_ms),
        shutdown_timeout: Duration::from_millis(args.shutdown_timeout_ms),
    };
    let handle = ControlLoop::new(Arc::clone(&controller), settings).spawn();

    tokio::select! {
        result = console::run(Arc::clone(&controller)) => {
            if let Err(e) = result {
                error!("Console stopped: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    handle
        .shutdown()
        .await
        .context("failed to save configuration on shutdown")?;
    Ok(())
}
