//! Command line argument parsing for the fan curve controller

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Fan Curve Controller
///
/// Drives laptop CPU/GPU fans from user-editable temperature curves.
#[derive(Parser)]
#[command(name = "fan-curve-controller")]
#[command(about = "Closed-loop laptop fan curve controller")]
#[command(version)]
pub struct Args {
    /// Increase verbosity (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Also write logs to a daily file in this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the control loop with an interactive command console
    Run(RunArgs),
    /// Print a stored configuration without touching hardware
    ShowConfig {
        /// Configuration file (defaults to $FAN_CONTROL_CONFIG or ~/.fan_control/fan_config.json)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Configuration file (defaults to $FAN_CONTROL_CONFIG or ~/.fan_control/fan_config.json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Control loop period in milliseconds
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(10..))]
    pub interval_ms: u64,

    /// Longest a tick may wait on hardware, in milliseconds
    #[arg(long, default_value_t = 3000)]
    pub hardware_timeout_ms: u64,

    /// Longest shutdown waits for the running tick, in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub shutdown_timeout_ms: u64,

    /// Seed for the simulated platform
    #[arg(long)]
    pub seed: Option<u64>,
}
