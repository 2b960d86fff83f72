//! Interactive command console for a running controller
//!
//! Lines typed on stdin are parsed with clap, so the console accepts the
//! same style of arguments as the command line.

use crate::controller::Controller;
use crate::errors::{FanControlError, Result};
use crate::fan::{FanCurve, FanTarget};
use crate::hardware::PerformanceMode;
use crate::mode::BaseMode;
use crate::state::ControllerState;
use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, error};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_help_flag = true, disable_version_flag = true)]
struct ConsoleLine {
    #[command(subcommand)]
    command: ConsoleCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    /// Set one curve point: point <cpu|gpu> <index 0-9> <speed 0-100>
    Point {
        target: FanTarget,
        index: usize,
        #[arg(allow_negative_numbers = true)]
        speed: i64,
    },
    /// Replace a whole curve: curve <cpu|gpu> <10 speeds>
    Curve {
        target: FanTarget,
        #[arg(num_args = 1.., allow_hyphen_values = true)]
        speeds: Vec<String>,
    },
    /// Set the low temperature threshold in °C
    Threshold {
        #[arg(allow_negative_numbers = true)]
        value: i64,
    },
    /// Select automatic or custom fan mode
    Mode { mode: BaseMode },
    /// Turn the full-speed override on or off
    FullSpeed { state: Toggle },
    /// Switch the system performance profile
    Perf { mode: PerformanceMode },
    /// Print the latest status
    Status,
    /// Print curves, threshold and mode
    Show,
    /// Restore default curves and settings
    Reset,
    /// Save the configuration to another file
    Save { path: PathBuf },
    /// Load a configuration file
    Load { path: PathBuf },
    /// Stop the controller
    #[command(alias = "exit")]
    Quit,
}

/// What the console should do after a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Continue(String),
    Quit,
}

impl ConsoleCommand {
    /// Parse one console line. Blank lines yield `None`.
    pub fn parse(line: &str) -> std::result::Result<Option<Self>, clap::Error> {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            return Ok(None);
        }
        ConsoleLine::try_parse_from(words).map(|parsed| Some(parsed.command))
    }
}

/// Multi-line summary of a state.
pub fn describe_state(state: &ControllerState) -> String {
    format!(
        "mode: {}\nlow temperature threshold: {}°C\nCPU curve: {}\nGPU curve: {}",
        state.mode,
        state.low_temp_threshold(),
        state.cpu_curve,
        state.gpu_curve
    )
}

/// Run one console command against the controller.
pub fn execute(controller: &Controller, command: ConsoleCommand) -> Result<Outcome> {
    let message = match command {
        ConsoleCommand::Point {
            target,
            index,
            speed,
        } => {
            controller.set_curve_point(target, index, speed)?;
            format!("{} curve: {}", target, controller.state().curve(target))
        }
        ConsoleCommand::Curve { target, speeds } => {
            let speeds = FanCurve::parse_speeds(&speeds)?;
            controller.replace_curve(target, &speeds)?;
            format!("{} curve: {}", target, controller.state().curve(target))
        }
        ConsoleCommand::Threshold { value } => {
            controller.set_threshold(value)?;
            format!("low temperature threshold: {}°C", value)
        }
        ConsoleCommand::Mode { mode } => {
            let change = controller.select_mode(mode)?;
            format!("mode: {}", change.to)
        }
        ConsoleCommand::FullSpeed { state } => {
            let change = controller.set_full_speed(state == Toggle::On)?;
            format!("mode: {}", change.to)
        }
        ConsoleCommand::Perf { mode } => {
            controller.set_performance_mode(mode)?;
            format!("performance mode: {}", mode)
        }
        ConsoleCommand::Status => {
            let status = controller.status();
            let mut lines = vec![status.status_line(), format!("mode: {}", status.mode)];
            if let Some(change) = status.last_change {
                lines.push(format!(
                    "last change: {} -> {} at {} ({})",
                    change.from,
                    change.to,
                    change.at.format("%H:%M:%S"),
                    change.reason
                ));
            }
            if let Some(err) = status.last_error {
                lines.push(format!("last error: {}", err));
            }
            lines.join("\n")
        }
        ConsoleCommand::Show => describe_state(&controller.state()),
        ConsoleCommand::Reset => {
            controller.restore_defaults()?;
            "defaults restored".to_string()
        }
        ConsoleCommand::Save { path } => {
            let saved = controller.save_as(&path)?;
            format!("configuration saved to {}", saved.display())
        }
        ConsoleCommand::Load { path } => {
            controller.load_from(&path)?;
            describe_state(&controller.state())
        }
        ConsoleCommand::Quit => return Ok(Outcome::Quit),
    };
    Ok(Outcome::Continue(message))
}

/// Read commands from stdin until `quit` or end of input.
pub async fn run(controller: Arc<Controller>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| FanControlError::Config(format!("Failed to read console input: {}", e)))?
    {
        let command = match ConsoleCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        debug!("Console command: {:?}", command);

        match execute(&controller, command) {
            Ok(Outcome::Continue(message)) => println!("{}", message),
            Ok(Outcome::Quit) => break,
            Err(e) => {
                error!("Command failed: {}", e);
                println!("error: {}", e);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigStore;
    use crate::errors::ValidationError;
    use crate::hardware::testing::FakePlatform;
    use crate::mode::{CustomPhase, Mode};
    use tempfile::TempDir;

    fn controller() -> (Controller, TempDir) {
        let dir = TempDir::new().unwrap();
        let controller = Controller::new(
            Arc::new(FakePlatform::new(50.0, 50.0)),
            ConfigStore::new(dir.path().join("fan_config.json")),
            ControllerState::default(),
        );
        (controller, dir)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            ConsoleCommand::parse("point gpu 4 55").unwrap(),
            Some(ConsoleCommand::Point {
                target: FanTarget::Gpu,
                index: 4,
                speed: 55
            })
        );
        assert_eq!(
            ConsoleCommand::parse("full-speed on").unwrap(),
            Some(ConsoleCommand::FullSpeed { state: Toggle::On })
        );
        assert_eq!(
            ConsoleCommand::parse("mode manual").unwrap(),
            Some(ConsoleCommand::Mode {
                mode: BaseMode::Custom
            })
        );
        assert_eq!(ConsoleCommand::parse("   ").unwrap(), None);
        assert!(ConsoleCommand::parse("mode turbo").is_err());
    }

    #[test]
    fn test_curve_command_rejects_text() {
        let (controller, _dir) = controller();
        let before = controller.state();

        let command =
            ConsoleCommand::parse("curve cpu 0 10 20 thirty 40 50 60 70 80 90")
                .unwrap()
                .unwrap();
        let err = execute(&controller, command).unwrap_err();
        assert!(matches!(
            err,
            FanControlError::Validation(ValidationError::NonNumeric { .. })
        ));
        assert_eq!(controller.state(), before);
    }

    #[test]
    fn test_execute_commands() {
        let (controller, _dir) = controller();

        let command = ConsoleCommand::parse("curve gpu 0 10 20 30 40 50 60 70 80 90")
            .unwrap()
            .unwrap();
        execute(&controller, command).unwrap();
        assert_eq!(controller.state().gpu_curve.speed_at(8), Some(80));

        execute(&controller, ConsoleCommand::Threshold { value: 40 }).unwrap();
        execute(&controller, ConsoleCommand::FullSpeed { state: Toggle::On }).unwrap();
        execute(&controller, ConsoleCommand::FullSpeed { state: Toggle::Off }).unwrap();
        assert_eq!(controller.state().mode, Mode::Custom(CustomPhase::Idle));
        assert_eq!(controller.state().low_temp_threshold(), 40);

        assert_eq!(
            execute(&controller, ConsoleCommand::Quit).unwrap(),
            Outcome::Quit
        );
        match execute(&controller, ConsoleCommand::Show).unwrap() {
            Outcome::Continue(text) => assert!(text.contains("threshold: 40°C")),
            Outcome::Quit => panic!("show must not quit"),
        }
    }
}
