//! Status snapshots and events published by the control loop

use crate::hardware::PerformanceCode;
use crate::interpolate::SpeedCommand;
use crate::mode::Mode;
use chrono::{DateTime, Local};
use std::fmt::Write;

/// A mode change, whether commanded or caused by hysteresis.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeChange {
    pub from: Mode,
    pub to: Mode,
    pub reason: String,
    pub at: DateTime<Local>,
}

/// Latest view of the controller, refreshed every tick.
///
/// When a tick fails the readings stay at their previous values and only
/// `last_error` is updated.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusSnapshot {
    pub cpu_temp: Option<f64>,
    pub gpu_temp: Option<f64>,
    pub cpu_fan_speed: Option<u32>,
    pub gpu_fan_speed: Option<u32>,
    pub performance: Option<PerformanceCode>,
    pub mode: Mode,
    pub last_command: Option<SpeedCommand>,
    pub detail: Option<String>,
    pub last_change: Option<ModeChange>,
    pub last_error: Option<String>,
    pub updated_at: Option<DateTime<Local>>,
    pub ticks: u64,
}

/// Published on the controller's broadcast channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    Tick(StatusSnapshot),
    ModeChanged(ModeChange),
    HardwareFailure(String),
}

fn temp(value: Option<f64>) -> String {
    value.map_or_else(|| "--".to_string(), |t| format!("{:.1}°C", t))
}

fn rpm(value: Option<u32>) -> String {
    value.map_or_else(|| "--".to_string(), |s| format!("{} rpm", s))
}

impl StatusSnapshot {
    /// One human-readable line describing the latest tick.
    pub fn status_line(&self) -> String {
        let mut line = match self.mode {
            Mode::FullSpeed { .. } => format!(
                "CPU: {} | GPU: {} | full speed",
                temp(self.cpu_temp),
                temp(self.gpu_temp)
            ),
            Mode::Automatic => format!(
                "CPU: {} auto [{}] | GPU: {} auto [{}]",
                temp(self.cpu_temp),
                rpm(self.cpu_fan_speed),
                temp(self.gpu_temp),
                rpm(self.gpu_fan_speed)
            ),
            Mode::Custom(_) => format!(
                "CPU: {} [{}] | GPU: {} [{}] | {}",
                temp(self.cpu_temp),
                rpm(self.cpu_fan_speed),
                temp(self.gpu_temp),
                rpm(self.gpu_fan_speed),
                self.detail.as_deref().unwrap_or("custom")
            ),
        };

        if let Some(perf) = self.performance {
            let _ = write!(line, " | performance: {}", perf);
        }
        line
    }
}
