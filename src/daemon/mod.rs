//! Periodic control loop

pub mod status;

use crate::controller::{Controller, SensorReadings};
use crate::errors::{HardwareError, Result};
use crate::hardware::{PerformanceCode, Platform};
use crate::interpolate::SpeedCommand;
use crate::mode::{evaluate_hysteresis, CustomPhase, HysteresisEdge, Mode};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{timeout, MissedTickBehavior};

/// Timing of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    pub interval: Duration,
    /// Longest a single tick may spend in hardware calls.
    pub hardware_timeout: Duration,
    /// Longest shutdown waits for an in-flight tick.
    pub shutdown_timeout: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            hardware_timeout: Duration::from_secs(3),
            shutdown_timeout: Duration::from_secs(2),
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub mode: Mode,
    pub edge: Option<HysteresisEdge>,
    pub command: Option<SpeedCommand>,
}

/// A NaN or infinite temperature counts as a failed read.
fn finite_temperature(
    operation: &'static str,
    value: f64,
) -> std::result::Result<f64, HardwareError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(HardwareError::call(operation, format!("non-finite reading {}", value)))
    }
}

/// Clears the in-flight flag however the tick ends.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct ControlLoop {
    controller: Arc<Controller>,
    settings: LoopSettings,
}

impl ControlLoop {
    pub fn new(controller: Arc<Controller>, settings: LoopSettings) -> Self {
        Self {
            controller,
            settings,
        }
    }

    fn read_sensors(&self) -> std::result::Result<SensorReadings, HardwareError> {
        let platform: &dyn Platform = self.controller.platform();
        Ok(SensorReadings {
            performance: PerformanceCode(platform.performance_mode()?),
            full_speed: platform.full_speed_mode()?,
            cpu_temp: finite_temperature("cpu_temperature", platform.cpu_temperature()?)?,
            gpu_temp: finite_temperature("gpu_temperature", platform.gpu_temperature()?)?,
            cpu_fan_speed: platform.cpu_fan_speed()?,
            gpu_fan_speed: platform.gpu_fan_speed()?,
        })
    }

    /// Run one tick synchronously.
    ///
    /// Failures are logged and published; the returned error is informational.
    pub fn tick_once(&self) -> Result<TickReport> {
        self.run_tick().map_err(|e| {
            self.controller.publish_failure(&e);
            e
        })
    }

    fn run_tick(&self) -> Result<TickReport> {
        let snapshot = self.controller.state();
        let readings = self.read_sensors()?;
        let threshold = snapshot.low_temp_threshold();

        let mut mode = snapshot.mode;
        if let Some(next) = self.controller.sync_full_speed(mode, readings.full_speed)? {
            mode = next;
        }

        let mut report = TickReport {
            mode,
            edge: None,
            command: None,
        };
        let mut detail = None;

        if let Mode::Custom(_) = mode {
            if let Some(edge) = evaluate_hysteresis(mode, readings.cpu_temp, readings.gpu_temp, threshold)
            {
                match self.controller.apply_hysteresis(mode, edge, threshold)? {
                    Some(next) => {
                        mode = next;
                        report.edge = Some(edge);
                        detail = Some(edge.describe(threshold));
                    }
                    None => {
                        debug!("Mode changed or controller stopped during tick, skipping hysteresis");
                        return Ok(report);
                    }
                }
            }

            if mode == Mode::Custom(CustomPhase::Following) {
                let command = SpeedCommand::from_temperatures(
                    &snapshot.cpu_curve,
                    &snapshot.gpu_curve,
                    readings.cpu_temp,
                    readings.gpu_temp,
                );
                if self.controller.command_speeds(mode, command)? {
                    report.command = Some(command);
                    detail.get_or_insert_with(|| {
                        format!("CPU target: {} | GPU target: {}", command.cpu_raw, command.gpu_raw)
                    });
                }
            } else {
                detail.get_or_insert_with(|| format!("hardware fans (both below {}°C)", threshold));
            }
        }

        report.mode = mode;
        let status = self
            .controller
            .publish_tick(&readings, mode, report.command, detail);
        info!("{}", status.status_line());
        Ok(report)
    }

    /// Start the loop on the current tokio runtime.
    pub fn spawn(self) -> LoopHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let controller = Arc::clone(&self.controller);
        let shutdown_timeout = self.settings.shutdown_timeout;
        let task = tokio::spawn(self.run(stop_rx));

        LoopHandle {
            stop_tx,
            task,
            controller,
            shutdown_timeout,
        }
    }

    async fn run(self, mut stop_rx: watch::Receiver<bool>) {
        let settings = self.settings;
        let this = Arc::new(self);
        let in_flight = Arc::new(AtomicBool::new(false));

        let mut interval = tokio::time::interval(settings.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Control loop started - ticking every {:?}", settings.interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                changed = stop_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            if *stop_rx.borrow() {
                break;
            }

            if in_flight.swap(true, Ordering::SeqCst) {
                warn!("Previous tick is still waiting on hardware, skipping");
                continue;
            }

            let worker = Arc::clone(&this);
            let guard = InFlight(Arc::clone(&in_flight));
            let tick = tokio::task::spawn_blocking(move || {
                let _guard = guard;
                worker.tick_once()
            });

            match timeout(settings.hardware_timeout, tick).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!("Control tick panicked: {}", e),
                Err(_) => this.controller.publish_timeout(HardwareError::Timeout {
                    millis: settings.hardware_timeout.as_millis(),
                }),
            }
        }

        info!("Control loop stopped");
    }
}

/// Handle to a running control loop.
pub struct LoopHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    controller: Arc<Controller>,
    shutdown_timeout: Duration,
}

impl LoopHandle {
    /// Ask the loop to stop after the current tick.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Stop the loop, wait for the in-flight tick, then reset the hardware
    /// and save the configuration.
    ///
    /// A tick that outlives the wait cannot be cancelled; the controller
    /// ignores its hardware writes once shut down.
    pub async fn shutdown(self) -> Result<()> {
        self.stop();

        let mut task = self.task;
        if timeout(self.shutdown_timeout, &mut task).await.is_err() {
            warn!(
                "Control loop did not stop within {:?}, aborting it",
                self.shutdown_timeout
            );
            task.abort();
        }

        self.controller.shutdown()?;
        Ok(())
    }
}
