//! Command surface shared by the foreground and the control loop
//!
//! All reads and writes of [`ControllerState`] go through one mutex.
//! Commands keep the lock while they talk to the hardware, so a command and
//! a hysteresis transition can never interleave. The control loop only
//! clones a snapshot and re-locks to apply transitions. Once
//! [`Controller::shutdown`] has reset the hardware, those loop hooks refuse
//! to touch it again.

use crate::config::ConfigStore;
use crate::daemon::status::{ControlEvent, ModeChange, StatusSnapshot};
use crate::errors::{FanControlError, HardwareError, Result};
use crate::fan::FanTarget;
use crate::hardware::{apply_profile, reset_to_safe, PerformanceCode, PerformanceMode, Platform};
use crate::interpolate::SpeedCommand;
use crate::mode::{transition, BaseMode, HysteresisEdge, Mode, ModeCommand, Transition};
use crate::state::ControllerState;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

/// Sensor values gathered at the start of a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReadings {
    pub performance: PerformanceCode,
    pub full_speed: bool,
    pub cpu_temp: f64,
    pub gpu_temp: f64,
    pub cpu_fan_speed: u32,
    pub gpu_fan_speed: u32,
}

pub struct Controller {
    platform: Arc<dyn Platform>,
    store: ConfigStore,
    state: Mutex<ControllerState>,
    status: Mutex<StatusSnapshot>,
    events: broadcast::Sender<ControlEvent>,
    /// Set under the state lock by `shutdown`.
    shut_down: AtomicBool,
}

impl Controller {
    pub fn new(platform: Arc<dyn Platform>, store: ConfigStore, state: ControllerState) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let status = StatusSnapshot {
            mode: state.mode,
            ..StatusSnapshot::default()
        };
        Self {
            platform,
            store,
            state: Mutex::new(state),
            status: Mutex::new(status),
            events,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Load the stored configuration, falling back to defaults, and put the
    /// hardware into the loaded mode.
    ///
    /// Fails only when the hardware cannot be configured.
    pub fn start(platform: Arc<dyn Platform>, store: ConfigStore) -> Result<Self> {
        let state = match ConfigStore::load(store.path(), platform.as_ref()) {
            Ok(state) => state,
            Err(FanControlError::Persistence(e)) => {
                warn!(
                    "Could not load {} ({}), starting with defaults",
                    store.path().display(),
                    e
                );
                let state = ControllerState::default();
                apply_profile(platform.as_ref(), state.mode.hardware_profile())?;
                state
            }
            Err(e) => return Err(e),
        };

        Ok(Self::new(platform, store, state))
    }

    pub fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    fn lock_state(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_status(&self) -> MutexGuard<'_, StatusSnapshot> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A consistent copy of the current state.
    pub fn state(&self) -> ControllerState {
        self.lock_state().clone()
    }

    /// Latest published status.
    pub fn status(&self) -> StatusSnapshot {
        self.lock_status().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControlEvent> {
        self.events.subscribe()
    }

    fn persist(&self, state: &ControllerState) -> Result<PathBuf> {
        self.store.save(state).map_err(|e| {
            error!("Failed to save configuration: {}", e);
            FanControlError::from(e)
        })
    }

    pub fn set_curve_point(&self, target: FanTarget, index: usize, speed: i64) -> Result<()> {
        let mut state = self.lock_state();
        let mut curve = *state.curve(target);
        curve.set_point(index, speed)?;
        *state.curve_mut(target) = curve;

        info!(
            "{} fan curve point {} set to {}%",
            target,
            index,
            curve.speed_at(index).unwrap_or_default()
        );
        self.persist(&state)?;
        Ok(())
    }

    pub fn replace_curve(&self, target: FanTarget, speeds: &[f64]) -> Result<()> {
        let mut state = self.lock_state();
        let mut curve = *state.curve(target);
        curve.set_all(speeds)?;
        *state.curve_mut(target) = curve;

        info!("{} fan curve replaced: {}", target, curve);
        self.persist(&state)?;
        Ok(())
    }

    pub fn set_threshold(&self, value: i64) -> Result<()> {
        let mut state = self.lock_state();
        state.set_low_temp_threshold(value)?;

        info!("Low temperature threshold set to {}°C", value);
        self.persist(&state)?;
        Ok(())
    }

    pub fn select_mode(&self, mode: BaseMode) -> Result<Transition> {
        self.apply_command(ModeCommand::Select(mode))
    }

    pub fn set_full_speed(&self, enabled: bool) -> Result<Transition> {
        let command = if enabled {
            ModeCommand::EnableFullSpeed
        } else {
            ModeCommand::DisableFullSpeed
        };
        self.apply_command(command)
    }

    fn apply_command(&self, command: ModeCommand) -> Result<Transition> {
        let mut state = self.lock_state();
        let change = transition(state.mode, command);
        if !change.changed() {
            return Ok(change);
        }

        apply_profile(self.platform(), change.to.hardware_profile())?;
        state.mode = change.to;
        self.record_change(change.from, change.to, format!("{:?}", command));
        self.persist(&state)?;
        Ok(change)
    }

    pub fn set_performance_mode(&self, mode: PerformanceMode) -> Result<()> {
        self.platform.set_performance_mode(mode.code())?;
        info!("Performance mode set to {}", mode);
        Ok(())
    }

    /// Default curves and threshold, custom mode, full speed off.
    pub fn restore_defaults(&self) -> Result<()> {
        let mut state = self.lock_state();
        let defaults = ControllerState::default();

        apply_profile(self.platform(), defaults.mode.hardware_profile())?;
        let previous = std::mem::replace(&mut *state, defaults);
        if previous.mode != state.mode {
            self.record_change(previous.mode, state.mode, "defaults restored".to_string());
        }

        info!("Default fan curves and settings restored");
        self.persist(&state)?;
        Ok(())
    }

    /// Write the current state to another file.
    pub fn save_as(&self, path: &Path) -> Result<PathBuf> {
        let state = self.lock_state();
        let saved = ConfigStore::save_to(path, &state)?;
        info!("Configuration saved to {}", saved.display());
        Ok(saved)
    }

    /// Replace the current state with a configuration file.
    pub fn load_from(&self, path: &Path) -> Result<()> {
        let mut state = self.lock_state();
        let loaded = ConfigStore::load(path, self.platform())?;

        let previous = std::mem::replace(&mut *state, loaded);
        if previous.mode != state.mode {
            self.record_change(
                previous.mode,
                state.mode,
                format!("loaded {}", path.display()),
            );
        }
        self.persist(&state)?;
        Ok(())
    }

    /// Reset the hardware to a safe state and write the final configuration.
    ///
    /// The stored mode is left as it was so the next start restores it.
    pub fn shutdown(&self) -> Result<PathBuf> {
        let state = self.lock_state();
        self.shut_down.store(true, Ordering::SeqCst);
        if let Err(e) = reset_to_safe(self.platform()) {
            warn!("Failed to restore default fan mode: {}", e);
        }
        let saved = self.persist(&state)?;
        info!("Controller shut down, configuration saved to {}", saved.display());
        Ok(saved)
    }

    fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn record_change(&self, from: Mode, to: Mode, reason: String) {
        info!("Mode changed: {} -> {} ({})", from, to, reason);
        let change = ModeChange {
            from,
            to,
            reason,
            at: chrono::Local::now(),
        };

        let mut status = self.lock_status();
        status.mode = to;
        status.last_change = Some(change.clone());
        drop(status);

        let _ = self.events.send(ControlEvent::ModeChanged(change));
    }

    /// Apply a hysteresis edge computed from a snapshot taken in `expected`.
    ///
    /// Returns `None` when the mode changed since the snapshot or the
    /// controller has shut down.
    pub(crate) fn apply_hysteresis(
        &self,
        expected: Mode,
        edge: HysteresisEdge,
        threshold: i64,
    ) -> Result<Option<Mode>> {
        let mut state = self.lock_state();
        if self.is_shut_down() || state.mode != expected {
            return Ok(None);
        }

        let next = Mode::Custom(edge.phase());
        self.platform
            .set_custom_control_enabled(next.hardware_profile().custom_control)?;
        state.mode = next;
        self.record_change(expected, next, edge.describe(threshold));
        // Logged inside persist; the loop keeps going
        let _ = self.persist(&state);
        Ok(Some(next))
    }

    /// Follow a full-speed toggle made outside the controller.
    pub(crate) fn sync_full_speed(&self, expected: Mode, hardware_full: bool) -> Result<Option<Mode>> {
        if expected.is_full_speed() == hardware_full {
            return Ok(None);
        }

        let mut state = self.lock_state();
        if self.is_shut_down() || state.mode != expected {
            return Ok(None);
        }

        let command = if hardware_full {
            ModeCommand::EnableFullSpeed
        } else {
            ModeCommand::DisableFullSpeed
        };
        let change = transition(expected, command);
        apply_profile(self.platform(), change.to.hardware_profile())?;
        state.mode = change.to;
        self.record_change(change.from, change.to, "full speed toggled externally".to_string());
        let _ = self.persist(&state);
        Ok(Some(change.to))
    }

    /// Send a speed command unless the mode moved on since the snapshot.
    pub(crate) fn command_speeds(&self, expected: Mode, command: SpeedCommand) -> Result<bool> {
        let state = self.lock_state();
        if self.is_shut_down() || state.mode != expected {
            return Ok(false);
        }
        self.platform
            .set_fan_speeds(command.cpu_raw, command.gpu_raw)?;
        Ok(true)
    }

    pub(crate) fn publish_tick(
        &self,
        readings: &SensorReadings,
        mode: Mode,
        command: Option<SpeedCommand>,
        detail: Option<String>,
    ) -> StatusSnapshot {
        let mut status = self.lock_status();
        status.cpu_temp = Some(readings.cpu_temp);
        status.gpu_temp = Some(readings.gpu_temp);
        status.cpu_fan_speed = Some(readings.cpu_fan_speed);
        status.gpu_fan_speed = Some(readings.gpu_fan_speed);
        status.performance = Some(readings.performance);
        status.mode = mode;
        status.last_command = command;
        status.detail = detail;
        status.last_error = None;
        status.updated_at = Some(chrono::Local::now());
        status.ticks += 1;
        let snapshot = status.clone();
        drop(status);

        let _ = self.events.send(ControlEvent::Tick(snapshot.clone()));
        snapshot
    }

    pub(crate) fn publish_failure(&self, err: &FanControlError) {
        error!("Control tick abandoned: {}", err);
        let mut status = self.lock_status();
        status.last_error = Some(err.to_string());
        status.updated_at = Some(chrono::Local::now());
        drop(status);

        let _ = self.events.send(ControlEvent::HardwareFailure(err.to_string()));
    }

    pub(crate) fn publish_timeout(&self, err: HardwareError) {
        self.publish_failure(&FanControlError::Hardware(err));
    }
}
