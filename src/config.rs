//! Persistence of curves, threshold and mode flags

use crate::errors::{PersistenceError, Result};
use crate::fan::{FanCurve, DEFAULT_SPEEDS};
use crate::hardware::{apply_profile, Platform};
use crate::mode::{CustomPhase, Mode, ResumeMode};
use crate::state::{ControllerState, DEFAULT_LOW_TEMP_THRESHOLD};
use log::{info, warn};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_ENV: &str = "FAN_CONTROL_CONFIG";
const MODE_AUTO: &str = "auto";
const MODE_MANUAL: &str = "manual";

/// On-disk layout of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PersistedConfig {
    pub cpu_fans: Vec<u8>,
    pub gpu_fans: Vec<u8>,
    pub low_temp_threshold: i64,
    pub current_fan_mode: String,
    pub is_custom_mode: bool,
    pub is_full_mode: bool,
    pub last_non_full_mode: String,
}

fn fan_mode_name(manual: bool) -> String {
    let name = if manual { MODE_MANUAL } else { MODE_AUTO };
    name.to_string()
}

impl From<&ControllerState> for PersistedConfig {
    fn from(state: &ControllerState) -> Self {
        let (base, is_full_mode) = match state.mode {
            Mode::FullSpeed { resume } => (resume, true),
            Mode::Automatic => (ResumeMode::Automatic, false),
            Mode::Custom(phase) => (ResumeMode::Custom(phase), false),
        };
        let following = base == ResumeMode::Custom(CustomPhase::Following);
        let custom_base = matches!(base, ResumeMode::Custom(_));

        Self {
            cpu_fans: state.cpu_curve.speeds().to_vec(),
            gpu_fans: state.gpu_curve.speeds().to_vec(),
            low_temp_threshold: state.low_temp_threshold(),
            current_fan_mode: fan_mode_name(following),
            is_custom_mode: state.mode.is_custom(),
            is_full_mode,
            last_non_full_mode: fan_mode_name(custom_base),
        }
    }
}

/// Reads and writes the controller state as JSON.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `$FAN_CONTROL_CONFIG`, or `~/.fan_control/fan_config.json`.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home).join(".fan_control").join("fan_config.json")
    }

    pub fn save(&self, state: &ControllerState) -> std::result::Result<PathBuf, PersistenceError> {
        Self::save_to(&self.path, state)
    }

    /// Write the state to `path` through a temporary file and a rename.
    pub fn save_to(
        path: &Path,
        state: &ControllerState,
    ) -> std::result::Result<PathBuf, PersistenceError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(&PersistedConfig::from(state))?;
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, json)?;

        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(path.to_path_buf())
    }

    /// Parse a configuration file without touching hardware.
    ///
    /// Missing or malformed fields take their defaults; only an unreadable
    /// file or a document that is not a JSON object fails.
    pub fn read(path: &Path) -> std::result::Result<ControllerState, PersistenceError> {
        let json = fs::read_to_string(path)?;
        let fields: Map<String, Value> = serde_json::from_str(&json)?;
        Ok(state_from_fields(&fields))
    }

    /// Load a configuration file and bring the hardware in line with the
    /// loaded mode.
    pub fn load(path: &Path, platform: &dyn Platform) -> Result<ControllerState> {
        let state = Self::read(path)?;
        apply_profile(platform, state.mode.hardware_profile())?;
        info!("Loaded configuration from {} (mode: {})", path.display(), state.mode);
        Ok(state)
    }
}

fn state_from_fields(fields: &Map<String, Value>) -> ControllerState {
    let cpu_curve = curve_field(fields, "CpuFans");
    let gpu_curve = curve_field(fields, "GpuFans");
    let threshold = threshold_field(fields);

    let is_full = bool_field(fields, "IsFullMode", false);
    let is_custom = bool_field(fields, "IsCustomMode", false);
    let following = fan_mode_field(fields, "CurrentFanMode", false);
    let last_custom = fan_mode_field(fields, "LastNonFullMode", false);

    let phase = if following {
        CustomPhase::Following
    } else {
        CustomPhase::Idle
    };
    let mode = if is_full {
        let resume = if last_custom {
            ResumeMode::Custom(phase)
        } else {
            ResumeMode::Automatic
        };
        Mode::FullSpeed { resume }
    } else if is_custom {
        Mode::Custom(phase)
    } else {
        Mode::Automatic
    };

    let mut state = ControllerState::default().with_mode(mode);
    state.cpu_curve = cpu_curve;
    state.gpu_curve = gpu_curve;
    if state.set_low_temp_threshold(threshold).is_err() {
        warn!("LowTempThreshold {} out of range, using default", threshold);
    }
    state
}

fn curve_field(fields: &Map<String, Value>, key: &str) -> FanCurve {
    let speeds: Option<Vec<f64>> = fields
        .get(key)
        .and_then(Value::as_array)
        .and_then(|values| values.iter().map(Value::as_f64).collect());

    match speeds.map(|s| FanCurve::from_speeds(&s)) {
        Some(Ok(curve)) => curve,
        Some(Err(e)) => {
            warn!("{} is invalid ({}), using default curve {:?}", key, e, DEFAULT_SPEEDS);
            FanCurve::default()
        }
        None => {
            warn!("{} missing or not numeric, using default curve", key);
            FanCurve::default()
        }
    }
}

fn threshold_field(fields: &Map<String, Value>) -> i64 {
    match fields.get("LowTempThreshold").and_then(Value::as_i64) {
        Some(value) => value,
        None => {
            warn!(
                "LowTempThreshold missing or not an integer, using {}",
                DEFAULT_LOW_TEMP_THRESHOLD
            );
            DEFAULT_LOW_TEMP_THRESHOLD
        }
    }
}

fn bool_field(fields: &Map<String, Value>, key: &str, default: bool) -> bool {
    match fields.get(key).and_then(Value::as_bool) {
        Some(value) => value,
        None => {
            warn!("{} missing or not a boolean, using {}", key, default);
            default
        }
    }
}

/// `true` for "manual", `false` for "auto".
fn fan_mode_field(fields: &Map<String, Value>, key: &str, default: bool) -> bool {
    match fields.get(key).and_then(Value::as_str) {
        Some(MODE_MANUAL) => true,
        Some(MODE_AUTO) => false,
        other => {
            warn!("{} has unexpected value {:?}, using default", key, other);
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FanControlError;
    use crate::hardware::testing::{Call, FakePlatform};
    use tempfile::TempDir;

    fn all_modes() -> Vec<Mode> {
        let phases = [CustomPhase::Following, CustomPhase::Idle];
        let mut modes = vec![
            Mode::Automatic,
            Mode::FullSpeed {
                resume: ResumeMode::Automatic,
            },
        ];
        for phase in phases {
            modes.push(Mode::Custom(phase));
            modes.push(Mode::FullSpeed {
                resume: ResumeMode::Custom(phase),
            });
        }
        modes
    }

    #[test]
    fn test_round_trip_every_mode() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().join("fan_config.json"));

        for mode in all_modes() {
            let state = ControllerState::new(
                FanCurve::from_speeds(&[0.0, 20.0, 25.0, 30.0, 40.0, 50.0, 61.0, 72.0, 88.0, 100.0])
                    .unwrap(),
                FanCurve::default(),
                38,
                mode,
            )
            .unwrap();
            let path = store.save(&state).unwrap();
            assert_eq!(ConfigStore::read(&path).unwrap(), state, "mode {:?}", mode);
        }
    }

    #[test]
    fn test_persisted_field_names() {
        let state = ControllerState::default().with_mode(Mode::FullSpeed {
            resume: ResumeMode::Custom(CustomPhase::Following),
        });
        let value = serde_json::to_value(PersistedConfig::from(&state)).unwrap();
        assert_eq!(value["CpuFans"][9], 83);
        assert_eq!(value["LowTempThreshold"], 45);
        assert_eq!(value["CurrentFanMode"], "manual");
        assert_eq!(value["IsCustomMode"], false);
        assert_eq!(value["IsFullMode"], true);
        assert_eq!(value["LastNonFullMode"], "manual");
    }

    #[test]
    fn test_malformed_fields_fall_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fan_config.json");
        fs::write(
            &path,
            r#"{
                "CpuFans": [0, 10, 20],
                "GpuFans": [0, "x", 20, 30, 40, 50, 60, 70, 80, 90],
                "LowTempThreshold": 250,
                "CurrentFanMode": "turbo",
                "IsCustomMode": true
            }"#,
        )
        .unwrap();

        let state = ConfigStore::read(&path).unwrap();
        assert_eq!(state.cpu_curve, FanCurve::default());
        assert_eq!(state.gpu_curve, FanCurve::default());
        assert_eq!(state.low_temp_threshold(), DEFAULT_LOW_TEMP_THRESHOLD);
        assert_eq!(state.mode, Mode::Custom(CustomPhase::Idle));
    }

    #[test]
    fn test_loaded_curve_is_normalised() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fan_config.json");
        fs::write(
            &path,
            r#"{"CpuFans": [30, 10, 20, 30, 40, 50, 60, 70, 80, 140]}"#,
        )
        .unwrap();

        let state = ConfigStore::read(&path).unwrap();
        assert_eq!(state.cpu_curve.speeds(), &[0, 10, 20, 30, 40, 50, 60, 70, 80, 100]);
        assert_eq!(state.mode, Mode::Automatic);
    }

    #[test]
    fn test_read_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            ConfigStore::read(&missing),
            Err(PersistenceError::Io(_))
        ));

        let garbage = dir.path().join("garbage.json");
        fs::write(&garbage, "not json").unwrap();
        assert!(matches!(
            ConfigStore::read(&garbage),
            Err(PersistenceError::Parse(_))
        ));
    }

    #[test]
    fn test_load_reasserts_hardware() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().join("nested").join("fan_config.json"));
        let state = ControllerState::default().with_mode(Mode::FullSpeed {
            resume: ResumeMode::Automatic,
        });
        store.save(&state).unwrap();

        let platform = FakePlatform::new(40.0, 40.0);
        let loaded = ConfigStore::load(store.path(), &platform).unwrap();
        assert_eq!(loaded, state);
        assert_eq!(
            platform.calls(),
            vec![Call::SetFullSpeed(true), Call::SetCustomControl(false)]
        );
    }

    #[test]
    fn test_load_reports_hardware_failure() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().join("fan_config.json"));
        store.save(&ControllerState::default()).unwrap();

        let platform = FakePlatform::new(40.0, 40.0);
        platform
            .fail_writes
            .store(true, std::sync::atomic::Ordering::SeqCst);
        assert!(matches!(
            ConfigStore::load(store.path(), &platform),
            Err(FanControlError::Hardware(_))
        ));
    }
}
