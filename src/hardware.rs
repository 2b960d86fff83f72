//! Interface to the platform's fan and sensor hardware
//!
//! The controller never talks to devices directly. Everything goes through
//! [`Platform`], which the binary backs with [`crate::simulated`] and tests
//! back with [`testing::FakePlatform`].

use crate::errors::HardwareError;
use crate::mode::HardwareProfile;
use std::fmt;

pub type HwResult<T> = std::result::Result<T, HardwareError>;

/// Fan and sensor access. Every call may fail.
pub trait Platform: Send + Sync {
    fn cpu_temperature(&self) -> HwResult<f64>;
    fn gpu_temperature(&self) -> HwResult<f64>;
    fn cpu_fan_speed(&self) -> HwResult<u32>;
    fn gpu_fan_speed(&self) -> HwResult<u32>;
    fn set_fan_speeds(&self, cpu_raw: u32, gpu_raw: u32) -> HwResult<()>;
    fn set_full_speed_mode(&self, enabled: bool) -> HwResult<()>;
    fn full_speed_mode(&self) -> HwResult<bool>;
    fn set_custom_control_enabled(&self, enabled: bool) -> HwResult<()>;
    fn performance_mode(&self) -> HwResult<i32>;
    fn set_performance_mode(&self, code: i32) -> HwResult<()>;
}

/// Apply the hardware flags of a mode. Full speed is switched first.
pub fn apply_profile(platform: &dyn Platform, profile: HardwareProfile) -> HwResult<()> {
    platform.set_full_speed_mode(profile.full_speed)?;
    platform.set_custom_control_enabled(profile.custom_control)
}

/// Leave the fans in a known-safe state: no override, no custom control.
pub fn reset_to_safe(platform: &dyn Platform) -> HwResult<()> {
    apply_profile(
        platform,
        HardwareProfile {
            full_speed: false,
            custom_control: false,
        },
    )
}

/// System performance profile exposed by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PerformanceMode {
    Endurance,
    QuietGaming,
    Rampage,
}

impl PerformanceMode {
    pub fn code(self) -> i32 {
        match self {
            PerformanceMode::Endurance => 0,
            PerformanceMode::QuietGaming => 1,
            PerformanceMode::Rampage => 2,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(PerformanceMode::Endurance),
            1 => Some(PerformanceMode::QuietGaming),
            2 => Some(PerformanceMode::Rampage),
            _ => None,
        }
    }
}

impl fmt::Display for PerformanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PerformanceMode::Endurance => "endurance",
            PerformanceMode::QuietGaming => "quiet gaming",
            PerformanceMode::Rampage => "rampage",
        };
        write!(f, "{}", name)
    }
}

/// A raw performance mode code as read from the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerformanceCode(pub i32);

impl fmt::Display for PerformanceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match PerformanceMode::from_code(self.0) {
            Some(mode) => write!(f, "{}", mode),
            None => write!(f, "unknown({})", self.0),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// A call the controller made into the fake.
    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        SetFanSpeeds(u32, u32),
        SetFullSpeed(bool),
        SetCustomControl(bool),
        SetPerformanceMode(i32),
    }

    type Hook = Box<dyn Fn() + Send + Sync>;

    /// In-memory platform that records every write.
    pub struct FakePlatform {
        pub cpu_temp: Mutex<f64>,
        pub gpu_temp: Mutex<f64>,
        pub full_speed: AtomicBool,
        pub custom_control: AtomicBool,
        pub perf_code: Mutex<i32>,
        pub fail_reads: AtomicBool,
        pub fail_writes: AtomicBool,
        calls: Mutex<Vec<Call>>,
        read_hook: Mutex<Option<Hook>>,
    }

    impl FakePlatform {
        pub fn new(cpu_temp: f64, gpu_temp: f64) -> Self {
            Self {
                cpu_temp: Mutex::new(cpu_temp),
                gpu_temp: Mutex::new(gpu_temp),
                full_speed: AtomicBool::new(false),
                custom_control: AtomicBool::new(false),
                perf_code: Mutex::new(1),
                fail_reads: AtomicBool::new(false),
                fail_writes: AtomicBool::new(false),
                calls: Mutex::new(Vec::new()),
                read_hook: Mutex::new(None),
            }
        }

        pub fn set_temps(&self, cpu: f64, gpu: f64) {
            *self.cpu_temp.lock().unwrap() = cpu;
            *self.gpu_temp.lock().unwrap() = gpu;
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn clear_calls(&self) {
            self.calls.lock().unwrap().clear();
        }

        pub fn speed_commands(&self) -> Vec<(u32, u32)> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::SetFanSpeeds(cpu, gpu) => Some((cpu, gpu)),
                    _ => None,
                })
                .collect()
        }

        /// Run `hook` the next time the CPU temperature is read.
        pub fn on_next_read(&self, hook: impl Fn() + Send + Sync + 'static) {
            *self.read_hook.lock().unwrap() = Some(Box::new(hook));
        }

        fn read_check(&self, operation: &'static str) -> HwResult<()> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(HardwareError::call(operation, "sensor unavailable"));
            }
            Ok(())
        }

        fn record(&self, operation: &'static str, call: Call) -> HwResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(HardwareError::call(operation, "device rejected command"));
            }
            self.calls.lock().unwrap().push(call);
            Ok(())
        }
    }

    impl Platform for FakePlatform {
        fn cpu_temperature(&self) -> HwResult<f64> {
            self.read_check("cpu_temperature")?;
            let hook = self.read_hook.lock().unwrap().take();
            if let Some(hook) = hook {
                hook();
            }
            Ok(*self.cpu_temp.lock().unwrap())
        }

        fn gpu_temperature(&self) -> HwResult<f64> {
            self.read_check("gpu_temperature")?;
            Ok(*self.gpu_temp.lock().unwrap())
        }

        fn cpu_fan_speed(&self) -> HwResult<u32> {
            self.read_check("cpu_fan_speed")?;
            Ok(3100)
        }

        fn gpu_fan_speed(&self) -> HwResult<u32> {
            self.read_check("gpu_fan_speed")?;
            Ok(2900)
        }

        fn set_fan_speeds(&self, cpu_raw: u32, gpu_raw: u32) -> HwResult<()> {
            self.record("set_fan_speeds", Call::SetFanSpeeds(cpu_raw, gpu_raw))
        }

        fn set_full_speed_mode(&self, enabled: bool) -> HwResult<()> {
            self.record("set_full_speed_mode", Call::SetFullSpeed(enabled))?;
            self.full_speed.store(enabled, Ordering::SeqCst);
            Ok(())
        }

        fn full_speed_mode(&self) -> HwResult<bool> {
            self.read_check("full_speed_mode")?;
            Ok(self.full_speed.load(Ordering::SeqCst))
        }

        fn set_custom_control_enabled(&self, enabled: bool) -> HwResult<()> {
            self.record("set_custom_control_enabled", Call::SetCustomControl(enabled))?;
            self.custom_control.store(enabled, Ordering::SeqCst);
            Ok(())
        }

        fn performance_mode(&self) -> HwResult<i32> {
            self.read_check("performance_mode")?;
            Ok(*self.perf_code.lock().unwrap())
        }

        fn set_performance_mode(&self, code: i32) -> HwResult<()> {
            self.record("set_performance_mode", Call::SetPerformanceMode(code))?;
            *self.perf_code.lock().unwrap() = code;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{Call, FakePlatform};
    use super::*;

    #[test]
    fn test_apply_profile_order() {
        let platform = FakePlatform::new(50.0, 50.0);
        apply_profile(
            &platform,
            HardwareProfile {
                full_speed: true,
                custom_control: false,
            },
        )
        .unwrap();
        assert_eq!(
            platform.calls(),
            vec![Call::SetFullSpeed(true), Call::SetCustomControl(false)]
        );
    }

    #[test]
    fn test_performance_codes() {
        for mode in [
            PerformanceMode::Endurance,
            PerformanceMode::QuietGaming,
            PerformanceMode::Rampage,
        ] {
            assert_eq!(PerformanceMode::from_code(mode.code()), Some(mode));
        }
        assert_eq!(PerformanceMode::from_code(7), None);
        assert_eq!(PerformanceCode(7).to_string(), "unknown(7)");
        assert_eq!(PerformanceCode(2).to_string(), "rampage");
    }
}
