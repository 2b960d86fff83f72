//! Simulated laptop platform
//!
//! Stands in for the vendor hardware layer when no real backend is linked.
//! Temperatures wander with a synthetic load and cool down as the fans spin
//! faster, so every mode produces plausible readings.

use crate::errors::HardwareError;
use crate::hardware::{HwResult, Platform};
use crate::interpolate::DEVICE_MAX_SPEED;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, MutexGuard};

const AMBIENT_TEMP: f64 = 32.0;
const AUTO_BASE_RPM: u32 = 1800;

#[derive(Debug)]
struct Device {
    rng: StdRng,
    cpu_temp: f64,
    gpu_temp: f64,
    cpu_rpm: u32,
    gpu_rpm: u32,
    commanded: (u32, u32),
    full_speed: bool,
    custom_control: bool,
    perf_code: i32,
}

/// An in-process platform with a crude thermal model.
pub struct SimulatedPlatform {
    device: Mutex<Device>,
}

impl SimulatedPlatform {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            device: Mutex::new(Device {
                rng,
                cpu_temp: 48.0,
                gpu_temp: 44.0,
                cpu_rpm: AUTO_BASE_RPM,
                gpu_rpm: AUTO_BASE_RPM,
                commanded: (0, 0),
                full_speed: false,
                custom_control: false,
                perf_code: 1,
            }),
        }
    }

    fn device(&self) -> HwResult<MutexGuard<'_, Device>> {
        self.device
            .lock()
            .map_err(|_| HardwareError::call("simulated device", "state lock poisoned"))
    }
}

impl Device {
    /// Advance the model one step. Called on every CPU temperature read.
    fn step(&mut self) {
        let load_heat = match self.perf_code {
            2 => 30.0,
            1 => 18.0,
            _ => 8.0,
        };
        let load = self.rng.gen_range(0.0..1.0) * load_heat;

        self.cpu_rpm = self.fan_rpm(self.commanded.0, self.cpu_temp);
        self.gpu_rpm = self.fan_rpm(self.commanded.1, self.gpu_temp);

        self.cpu_temp = Self::next_temp(self.cpu_temp, load, self.cpu_rpm, &mut self.rng);
        self.gpu_temp = Self::next_temp(self.gpu_temp, load * 0.8, self.gpu_rpm, &mut self.rng);
    }

    fn fan_rpm(&self, commanded: u32, temp: f64) -> u32 {
        if self.full_speed {
            DEVICE_MAX_SPEED
        } else if self.custom_control {
            commanded
        } else {
            let auto = AUTO_BASE_RPM as f64 + (temp - 40.0).max(0.0) * 80.0;
            (auto as u32).min(DEVICE_MAX_SPEED)
        }
    }

    fn next_temp(current: f64, load: f64, rpm: u32, rng: &mut StdRng) -> f64 {
        let cooling = rpm as f64 / DEVICE_MAX_SPEED as f64 * 25.0;
        let target = AMBIENT_TEMP + load + 20.0 - cooling;
        let noise = rng.gen_range(-0.5..0.5);
        let next = current + (target - current) * 0.2 + noise;
        (next * 10.0).round() / 10.0
    }
}

impl Platform for SimulatedPlatform {
    fn cpu_temperature(&self) -> HwResult<f64> {
        let mut device = self.device()?;
        device.step();
        Ok(device.cpu_temp)
    }

    fn gpu_temperature(&self) -> HwResult<f64> {
        Ok(self.device()?.gpu_temp)
    }

    fn cpu_fan_speed(&self) -> HwResult<u32> {
        Ok(self.device()?.cpu_rpm)
    }

    fn gpu_fan_speed(&self) -> HwResult<u32> {
        Ok(self.device()?.gpu_rpm)
    }

    fn set_fan_speeds(&self, cpu_raw: u32, gpu_raw: u32) -> HwResult<()> {
        if cpu_raw > DEVICE_MAX_SPEED || gpu_raw > DEVICE_MAX_SPEED {
            return Err(HardwareError::call(
                "set_fan_speeds",
                format!("speed {}/{} above device maximum", cpu_raw, gpu_raw),
            ));
        }
        debug!("Simulated fan speeds set to {}/{}", cpu_raw, gpu_raw);
        self.device()?.commanded = (cpu_raw, gpu_raw);
        Ok(())
    }

    fn set_full_speed_mode(&self, enabled: bool) -> HwResult<()> {
        self.device()?.full_speed = enabled;
        Ok(())
    }

    fn full_speed_mode(&self) -> HwResult<bool> {
        Ok(self.device()?.full_speed)
    }

    fn set_custom_control_enabled(&self, enabled: bool) -> HwResult<()> {
        self.device()?.custom_control = enabled;
        Ok(())
    }

    fn performance_mode(&self) -> HwResult<i32> {
        Ok(self.device()?.perf_code)
    }

    fn set_performance_mode(&self, code: i32) -> HwResult<()> {
        if !(0..=2).contains(&code) {
            return Err(HardwareError::call(
                "set_performance_mode",
                format!("unsupported mode code {}", code),
            ));
        }
        self.device()?.perf_code = code;
        Ok(())
    }
}
