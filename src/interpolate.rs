//! Curve interpolation and conversion to raw device speeds

use crate::fan::{FanCurve, CURVE_POINTS, CURVE_TEMPERATURES};

/// Raw device units per curve percent (0-100% → 0-6300).
pub const SPEED_SCALE: f64 = 63.0;

/// Highest raw speed the device accepts.
pub const DEVICE_MAX_SPEED: u32 = 6300;

/// Calculate the fan speed percentage for a temperature.
///
/// Temperatures at or below the first point, or at or above the last point,
/// take that point's speed. In between, speeds are linearly interpolated and
/// rounded to the nearest percent, halves away from zero.
pub fn interpolate(curve: &FanCurve, temperature: f64) -> u8 {
    let speeds = curve.speeds();

    if temperature.is_nan() || temperature <= CURVE_TEMPERATURES[0] {
        return speeds[0];
    }
    if temperature >= CURVE_TEMPERATURES[CURVE_POINTS - 1] {
        return speeds[CURVE_POINTS - 1];
    }

    // First point strictly above or equal to the temperature; never 0 here
    let upper = CURVE_TEMPERATURES.partition_point(|&t| t < temperature);
    let lower = upper - 1;

    let (t1, t2) = (CURVE_TEMPERATURES[lower], CURVE_TEMPERATURES[upper]);
    let (s1, s2) = (speeds[lower] as f64, speeds[upper] as f64);

    let factor = (temperature - t1) / (t2 - t1);
    (s1 + (s2 - s1) * factor).round() as u8
}

/// Convert a speed percentage to raw device units.
pub fn to_raw(percent: u8) -> u32 {
    let raw = (percent as f64 * SPEED_SCALE) as u32;
    raw.min(DEVICE_MAX_SPEED)
}

/// A combined CPU/GPU speed command in raw device units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedCommand {
    pub cpu_raw: u32,
    pub gpu_raw: u32,
}

impl SpeedCommand {
    pub fn from_percent(cpu_percent: u8, gpu_percent: u8) -> Self {
        Self {
            cpu_raw: to_raw(cpu_percent),
            gpu_raw: to_raw(gpu_percent),
        }
    }

    pub fn from_temperatures(
        cpu_curve: &FanCurve,
        gpu_curve: &FanCurve,
        cpu_temp: f64,
        gpu_temp: f64,
    ) -> Self {
        Self::from_percent(
            interpolate(cpu_curve, cpu_temp),
            interpolate(gpu_curve, gpu_temp),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(speeds: [f64; 10]) -> FanCurve {
        FanCurve::from_speeds(&speeds).unwrap()
    }

    #[test]
    fn test_exact_points() {
        let curve = curve([0.0, 12.0, 20.0, 33.0, 41.0, 47.0, 58.0, 64.0, 77.0, 100.0]);
        for (i, point) in curve.points().enumerate() {
            assert_eq!(interpolate(&curve, point.temp), point.speed, "point {}", i);
        }
    }

    #[test]
    fn test_flat_extrapolation() {
        let curve = FanCurve::default();
        assert_eq!(interpolate(&curve, 95.0), 83);
        assert_eq!(interpolate(&curve, 150.0), 83);
        assert_eq!(interpolate(&curve, -5.0), 0);
        assert_eq!(interpolate(&curve, f64::NAN), 0);
    }

    #[test]
    fn test_interpolation_between_points() {
        let curve = FanCurve::default();
        // 40°C(38%) .. 50°C(47%): 42.5 rounds half away from zero
        assert_eq!(interpolate(&curve, 45.0), 43);
        assert_eq!(interpolate(&curve, 44.0), 42);
        // 0°C(0%) .. 10°C(38%)
        assert_eq!(interpolate(&curve, 5.0), 19);
        // 80°C(74%) .. 90°C(83%)
        assert_eq!(interpolate(&curve, 89.9), 83);
    }

    #[test]
    fn test_raw_conversion() {
        assert_eq!(to_raw(0), 0);
        assert_eq!(to_raw(43), 2709);
        assert_eq!(to_raw(100), DEVICE_MAX_SPEED);
        assert_eq!(to_raw(255), DEVICE_MAX_SPEED);
    }

    #[test]
    fn test_speed_command() {
        let cpu = FanCurve::default();
        let gpu = curve([0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0]);
        let command = SpeedCommand::from_temperatures(&cpu, &gpu, 45.0, 65.0);
        assert_eq!(
            command,
            SpeedCommand {
                cpu_raw: 43 * 63,
                gpu_raw: 65 * 63
            }
        );
    }
}
