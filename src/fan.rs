use crate::errors::ValidationError;
use std::fmt;

/// Number of control points in every fan curve.
pub const CURVE_POINTS: usize = 10;

/// Temperatures of the control points, in °C. Shared by every curve.
pub const CURVE_TEMPERATURES: [f64; CURVE_POINTS] =
    [0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0];

/// Speeds used when no curve is configured or a stored curve is unusable.
pub const DEFAULT_SPEEDS: [u8; CURVE_POINTS] = [0, 38, 38, 38, 38, 47, 55, 64, 74, 83];

pub const MAX_SPEED_PERCENT: u8 = 100;

/// Which fan a curve command addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FanTarget {
    Cpu,
    Gpu,
}

impl fmt::Display for FanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FanTarget::Cpu => write!(f, "CPU"),
            FanTarget::Gpu => write!(f, "GPU"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    pub temp: f64,
    pub speed: u8,
}

/// A temperature to fan-speed mapping over the fixed temperatures
/// 0, 10, ..., 90 °C.
///
/// The speed at 0 °C is always 0 and every speed lies in 0..=100. Both
/// mutators validate the whole input first, so a rejected edit leaves the
/// curve exactly as it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FanCurve {
    speeds: [u8; CURVE_POINTS],
}

impl FanCurve {
    /// Build a curve from caller-supplied speeds, with the same rules as
    /// [`FanCurve::set_all`].
    pub fn from_speeds(speeds: &[f64]) -> Result<Self, ValidationError> {
        let mut curve = Self::default();
        curve.set_all(speeds)?;
        Ok(curve)
    }

    pub fn speeds(&self) -> &[u8; CURVE_POINTS] {
        &self.speeds
    }

    pub fn speed_at(&self, index: usize) -> Option<u8> {
        self.speeds.get(index).copied()
    }

    pub fn points(&self) -> impl Iterator<Item = CurvePoint> + '_ {
        CURVE_TEMPERATURES
            .iter()
            .zip(self.speeds.iter())
            .map(|(&temp, &speed)| CurvePoint { temp, speed })
    }

    /// Replace the speed of one control point.
    pub fn set_point(&mut self, index: usize, speed: i64) -> Result<(), ValidationError> {
        if index >= CURVE_POINTS {
            return Err(ValidationError::PointIndex { index });
        }
        if !(0..=MAX_SPEED_PERCENT as i64).contains(&speed) {
            return Err(ValidationError::SpeedOutOfRange { speed });
        }

        self.speeds[index] = if index == 0 { 0 } else { speed as u8 };
        Ok(())
    }

    /// Replace every control point.
    ///
    /// Values outside 0..=100 are clamped and fractional values are rounded
    /// to the nearest percent. Input of the wrong length or containing a
    /// non-finite value is rejected.
    pub fn set_all(&mut self, speeds: &[f64]) -> Result<(), ValidationError> {
        if speeds.len() != CURVE_POINTS {
            return Err(ValidationError::CurveLength {
                expected: CURVE_POINTS,
                actual: speeds.len(),
            });
        }
        if let Some(bad) = speeds.iter().find(|v| !v.is_finite()) {
            return Err(ValidationError::NonNumeric {
                value: bad.to_string(),
            });
        }

        let mut next = [0u8; CURVE_POINTS];
        for (slot, value) in next.iter_mut().zip(speeds).skip(1) {
            *slot = value.round().clamp(0.0, MAX_SPEED_PERCENT as f64) as u8;
        }
        self.speeds = next;
        Ok(())
    }

    /// Parse textual speeds, e.g. from the console.
    pub fn parse_speeds<S: AsRef<str>>(values: &[S]) -> Result<Vec<f64>, ValidationError> {
        values
            .iter()
            .map(|raw| {
                let raw = raw.as_ref().trim();
                raw.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| ValidationError::NonNumeric {
                        value: raw.to_string(),
                    })
            })
            .collect()
    }
}

impl Default for FanCurve {
    fn default() -> Self {
        Self {
            speeds: DEFAULT_SPEEDS,
        }
    }
}

impl fmt::Display for FanCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .points()
            .map(|p| format!("{}°C→{}%", p.temp, p.speed))
            .collect();
        write!(f, "{}", rendered.join(" "))
    }
}
