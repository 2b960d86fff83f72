use crate::errors::ValidationError;
use crate::fan::{FanCurve, FanTarget};
use crate::mode::Mode;

pub const DEFAULT_LOW_TEMP_THRESHOLD: i64 = 45;

/// Everything the controller needs to make a decision, and everything that
/// gets persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerState {
    pub cpu_curve: FanCurve,
    pub gpu_curve: FanCurve,
    low_temp_threshold: i64,
    pub mode: Mode,
}

impl ControllerState {
    pub fn new(
        cpu_curve: FanCurve,
        gpu_curve: FanCurve,
        low_temp_threshold: i64,
        mode: Mode,
    ) -> Result<Self, ValidationError> {
        let mut state = Self {
            cpu_curve,
            gpu_curve,
            mode,
            ..Self::default()
        };
        state.set_low_temp_threshold(low_temp_threshold)?;
        Ok(state)
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn low_temp_threshold(&self) -> i64 {
        self.low_temp_threshold
    }

    pub fn set_low_temp_threshold(&mut self, value: i64) -> Result<(), ValidationError> {
        if !(0..=100).contains(&value) {
            return Err(ValidationError::ThresholdOutOfRange { value });
        }
        self.low_temp_threshold = value;
        Ok(())
    }

    pub fn curve(&self, target: FanTarget) -> &FanCurve {
        match target {
            FanTarget::Cpu => &self.cpu_curve,
            FanTarget::Gpu => &self.gpu_curve,
        }
    }

    pub fn curve_mut(&mut self, target: FanTarget) -> &mut FanCurve {
        match target {
            FanTarget::Cpu => &mut self.cpu_curve,
            FanTarget::Gpu => &mut self.gpu_curve,
        }
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self {
            cpu_curve: FanCurve::default(),
            gpu_curve: FanCurve::default(),
            low_temp_threshold: DEFAULT_LOW_TEMP_THRESHOLD,
            mode: Mode::default(),
        }
    }
}
