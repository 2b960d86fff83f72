//! Operating modes and the transitions between them

use std::fmt;

/// Who governs the fans while in custom mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CustomPhase {
    /// The curves drive the fans.
    Following,
    /// Both temperatures are below the threshold; the hardware drives the fans.
    Idle,
}

/// A mode that full-speed can return to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResumeMode {
    Automatic,
    Custom(CustomPhase),
}

/// The active operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Automatic,
    Custom(CustomPhase),
    FullSpeed { resume: ResumeMode },
}

/// Mode a user can pick directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BaseMode {
    #[value(alias = "automatic")]
    Auto,
    #[value(alias = "manual")]
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeCommand {
    Select(BaseMode),
    EnableFullSpeed,
    DisableFullSpeed,
}

/// Result of applying a [`ModeCommand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Mode,
    pub to: Mode,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// A hysteresis edge inside custom mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HysteresisEdge {
    ToIdle,
    ToFollowing,
}

impl HysteresisEdge {
    pub fn phase(self) -> CustomPhase {
        match self {
            HysteresisEdge::ToIdle => CustomPhase::Idle,
            HysteresisEdge::ToFollowing => CustomPhase::Following,
        }
    }

    pub fn describe(self, threshold: i64) -> String {
        match self {
            HysteresisEdge::ToIdle => {
                format!("switched to automatic fans (both below {}°C)", threshold)
            }
            HysteresisEdge::ToFollowing => {
                format!("switched to custom curve (temperature ≥ {}°C)", threshold)
            }
        }
    }
}

/// Hardware flags implied by a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareProfile {
    pub full_speed: bool,
    pub custom_control: bool,
}

impl Mode {
    pub fn is_full_speed(&self) -> bool {
        matches!(self, Mode::FullSpeed { .. })
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Mode::Custom(_))
    }

    pub fn hardware_profile(&self) -> HardwareProfile {
        match self {
            Mode::FullSpeed { .. } => HardwareProfile {
                full_speed: true,
                custom_control: false,
            },
            Mode::Custom(CustomPhase::Following) => HardwareProfile {
                full_speed: false,
                custom_control: true,
            },
            Mode::Automatic | Mode::Custom(CustomPhase::Idle) => HardwareProfile {
                full_speed: false,
                custom_control: false,
            },
        }
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Custom(CustomPhase::Idle)
    }
}

impl From<ResumeMode> for Mode {
    fn from(resume: ResumeMode) -> Self {
        match resume {
            ResumeMode::Automatic => Mode::Automatic,
            ResumeMode::Custom(phase) => Mode::Custom(phase),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Automatic => write!(f, "automatic"),
            Mode::Custom(CustomPhase::Following) => write!(f, "custom (following curve)"),
            Mode::Custom(CustomPhase::Idle) => write!(f, "custom (idle, hardware fans)"),
            Mode::FullSpeed { .. } => write!(f, "full speed"),
        }
    }
}

/// Apply a user command to the current mode.
pub fn transition(current: Mode, command: ModeCommand) -> Transition {
    let to = match (current, command) {
        (_, ModeCommand::Select(BaseMode::Auto)) => Mode::Automatic,
        (_, ModeCommand::Select(BaseMode::Custom)) => Mode::Custom(CustomPhase::Idle),
        (Mode::Automatic, ModeCommand::EnableFullSpeed) => Mode::FullSpeed {
            resume: ResumeMode::Automatic,
        },
        (Mode::Custom(phase), ModeCommand::EnableFullSpeed) => Mode::FullSpeed {
            resume: ResumeMode::Custom(phase),
        },
        (Mode::FullSpeed { resume }, ModeCommand::DisableFullSpeed) => resume.into(),
        (mode, _) => mode,
    };

    Transition { from: current, to }
}

/// Decide the custom sub-state from the current temperatures.
///
/// Returns `None` outside custom mode or when the phase would not change.
pub fn evaluate_hysteresis(
    mode: Mode,
    cpu_temp: f64,
    gpu_temp: f64,
    threshold: i64,
) -> Option<HysteresisEdge> {
    let Mode::Custom(phase) = mode else {
        return None;
    };

    let threshold = threshold as f64;
    let is_low = cpu_temp < threshold && gpu_temp < threshold;

    match (phase, is_low) {
        (CustomPhase::Following, true) => Some(HysteresisEdge::ToIdle),
        (CustomPhase::Idle, false) => Some(HysteresisEdge::ToFollowing),
        _ => None,
    }
}
