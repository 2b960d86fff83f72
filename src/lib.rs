//! Fan Curve Controller
//!
//! Closed-loop CPU/GPU fan control for laptops: user-editable fan curves,
//! automatic, custom and full-speed modes, and persisted configuration.

pub mod args;
pub mod config;
pub mod console;
pub mod controller;
pub mod daemon;
pub mod errors;
pub mod fan;
pub mod hardware;
pub mod interpolate;
pub mod logging;
pub mod mode;
pub mod simulated;
pub mod state;

// Re-export commonly used types
pub use config::ConfigStore;
pub use controller::Controller;
pub use daemon::{ControlLoop, LoopSettings};
pub use errors::{FanControlError, Result};
pub use fan::{FanCurve, FanTarget};
pub use hardware::Platform;
pub use mode::Mode;
pub use state::ControllerState;
