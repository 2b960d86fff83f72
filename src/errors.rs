//! Error types for the fan curve controller

use thiserror::Error;

/// Result type alias for the fan curve controller
pub type Result<T> = std::result::Result<T, FanControlError>;

/// Main error type for the fan curve controller
#[derive(Error, Debug)]
pub enum FanControlError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Hardware error: {0}")]
    Hardware(#[from] HardwareError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Rejected user input. Raised before any state is touched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("fan curve needs exactly {expected} points, got {actual}")]
    CurveLength { expected: usize, actual: usize },

    #[error("fan speed is not a number: {value}")]
    NonNumeric { value: String },

    #[error("curve point index {index} is out of range (0-9)")]
    PointIndex { index: usize },

    #[error("fan speed {speed}% is out of range (0-100)")]
    SpeedOutOfRange { speed: i64 },

    #[error("low temperature threshold {value}°C is out of range (0-100)")]
    ThresholdOutOfRange { value: i64 },
}

/// A failed call into the hardware platform.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HardwareError {
    #[error("{operation} failed: {message}")]
    Call {
        operation: &'static str,
        message: String,
    },

    #[error("hardware did not respond within {millis}ms")]
    Timeout { millis: u128 },
}

impl HardwareError {
    pub fn call(operation: &'static str, message: impl std::fmt::Display) -> Self {
        HardwareError::Call {
            operation,
            message: message.to_string(),
        }
    }
}

/// Saving or loading the configuration file failed.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
