//! Error types for the pifan system

use thiserror::Error;

/// Core error type for pifan operations
#[derive(Error, Debug)]
pub enum PiFanError {
    /// Configuration-related errors (unconfigured pin, bad period, invalid curve)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Temperature query failed or produced unparseable output
    #[error("Temperature read error: {0}")]
    TemperatureRead(String),

    /// Acquiring or writing to the PWM output failed
    #[error("Hardware error: {0}")]
    Hardware(String),

    /// Invalid input or arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation requires a running controller
    #[error("Fan controller is not running")]
    NotRunning,

    /// Controller was started twice
    #[error("Fan controller is already running")]
    AlreadyRunning,

    /// Background fan loop ended abnormally (panic or cancellation)
    #[error("Fan loop task failed: {0}")]
    Task(String),

    /// Settings file could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Result type alias for pifan operations
pub type Result<T> = std::result::Result<T, PiFanError>;
