//! pifan Core Library
//!
//! Shared types, temperature curves, and configuration for the pifan CPU fan
//! controller. Used by the hardware crate and the daemon.

pub mod config;
pub mod error;
pub mod power;

// Re-export commonly used types
pub use config::{
    default_config_path, FanSettings, SensorConfig, TemperatureCurve, TemperatureRangeRule,
    GPIO_PIN_UNCONFIGURED,
};
pub use error::*;
pub use power::{duty_cycle_for_power, PWM_PERIOD_MS};
