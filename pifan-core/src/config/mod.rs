//! Configuration types for pifan
//!
//! # Architecture
//!
//! All configuration lives in a single TOML file:
//! - [`FanSettings`] - pin, update period, and sensor command
//! - [`TemperatureCurve`] - the `[[rules]]` mapping temperature to fan power
//!
//! Settings are read once at startup and are immutable afterwards.

mod paths;
mod settings;
mod temperature_rules;

pub use paths::default_config_path;
pub use settings::{
    FanSettings, SensorConfig, DEFAULT_UPDATE_PERIOD_SECS, GPIO_PIN_UNCONFIGURED, MAX_BCM_PIN,
};
pub use temperature_rules::{TemperatureCurve, TemperatureRangeRule};
