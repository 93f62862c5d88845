//! Fan settings loaded once at startup
//!
//! These settings are read-only after the controller is constructed.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::temperature_rules::TemperatureCurve;
use crate::error::{PiFanError, Result};

/// Sentinel pin value meaning "no fan wired up".
pub const GPIO_PIN_UNCONFIGURED: i32 = -1;

/// Highest BCM GPIO number exposed by the Raspberry Pi SoC.
pub const MAX_BCM_PIN: i32 = 53;

/// Default seconds between two controller updates.
pub const DEFAULT_UPDATE_PERIOD_SECS: f64 = 10.0;

fn default_gpio_pin() -> i32 {
    GPIO_PIN_UNCONFIGURED
}

fn default_update_period_secs() -> f64 {
    DEFAULT_UPDATE_PERIOD_SECS
}

/// Temperature sensor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Program and arguments printing `temp=<float>'C`
    pub command: Vec<String>,
    /// Timeout for the command in milliseconds
    pub timeout_ms: u64,
}

impl SensorConfig {
    /// Command timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            command: vec!["vcgencmd".to_string(), "measure_temp".to_string()],
            timeout_ms: 5000,
        }
    }
}

/// Settings for the fan controller.
///
/// Located at `~/.config/pifan/config.toml` by default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanSettings {
    /// BCM pin driving the fan transistor, `-1` when not configured
    #[serde(default = "default_gpio_pin")]
    pub gpio_pin: i32,

    /// Seconds between controller updates
    #[serde(default = "default_update_period_secs")]
    pub update_period_secs: f64,

    /// Temperature sensor command
    #[serde(default)]
    pub sensor: SensorConfig,

    /// Temperature-to-power rules, in ascending temperature order
    #[serde(default)]
    pub rules: TemperatureCurve,
}

impl Default for FanSettings {
    fn default() -> Self {
        Self {
            gpio_pin: GPIO_PIN_UNCONFIGURED,
            update_period_secs: DEFAULT_UPDATE_PERIOD_SECS,
            sensor: SensorConfig::default(),
            rules: TemperatureCurve::with_defaults(),
        }
    }
}

impl FanSettings {
    /// Whether a fan pin has been set.
    pub fn is_configured(&self) -> bool {
        self.gpio_pin != GPIO_PIN_UNCONFIGURED
    }

    /// The configured pin as a BCM number.
    pub fn pin(&self) -> Result<u8> {
        if !self.is_configured() {
            return Err(PiFanError::Config("GPIO pin not configured".to_string()));
        }
        if !(0..=MAX_BCM_PIN).contains(&self.gpio_pin) {
            return Err(PiFanError::Config(format!(
                "GPIO pin {} is outside valid range (0 to {})",
                self.gpio_pin, MAX_BCM_PIN
            )));
        }
        Ok(self.gpio_pin as u8)
    }

    /// The update period as a [`Duration`].
    pub fn update_period(&self) -> Result<Duration> {
        if self.update_period_secs <= 0.0 {
            return Err(PiFanError::Config(format!(
                "update_period_secs must be a positive number, got {}",
                self.update_period_secs
            )));
        }
        Duration::try_from_secs_f64(self.update_period_secs).map_err(|e| {
            PiFanError::Config(format!(
                "update_period_secs {} is not a usable period: {}",
                self.update_period_secs, e
            ))
        })
    }

    /// Validate everything needed to start the controller.
    pub fn validate(&self) -> Result<()> {
        self.pin()?;
        self.update_period()?;

        if self.sensor.command.is_empty() {
            return Err(PiFanError::Config("sensor command must not be empty".to_string()));
        }
        if self.sensor.timeout_ms == 0 {
            return Err(PiFanError::Config("sensor timeout_ms must be positive".to_string()));
        }

        self.rules
            .validate()
            .map_err(|e| PiFanError::Config(format!("Invalid temperature rules: {}", e)))
    }

    /// Parse FanSettings from TOML string.
    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize FanSettings to TOML string.
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
