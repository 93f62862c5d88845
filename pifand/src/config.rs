//! Configuration loading
//!
//! Reads the TOML settings file, creating it with defaults on first run, and
//! applies command-line overrides on top.

use pifan_core::{FanSettings, PiFanError, Result};
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

/// Values given on the command line that take precedence over the file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsOverrides {
    /// `--gpio-pin`
    pub gpio_pin: Option<i32>,
    /// `--update-period`
    pub update_period_secs: Option<f64>,
}

impl SettingsOverrides {
    /// Apply the overrides to `settings`.
    pub fn apply(&self, settings: &mut FanSettings) {
        if let Some(pin) = self.gpio_pin {
            debug!("GPIO pin overridden on command line: {}", pin);
            settings.gpio_pin = pin;
        }
        if let Some(period) = self.update_period_secs {
            debug!("Update period overridden on command line: {}s", period);
            settings.update_period_secs = period;
        }
    }
}

/// Load settings from `path`, creating the file with defaults if missing.
pub async fn load_settings(path: &Path) -> Result<FanSettings> {
    match fs::read_to_string(path).await {
        Ok(content) => {
            let settings = FanSettings::from_toml(&content)
                .map_err(|e| PiFanError::Parse(format!("{}: {}", path.display(), e)))?;
            debug!("Settings from {}: {:?}", path.display(), settings);
            Ok(settings)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => write_defaults(path).await,
        Err(e) => Err(PiFanError::Config(format!(
            "Cannot read {}: {}",
            path.display(),
            e
        ))),
    }
}

/// First run: persist the default settings so the user has a file to edit.
async fn write_defaults(path: &Path) -> Result<FanSettings> {
    let settings = FanSettings::default();
    let io_error = |e: std::io::Error| {
        PiFanError::Config(format!("Cannot write {}: {}", path.display(), e))
    };

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).await.map_err(io_error)?;
    }
    let toml_str = settings
        .to_toml()
        .map_err(|e| PiFanError::Config(format!("Cannot serialize default settings: {}", e)))?;
    fs::write(path, toml_str).await.map_err(io_error)?;

    info!(
        "No settings at {}; wrote defaults (gpio_pin = {}, fan control disabled)",
        path.display(),
        settings.gpio_pin
    );
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pifan_core::GPIO_PIN_UNCONFIGURED;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_creates_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let settings = load_settings(&path).await.unwrap();

        assert_eq!(settings, FanSettings::default());
        assert!(path.exists());
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(FanSettings::from_toml(&written).unwrap(), settings);
    }

    #[tokio::test]
    async fn test_existing_file_is_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "gpio_pin = 18\nupdate_period_secs = 3.0\n").unwrap();

        let settings = load_settings(&path).await.unwrap();
        assert_eq!(settings.gpio_pin, 18);
        assert_eq!(settings.update_period_secs, 3.0);
    }

    #[tokio::test]
    async fn test_malformed_file_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "gpio_pin = \"eighteen\"\n").unwrap();

        let err = load_settings(&path).await.unwrap_err();
        assert!(matches!(err, PiFanError::Parse(_)));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_overrides_apply() {
        let mut settings = FanSettings::default();
        SettingsOverrides::default().apply(&mut settings);
        assert_eq!(settings.gpio_pin, GPIO_PIN_UNCONFIGURED);

        let overrides = SettingsOverrides {
            gpio_pin: Some(18),
            update_period_secs: Some(1.5),
        };
        overrides.apply(&mut settings);
        assert_eq!(settings.gpio_pin, 18);
        assert_eq!(settings.update_period_secs, 1.5);
    }
}
