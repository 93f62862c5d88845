//! Temperature reader - CPU temperature from an OS command
//!
//! The Raspberry Pi firmware reports the SoC temperature through
//! `vcgencmd measure_temp`, which prints a single line such as `temp=41.2'C`.

use async_trait::async_trait;
use pifan_core::{PiFanError, Result, SensorConfig};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Trait for temperature sources
///
/// This trait enables testing of `FanController` without a real sensor
/// by allowing mock implementations.
#[async_trait]
pub trait TemperatureSensor: Send {
    /// Read the current CPU temperature in Celsius
    async fn read_celsius(&mut self) -> Result<f64>;
}

/// Parse the first line of `vcgencmd measure_temp` output.
///
/// Accepts exactly `temp=<digits>[.<digits>]'C`, optionally followed by a
/// `\n`. Signs, exponents, carriage returns and surrounding whitespace are
/// rejected.
pub fn parse_measure_temp(output: &str) -> Result<f64> {
    let line = output.split('\n').next().unwrap_or("");

    let number = line
        .strip_prefix("temp=")
        .and_then(|rest| rest.strip_suffix("'C"))
        .filter(|number| is_plain_decimal(number))
        .ok_or_else(|| {
            PiFanError::TemperatureRead(format!("Unexpected sensor output: {:?}", line))
        })?;

    number.parse::<f64>().map_err(|e| {
        PiFanError::TemperatureRead(format!("Invalid temperature '{}': {}", number, e))
    })
}

/// `\d+(\.\d+)?`
fn is_plain_decimal(s: &str) -> bool {
    let (int_part, frac_part) = match s.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (s, None),
    };
    let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());

    all_digits(int_part) && frac_part.map_or(true, all_digits)
}

/// Sensor that runs an external command and parses its output
#[derive(Debug, Clone)]
pub struct CommandSensor {
    program: String,
    args: Vec<String>,
    timeout_duration: Duration,
}

impl CommandSensor {
    /// Create a new command sensor
    ///
    /// # Arguments
    /// * `program` - Executable to run (e.g., "vcgencmd")
    /// * `args` - Arguments passed to the program
    /// * `timeout_duration` - Maximum time to wait for the command
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout_duration: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout_duration,
        }
    }

    /// Create a sensor from the `[sensor]` section of the settings
    pub fn from_config(config: &SensorConfig) -> Result<Self> {
        let (program, args) = config
            .command
            .split_first()
            .ok_or_else(|| PiFanError::Config("sensor command must not be empty".to_string()))?;

        Ok(Self::new(
            program.clone(),
            args.to_vec(),
            config.timeout(),
        ))
    }

    async fn run(&self) -> Result<String> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = timeout(self.timeout_duration, command.output())
            .await
            .map_err(|_| {
                PiFanError::TemperatureRead(format!(
                    "'{}' timed out after {:?}",
                    self.program, self.timeout_duration
                ))
            })?
            .map_err(|e| {
                PiFanError::TemperatureRead(format!("Failed to run '{}': {}", self.program, e))
            })?;

        if !output.status.success() {
            return Err(PiFanError::TemperatureRead(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl TemperatureSensor for CommandSensor {
    async fn read_celsius(&mut self) -> Result<f64> {
        let stdout = self.run().await?;
        debug!("Sensor output: {:?}", stdout);
        parse_measure_temp(&stdout)
    }
}
