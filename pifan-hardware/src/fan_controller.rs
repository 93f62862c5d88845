//! Fan Controller - closed-loop temperature to duty cycle control
//!
//! Each tick reads the CPU temperature, maps it through the temperature curve
//! to a power fraction, and writes the matching duty cycle to the PWM output.

use crate::pwm::{PwmBackend, PwmOutput};
use crate::temperature::TemperatureSensor;
use pifan_core::power::{duty_cycle_for_power, validate_power, OFF_DUTY_CYCLE, PWM_PERIOD_MS};
use pifan_core::{FanSettings, PiFanError, Result, TemperatureCurve};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Controller lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// No hardware held
    Stopped,
    /// PWM output acquired and driven
    Running,
}

impl ControllerState {
    /// Get a string representation for log output
    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerState::Stopped => "stopped",
            ControllerState::Running => "running",
        }
    }
}

/// Result of a single control tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// A new power level was written to the fan
    Applied {
        /// Measured temperature in Celsius
        temperature: f64,
        /// Power fraction from the curve
        power: f64,
        /// Duty cycle percentage written to hardware
        duty_cycle: f64,
    },
    /// The tick was skipped and the previous power is still in effect
    Skipped {
        /// Why the tick was skipped
        reason: String,
    },
}

/// Fan controller
///
/// Generic over the temperature source and the PWM backend, allowing real
/// hardware (`CommandSensor`, `RppalBackend`) or mocks for testing.
pub struct FanController<S, B: PwmBackend> {
    sensor: S,
    backend: B,
    pin: u8,
    curve: TemperatureCurve,
    output: Option<B::Output>,
    power: Option<f64>,
}

impl<S: TemperatureSensor, B: PwmBackend> FanController<S, B> {
    /// Create a new controller for `pin` using the given curve
    pub fn new(pin: u8, curve: TemperatureCurve, sensor: S, backend: B) -> Self {
        Self {
            sensor,
            backend,
            pin,
            curve,
            output: None,
            power: None,
        }
    }

    /// Create a controller from validated settings
    pub fn from_settings(settings: &FanSettings, sensor: S, backend: B) -> Result<Self> {
        settings.validate()?;
        Ok(Self::new(settings.pin()?, settings.rules.clone(), sensor, backend))
    }

    /// Acquire the PWM output and switch the fan off
    pub fn start(&mut self) -> Result<()> {
        if self.output.is_some() {
            return Err(PiFanError::AlreadyRunning);
        }

        let period = Duration::from_millis(PWM_PERIOD_MS);
        let output = self.backend.acquire(self.pin, period)?;
        self.output = Some(output);
        info!(
            "Fan controller on GPIO {} is {}",
            self.pin,
            self.state().as_str()
        );

        if let Err(e) = self.apply_power(0.0) {
            self.release();
            return Err(e);
        }
        Ok(())
    }

    /// Run one control step
    ///
    /// Read failures and unmatched temperatures skip the tick and keep the
    /// previous power. Only hardware failures are returned as errors.
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        if self.output.is_none() {
            return Err(PiFanError::NotRunning);
        }

        let temperature = match self.sensor.read_celsius().await {
            Ok(temperature) => temperature,
            Err(e) => {
                warn!("Failed to get temperature: {}", e);
                return Ok(TickOutcome::Skipped {
                    reason: e.to_string(),
                });
            }
        };

        let Some(power) = self.curve.power_for(temperature) else {
            warn!(
                "No temperature rule matches {}'C, keeping fan power at {:?}",
                temperature, self.power
            );
            return Ok(TickOutcome::Skipped {
                reason: format!("no rule matches {}'C", temperature),
            });
        };

        let power = power.clamp(0.0, 1.0);
        let duty_cycle = self.apply_power(power).map_err(|e| {
            warn!(
                "Failed to apply power {:.3} for {}'C on GPIO {}: {}",
                power, temperature, self.pin, e
            );
            e
        })?;

        Ok(TickOutcome::Applied {
            temperature,
            power,
            duty_cycle,
        })
    }

    /// Drive the fan at a fixed power fraction
    pub fn set_power(&mut self, power: f64) -> Result<()> {
        validate_power(power).map_err(PiFanError::InvalidInput)?;
        self.apply_power(power).map(|_| ())
    }
}

impl<S, B: PwmBackend> FanController<S, B> {
    /// Current lifecycle state
    pub fn state(&self) -> ControllerState {
        if self.output.is_some() {
            ControllerState::Running
        } else {
            ControllerState::Stopped
        }
    }

    /// BCM pin driven by this controller
    pub fn pin(&self) -> u8 {
        self.pin
    }

    /// Last power fraction written, `None` before the first write
    pub fn power(&self) -> Option<f64> {
        self.power
    }

    /// The curve used by [`FanController::tick`]
    pub fn curve(&self) -> &TemperatureCurve {
        &self.curve
    }

    /// Switch the fan off and release the PWM output
    ///
    /// The output is released even if the final write fails; that write error
    /// is returned. Stopping a stopped controller does nothing.
    pub fn stop(&mut self) -> Result<()> {
        let Some(output) = self.output.as_mut() else {
            return Ok(());
        };

        let result = output.set_duty_cycle(OFF_DUTY_CYCLE);
        if result.is_ok() {
            self.power = Some(0.0);
        }
        self.release();
        info!(
            "Fan controller on GPIO {} is {}",
            self.pin,
            self.state().as_str()
        );
        result
    }

    fn apply_power(&mut self, power: f64) -> Result<f64> {
        let output = self.output.as_mut().ok_or(PiFanError::NotRunning)?;
        let duty_cycle = duty_cycle_for_power(power);
        output.set_duty_cycle(duty_cycle)?;
        self.power = Some(power);
        debug!(
            "GPIO {}: power {:.3} -> duty cycle {:.1}%",
            self.pin, power, duty_cycle
        );
        Ok(duty_cycle)
    }

    fn release(&mut self) {
        if self.output.take().is_some() {
            debug!("Released PWM output on GPIO {}", self.pin);
        }
    }
}

impl<S, B: PwmBackend> Drop for FanController<S, B> {
    fn drop(&mut self) {
        if self.output.is_some() {
            warn!(
                "Fan controller on GPIO {} dropped while running, switching fan off",
                self.pin
            );
            if let Err(e) = self.stop() {
                warn!("Failed to switch fan off during drop: {}", e);
            }
        }
    }
}
