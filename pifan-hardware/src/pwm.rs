//! PWM output abstraction
//!
//! A [`PwmBackend`] hands out exclusive [`PwmOutput`] handles for a pin.
//! Dropping a handle releases the pin; implementations leave it driven low.

use pifan_core::Result;
use std::time::Duration;

/// A PWM-capable output owned by exactly one controller.
pub trait PwmOutput: Send {
    /// Set the duty cycle in percent, `0.0..=100.0`
    fn set_duty_cycle(&mut self, percent: f64) -> Result<()>;
}

/// Source of PWM outputs
///
/// This trait enables testing of `FanController` without real hardware
/// by allowing mock implementations.
pub trait PwmBackend: Send {
    /// Handle type returned by [`PwmBackend::acquire`]
    type Output: PwmOutput;

    /// Claim `pin` as a PWM output with the given carrier period, starting at 0% duty
    fn acquire(&mut self, pin: u8, period: Duration) -> Result<Self::Output>;
}

#[cfg(feature = "rpi")]
pub use self::rpi::{RppalBackend, RppalPwmOutput};

#[cfg(feature = "rpi")]
mod rpi {
    use super::{PwmBackend, PwmOutput};
    use pifan_core::{PiFanError, Result};
    use rppal::gpio::{Gpio, OutputPin};
    use std::time::Duration;
    use tracing::{debug, error, warn};

    /// Software PWM on a Raspberry Pi GPIO pin (BCM numbering)
    #[derive(Debug, Default)]
    pub struct RppalBackend;

    impl RppalBackend {
        /// Create a new backend
        pub fn new() -> Self {
            Self
        }
    }

    impl PwmBackend for RppalBackend {
        type Output = RppalPwmOutput;

        fn acquire(&mut self, pin: u8, period: Duration) -> Result<RppalPwmOutput> {
            debug!("Acquiring GPIO {} for PWM (period {:?})", pin, period);

            let gpio = Gpio::new().map_err(|e| {
                error!("Failed to open GPIO peripheral: {}", e);
                PiFanError::Hardware(format!("Failed to open GPIO peripheral: {}", e))
            })?;

            let output = gpio
                .get(pin)
                .map_err(|e| {
                    error!("Failed to claim GPIO {}: {}", pin, e);
                    PiFanError::Hardware(format!("Failed to claim GPIO {}: {}", pin, e))
                })?
                .into_output_low();

            Ok(RppalPwmOutput {
                pin,
                period,
                output,
            })
        }
    }

    /// Claimed GPIO pin driven by rppal's software PWM
    pub struct RppalPwmOutput {
        pin: u8,
        period: Duration,
        output: OutputPin,
    }

    impl PwmOutput for RppalPwmOutput {
        fn set_duty_cycle(&mut self, percent: f64) -> Result<()> {
            let percent = percent.clamp(0.0, 100.0);

            if percent == 0.0 {
                self.output.clear_pwm().map_err(|e| {
                    PiFanError::Hardware(format!("Failed to stop PWM on GPIO {}: {}", self.pin, e))
                })?;
                self.output.set_low();
                return Ok(());
            }

            let pulse_width = self.period.mul_f64(percent / 100.0);
            self.output
                .set_pwm(self.period, pulse_width)
                .map_err(|e| {
                    PiFanError::Hardware(format!(
                        "Failed to set {:.1}% duty cycle on GPIO {}: {}",
                        percent, self.pin, e
                    ))
                })
        }
    }

    impl Drop for RppalPwmOutput {
        fn drop(&mut self) {
            if let Err(e) = self.output.clear_pwm() {
                warn!("Failed to stop PWM on GPIO {} during release: {}", self.pin, e);
            }
            self.output.set_low();
            debug!("Released GPIO {}", self.pin);
        }
    }
}
