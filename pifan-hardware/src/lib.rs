//! pifan-hardware
//!
//! Hardware-facing crate: reads the CPU temperature, drives the fan's PWM pin,
//! and ties both together in the fan controller state machine.
//
//! Public API:
//! - `fan_controller::FanController` — temperature-to-duty-cycle controller
//! - `temperature::CommandSensor` — CPU temperature via `vcgencmd measure_temp`
//! - `pwm::RppalBackend` — software PWM on Raspberry Pi GPIO (feature `rpi`)
//! - `mock` — in-memory sensor and PWM backend

pub mod fan_controller;
pub mod mock;
pub mod pwm;
pub mod temperature;

pub use fan_controller::{ControllerState, FanController, TickOutcome};
pub use pwm::{PwmBackend, PwmOutput};
#[cfg(feature = "rpi")]
pub use pwm::{RppalBackend, RppalPwmOutput};
pub use temperature::{parse_measure_temp, CommandSensor, TemperatureSensor};
