//! In-memory hardware for tests and `--mock` mode
//!
//! [`MockPwmBackend`] records every duty cycle written and whether the pin is
//! currently held. [`ScriptedSensor`] replays a list of readings.

use crate::pwm::{PwmBackend, PwmOutput};
use crate::temperature::TemperatureSensor;
use async_trait::async_trait;
use pifan_core::{PiFanError, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Default)]
struct MockPwmState {
    held_pin: Option<u8>,
    period: Option<Duration>,
    acquire_count: usize,
    release_count: usize,
    duty_history: Vec<f64>,
    fail_acquire: bool,
    writes_before_failure: Option<usize>,
}

/// Recording PWM backend
///
/// Clones share state, so a test can keep one clone and hand the other to
/// the controller.
#[derive(Debug, Clone, Default)]
pub struct MockPwmBackend {
    state: Arc<Mutex<MockPwmState>>,
    log_writes: bool,
}

impl MockPwmBackend {
    /// Create a new mock backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that logs every duty cycle change at info level
    pub fn logging() -> Self {
        Self {
            log_writes: true,
            ..Self::default()
        }
    }

    /// Make every `acquire` fail
    pub fn fail_acquire(self) -> Self {
        self.lock().fail_acquire = true;
        self
    }

    /// Let `count` duty cycle writes succeed, then fail all later ones
    pub fn fail_writes_after(self, count: usize) -> Self {
        self.lock().writes_before_failure = Some(count);
        self
    }

    /// All duty cycles written so far, oldest first
    pub fn duty_history(&self) -> Vec<f64> {
        self.lock().duty_history.clone()
    }

    /// Most recent duty cycle written
    pub fn last_duty_cycle(&self) -> Option<f64> {
        self.lock().duty_history.last().copied()
    }

    /// Pin currently held by an output, if any
    pub fn held_pin(&self) -> Option<u8> {
        self.lock().held_pin
    }

    /// Carrier period requested by the last `acquire`
    pub fn period(&self) -> Option<Duration> {
        self.lock().period
    }

    /// Number of successful `acquire` calls
    pub fn acquire_count(&self) -> usize {
        self.lock().acquire_count
    }

    /// Number of outputs released
    pub fn release_count(&self) -> usize {
        self.lock().release_count
    }

    fn lock(&self) -> MutexGuard<'_, MockPwmState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PwmBackend for MockPwmBackend {
    type Output = MockPwmOutput;

    fn acquire(&mut self, pin: u8, period: Duration) -> Result<MockPwmOutput> {
        let mut state = self.lock();
        if state.fail_acquire {
            return Err(PiFanError::Hardware(format!(
                "Mock failure acquiring GPIO {}",
                pin
            )));
        }
        if let Some(held) = state.held_pin {
            return Err(PiFanError::Hardware(format!("GPIO {} is already in use", held)));
        }

        state.held_pin = Some(pin);
        state.period = Some(period);
        state.acquire_count += 1;

        Ok(MockPwmOutput {
            pin,
            state: Arc::clone(&self.state),
            log_writes: self.log_writes,
        })
    }
}

/// Output handle produced by [`MockPwmBackend`]
#[derive(Debug)]
pub struct MockPwmOutput {
    pin: u8,
    state: Arc<Mutex<MockPwmState>>,
    log_writes: bool,
}

impl PwmOutput for MockPwmOutput {
    fn set_duty_cycle(&mut self, percent: f64) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(remaining) = state.writes_before_failure.as_mut() {
            if *remaining == 0 {
                return Err(PiFanError::Hardware(format!(
                    "Mock write failure on GPIO {}",
                    self.pin
                )));
            }
            *remaining -= 1;
        }

        state.duty_history.push(percent);
        if self.log_writes {
            info!("[mock] GPIO {} duty cycle set to {:.1}%", self.pin, percent);
        }
        Ok(())
    }
}

impl Drop for MockPwmOutput {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.held_pin = None;
        state.release_count += 1;
    }
}

/// Sensor replaying a fixed script of readings
///
/// `None` entries produce a read failure. The last entry repeats forever
/// once the script is exhausted; an empty script always fails.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSensor {
    readings: VecDeque<Option<f64>>,
    reads: Arc<Mutex<usize>>,
}

impl ScriptedSensor {
    /// Sensor returning `readings` in order
    pub fn new(readings: impl IntoIterator<Item = Option<f64>>) -> Self {
        Self {
            readings: readings.into_iter().collect(),
            reads: Arc::default(),
        }
    }

    /// Sensor that always reports `celsius`
    pub fn constant(celsius: f64) -> Self {
        Self::new([Some(celsius)])
    }

    /// Sensor that always fails
    pub fn failing() -> Self {
        Self::new([None])
    }

    /// Number of reads performed, shared between clones
    pub fn read_count(&self) -> usize {
        *self.reads.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TemperatureSensor for ScriptedSensor {
    async fn read_celsius(&mut self) -> Result<f64> {
        *self.reads.lock().unwrap_or_else(PoisonError::into_inner) += 1;

        let reading = if self.readings.len() > 1 {
            self.readings.pop_front().flatten()
        } else {
            self.readings.front().copied().flatten()
        };

        reading.ok_or_else(|| {
            PiFanError::TemperatureRead("Unexpected sensor output: \"\"".to_string())
        })
    }
}
