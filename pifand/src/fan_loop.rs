//! Background control loop
//!
//! Starts the controller, then ticks and sleeps until the stop signal fires.
//! The controller is stopped on every exit path, including hardware faults.

use pifan_core::Result;
use pifan_hardware::{FanController, PwmBackend, TemperatureSensor, TickOutcome};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// Run the fan loop until `stop` turns true or its sender is dropped.
///
/// Returns the first hardware fault, after the fan has been switched off.
pub async fn run_fan_loop<S, B>(
    mut controller: FanController<S, B>,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) -> Result<()>
where
    S: TemperatureSensor,
    B: PwmBackend,
{
    info!(
        "Fan loop starting on GPIO {} with {:?} update period",
        controller.pin(),
        period
    );

    if let Err(e) = controller.start() {
        error!(
            "Failed to start fan controller on GPIO {}: {}",
            controller.pin(),
            e
        );
        return Err(e);
    }

    let result = drive(&mut controller, period, &mut stop).await;
    if let Err(ref e) = result {
        error!("Fan loop aborted: {}", e);
    }

    match controller.stop() {
        Ok(()) => info!("Fan loop stopped, fan switched off"),
        Err(e) => {
            error!("Failed to switch fan off: {}", e);
            if result.is_ok() {
                return Err(e);
            }
        }
    }

    result
}

async fn drive<S, B>(
    controller: &mut FanController<S, B>,
    period: Duration,
    stop: &mut watch::Receiver<bool>,
) -> Result<()>
where
    S: TemperatureSensor,
    B: PwmBackend,
{
    loop {
        let outcome = tokio::select! {
            biased;
            _ = stop_requested(stop) => return Ok(()),
            outcome = controller.tick() => outcome?,
        };

        match outcome {
            TickOutcome::Applied {
                temperature,
                power,
                duty_cycle,
            } => info!(
                "CPU temperature is {}'C, setting fan power to {:.3} ({:.1}% duty)",
                temperature, power, duty_cycle
            ),
            TickOutcome::Skipped { reason } => debug!(
                "Tick skipped ({}), fan power stays at {:?}",
                reason,
                controller.power()
            ),
        }

        tokio::select! {
            biased;
            _ = stop_requested(stop) => return Ok(()),
            _ = sleep(period) => {}
        }
    }
}

/// Resolves once a stop is requested or the sender is gone.
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    loop {
        let stopped = *stop.borrow_and_update();
        if stopped {
            return;
        }
        if stop.changed().await.is_err() {
            return;
        }
    }
}
