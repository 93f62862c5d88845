//! Host lifecycle for the fan controller
//!
//! `on_start` validates the settings and spawns the fan loop as a background
//! task; `on_shutdown` signals that task and waits for it to switch the fan off.
//!
//! Killing the process outright (SIGKILL, power loss) skips the shutdown path
//! and can leave the fan at its last duty cycle.

use crate::fan_loop::run_fan_loop;
use pifan_core::{FanSettings, PiFanError, Result, SensorConfig};
use pifan_hardware::{FanController, PwmBackend, TemperatureSensor};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

struct FanWorker {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<Result<()>>,
}

/// Fan controller plugin driven by the daemon's lifecycle
pub struct FanPlugin {
    settings: FanSettings,
    worker: Option<FanWorker>,
}

impl FanPlugin {
    /// Create a plugin with settings that stay fixed for its lifetime
    pub fn new(settings: FanSettings) -> Self {
        Self {
            settings,
            worker: None,
        }
    }

    /// Whether the background fan loop is still alive
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    /// Validate settings and spawn the fan loop.
    ///
    /// Returns `Ok(false)` without doing anything when no GPIO pin is
    /// configured; `make_sensor` is only called once the pin is known to be
    /// set. Must be called from within a tokio runtime.
    pub fn on_start<S, B, F>(&mut self, make_sensor: F, backend: B) -> Result<bool>
    where
        S: TemperatureSensor + 'static,
        B: PwmBackend + 'static,
        F: FnOnce(&SensorConfig) -> Result<S>,
    {
        if self.worker.is_some() {
            return Err(PiFanError::AlreadyRunning);
        }

        if !self.settings.is_configured() {
            warn!("GPIO not configured, fan control disabled. Set gpio_pin in the config file.");
            return Ok(false);
        }

        let period = self.settings.update_period()?;
        let sensor = make_sensor(&self.settings.sensor)?;
        let controller = FanController::from_settings(&self.settings, sensor, backend)?;
        let (stop_tx, stop_rx) = watch::channel(false);

        info!(
            "Starting fan control on GPIO {} (update every {}s, {} rules)",
            controller.pin(),
            self.settings.update_period_secs,
            controller.curve().rules().len()
        );

        let handle = tokio::spawn(run_fan_loop(controller, period, stop_rx));
        self.worker = Some(FanWorker { stop_tx, handle });
        Ok(true)
    }

    /// Stop the fan loop and wait for it to release the hardware.
    ///
    /// Returns the fault that ended the loop, if any. Calling this when the
    /// loop was never started is a no-op.
    pub async fn on_shutdown(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        info!("Stopping fan control...");
        // The loop may already have exited after a hardware fault
        let _ = worker.stop_tx.send(true);

        match worker.handle.await {
            Ok(Ok(())) => {
                info!("Fan control stopped");
                Ok(())
            }
            Ok(Err(e)) => {
                error!("Fan loop had terminated with an error: {}", e);
                Err(e)
            }
            Err(e) if e.is_panic() => {
                error!("Fan loop panicked: {}", e);
                Err(PiFanError::Task(format!("fan loop panicked: {}", e)))
            }
            Err(e) => {
                error!("Fan loop task was cancelled: {}", e);
                Err(PiFanError::Task(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pifan_hardware::mock::{MockPwmBackend, ScriptedSensor};
    use pifan_hardware::CommandSensor;
    use std::time::Duration;

    fn configured() -> FanSettings {
        FanSettings {
            gpio_pin: 18,
            update_period_secs: 0.01,
            ..FanSettings::default()
        }
    }

    async fn wait_for_writes(backend: &MockPwmBackend, count: usize) {
        while backend.duty_history().len() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_unconfigured_pin_is_noop() {
        let backend = MockPwmBackend::new();
        let mut plugin = FanPlugin::new(FanSettings::default());

        let started = plugin
            .on_start(|_| Ok(ScriptedSensor::constant(50.0)), backend.clone())
            .unwrap();

        assert!(!started);
        assert!(!plugin.is_running());
        assert_eq!(backend.acquire_count(), 0);
        plugin.on_shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_unconfigured_pin_skips_sensor_setup() {
        let mut settings = FanSettings::default();
        settings.sensor.command.clear();
        let mut plugin = FanPlugin::new(settings);

        let started = plugin
            .on_start(CommandSensor::from_config, MockPwmBackend::new())
            .unwrap();
        assert!(!started);
        assert!(!plugin.is_running());
    }

    #[tokio::test]
    async fn test_sensor_setup_failure_rejected() {
        let backend = MockPwmBackend::new();
        let mut plugin = FanPlugin::new(configured());
        let result = plugin.on_start(
            |_: &SensorConfig| -> Result<ScriptedSensor> {
                Err(PiFanError::Config("no sensor".to_string()))
            },
            backend.clone(),
        );
        assert!(matches!(result, Err(PiFanError::Config(_))));
        assert!(!plugin.is_running());
        assert_eq!(backend.acquire_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected() {
        let mut plugin = FanPlugin::new(FanSettings {
            update_period_secs: 0.0,
            ..configured()
        });
        let result = plugin.on_start(
            |_| Ok(ScriptedSensor::constant(50.0)),
            MockPwmBackend::new(),
        );
        assert!(matches!(result, Err(PiFanError::Config(_))));
        assert!(!plugin.is_running());
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let backend = MockPwmBackend::new();
        let mut plugin = FanPlugin::new(configured());

        assert!(plugin
            .on_start(|_| Ok(ScriptedSensor::constant(41.0)), backend.clone())
            .unwrap());
        assert!(plugin.is_running());

        wait_for_writes(&backend, 2).await;
        assert!((backend.duty_history()[1] - 44.0).abs() < 1e-9);

        plugin.on_shutdown().await.unwrap();
        assert!(!plugin.is_running());
        assert_eq!(backend.last_duty_cycle(), Some(0.0));
        assert_eq!(backend.held_pin(), None);

        // Idempotent
        plugin.on_shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let backend = MockPwmBackend::new();
        let mut plugin = FanPlugin::new(configured());
        plugin
            .on_start(|_| Ok(ScriptedSensor::constant(41.0)), backend.clone())
            .unwrap();

        let result =
            plugin.on_start(|_| Ok(ScriptedSensor::constant(41.0)), backend.clone());
        assert!(matches!(result, Err(PiFanError::AlreadyRunning)));

        plugin.on_shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_hardware_fault_reported_on_shutdown() {
        let backend = MockPwmBackend::new().fail_writes_after(1);
        let mut plugin = FanPlugin::new(configured());
        plugin
            .on_start(|_| Ok(ScriptedSensor::constant(50.0)), backend.clone())
            .unwrap();

        while plugin.is_running() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(backend.held_pin(), None);

        let result = plugin.on_shutdown().await;
        assert!(matches!(result, Err(PiFanError::Hardware(_))));
    }

    struct PanickingSensor;

    #[async_trait]
    impl TemperatureSensor for PanickingSensor {
        async fn read_celsius(&mut self) -> Result<f64> {
            panic!("sensor exploded");
        }
    }

    #[tokio::test]
    async fn test_panic_in_loop_still_switches_fan_off() {
        let backend = MockPwmBackend::new();
        let mut plugin = FanPlugin::new(configured());
        plugin.on_start(|_| Ok(PanickingSensor), backend.clone()).unwrap();

        while plugin.is_running() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let result = plugin.on_shutdown().await;
        assert!(matches!(result, Err(PiFanError::Task(_))));
        assert_eq!(backend.last_duty_cycle(), Some(0.0));
        assert_eq!(backend.held_pin(), None);
    }
}
