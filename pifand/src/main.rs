//! pifan daemon
//!
//! Drives a Raspberry Pi CPU fan from the measured CPU temperature.
//!
//! # Configuration
//!
//! Settings are read from a TOML file (see `--config`). `--gpio-pin` and
//! `--update-period` override the file. With `--mock` no GPIO is touched and
//! duty cycle changes are only logged.

mod config;
mod fan_loop;
mod plugin;

use anyhow::Result;
use clap::Parser;
use config::{load_settings, SettingsOverrides};
use pifan_core::default_config_path;
use pifan_hardware::mock::MockPwmBackend;
use pifan_hardware::CommandSensor;
use plugin::FanPlugin;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};

/// pifan daemon
#[derive(Parser, Debug)]
#[command(name = "pifand")]
#[command(version, about = "Adaptive CPU fan controller for the Raspberry Pi", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// BCM GPIO pin driving the fan (-1 disables fan control)
    #[arg(short, long, allow_negative_numbers = true)]
    gpio_pin: Option<i32>,

    /// Seconds between fan updates
    #[arg(short, long)]
    update_period: Option<f64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable mock mode (log duty cycle changes instead of driving GPIO)
    #[arg(long)]
    mock: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    init_tracing(args.verbose);

    info!("pifan daemon starting...");

    // Determine config path: CLI flag > env var > default
    let config_path = args.config.unwrap_or_else(|| {
        std::env::var("PIFAN_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_config_path())
    });
    info!("Configuration file: {}", config_path.display());

    let mut settings = load_settings(&config_path).await?;
    SettingsOverrides {
        gpio_pin: args.gpio_pin,
        update_period_secs: args.update_period,
    }
    .apply(&mut settings);

    let mut plugin = FanPlugin::new(settings);

    let started = if args.mock {
        info!("Mock mode - GPIO output is simulated");
        plugin.on_start(CommandSensor::from_config, MockPwmBackend::logging())?
    } else {
        start_with_gpio(&mut plugin)?
    };

    if !started {
        info!("Nothing to do, exiting");
        return Ok(());
    }

    info!("Fan control running, press Ctrl+C to stop");
    shutdown_signal().await;

    if let Err(e) = plugin.on_shutdown().await {
        error!("Fan control ended with an error: {}", e);
    }

    info!("pifan daemon shutdown complete");
    Ok(())
}

#[cfg(feature = "rpi")]
fn start_with_gpio(plugin: &mut FanPlugin) -> pifan_core::Result<bool> {
    plugin.on_start(CommandSensor::from_config, pifan_hardware::RppalBackend::new())
}

#[cfg(not(feature = "rpi"))]
fn start_with_gpio(_plugin: &mut FanPlugin) -> pifan_core::Result<bool> {
    Err(pifan_core::PiFanError::Config(
        "pifand was built without GPIO support (feature `rpi`); use --mock".to_string(),
    ))
}

/// Resolve once SIGINT or SIGTERM arrives.
///
/// If a handler cannot be installed that signal is ignored and the other
/// one still ends the daemon.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Cannot listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let which = tokio::select! {
        _ = interrupt => "SIGINT",
        _ = terminate => "SIGTERM",
    };
    info!("{} received, switching fan off", which);
}

/// Log to stderr; `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
