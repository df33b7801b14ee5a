//! Logging initialization: console output plus an optional rolling file.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Result;
use lazy_static::lazy_static;
use tracing_appender::non_blocking;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub use crate::infrastructure::config::LoggingConfig;

// Keeps the non-blocking file writers alive for the process lifetime.
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<non_blocking::WorkerGuard>> =
        Mutex::new(Vec::new());
}

/// Initialize the global tracing subscriber from the logging config.
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let console_layer = tracing_subscriber::fmt::layer().with_target(true);

    if config.file_output {
        let log_dir = PathBuf::from(&config.log_dir);
        std::fs::create_dir_all(&log_dir)?;

        let file_appender = tracing_appender::rolling::daily(&log_dir, "dealcast.log");
        let (file_writer, guard) = non_blocking(file_appender);
        LOG_GUARDS.lock().expect("log guard mutex poisoned").push(guard);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_writer);

        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .init();
    }

    Ok(())
}
