//! Logging system configuration and initialization
//!
//! This module provides the logging setup for a collection run:
//! - Console output and an appending log file (`app.log` by default)
//! - Configuration based log level control with `RUST_LOG` override
//! - Structured JSON file logging (optional)
//! - Local time stamps
//!
//! The file writer guard is returned to the caller and must be held until
//! the process exits, otherwise buffered lines are lost.

use anyhow::{Result, anyhow};
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

/// Local time formatter (`2024-05-01 12:00:00.123`)
struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Directory the log file is written to
pub fn get_log_directory(config: &LoggingConfig) -> PathBuf {
    config
        .log_dir
        .clone()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default())
}

/// Build the filter directive string for a configuration.
///
/// Dependency targets listed in `module_filters` are capped unless the
/// requested level is `trace`, in which case everything is shown.
pub fn build_filter_directives(config: &LoggingConfig) -> String {
    let mut directives = vec![config.level.clone()];

    if !config.level.eq_ignore_ascii_case("trace") {
        let mut modules: Vec<_> = config.module_filters.iter().collect();
        modules.sort();
        for (module, level) in modules {
            directives.push(format!("{module}={level}"));
        }
    }

    directives.push(format!("player_census={}", config.level));
    directives.join(",")
}

/// Initialize logging with custom configuration
///
/// # Environment Variable Override
/// ```bash
/// # Show detailed HTTP logs
/// RUST_LOG="debug,reqwest=debug,hyper=debug" player-census
/// ```
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(build_filter_directives(config)))
        .map_err(|e| anyhow!("Invalid log filter: {}", e))?;

    let registry = Registry::default().with(env_filter);

    let console_layer = config.console_output.then(|| {
        fmt::Layer::new()
            .with_writer(std::io::stdout)
            .with_timer(LocalTimeFormatter)
            .with_target(false)
    });

    // The console layer goes directly on the filtered registry in every
    // branch so its subscriber type is the same everywhere
    let mut guard = None;
    match (config.file_output, config.json_format) {
        (false, _) => {
            if console_layer.is_none() {
                return Err(anyhow!("No logging output configured"));
            }
            registry.with(console_layer).try_init()?;
        }
        (true, json) => {
            let log_dir = get_log_directory(config);
            std::fs::create_dir_all(&log_dir)
                .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", log_dir, e))?;

            let file_appender = rolling::never(&log_dir, &config.log_file_name);
            let (file_writer, file_guard) = non_blocking(file_appender);
            guard = Some(file_guard);

            if json {
                let file_layer = fmt::Layer::new()
                    .json()
                    .with_writer(file_writer)
                    .with_timer(LocalTimeFormatter)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_ansi(false);
                registry.with(console_layer).with(file_layer).try_init()?;
            } else {
                // File layer with minimal formatting (time + level + message only)
                let file_layer = fmt::Layer::new()
                    .with_writer(file_writer)
                    .with_timer(LocalTimeFormatter)
                    .with_target(false)
                    .with_ansi(false);
                registry.with(console_layer).with(file_layer).try_init()?;
            }
        }
    }

    info!("Logging system initialized (level: {})", config.level);
    if config.file_output {
        info!(
            "Log file: {:?}",
            log_file_path(&get_log_directory(config), &config.log_file_name)
        );
    }

    Ok(guard)
}

fn log_file_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(name)
}
