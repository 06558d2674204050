use anyhow::{Context, Result};
use std::io;
use std::path::Path;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use super::secret_scrubbing::ScrubbingMakeWriter;
use crate::domain::models::LoggingConfig;

const LOG_FILE_NAME: &str = "iam-key-rotator.log";

/// Logger implementation using tracing
pub struct LoggerImpl {
    _guard: Option<WorkerGuard>,
}

impl LoggerImpl {
    /// Initialize the global subscriber.
    ///
    /// Events go to stderr in the configured format and, when `log_dir` is
    /// set, to a rolling JSON file as well. Both outputs are scrubbed of
    /// secrets. `verbosity` (the number of `-v` flags) raises the level above
    /// the configured one; `RUST_LOG` overrides both.
    pub fn init(config: &LoggingConfig, verbosity: u8) -> Result<Self> {
        let level = effective_level(parse_log_level(&config.level)?, verbosity);
        let json = config.format == "json";

        let stderr_json = json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(ScrubbingMakeWriter::new(io::stderr))
                .with_current_span(true)
                .with_target(true)
                .with_filter(build_filter(level))
        });
        let stderr_text = (!json).then(|| {
            tracing_subscriber::fmt::layer()
                .with_writer(ScrubbingMakeWriter::new(io::stderr))
                .with_target(false)
                .with_filter(build_filter(level))
        });

        let (file_layer, guard) = match config.log_dir.as_deref() {
            Some(dir) => {
                let appender = file_appender(dir, &config.rotation);
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                let layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(ScrubbingMakeWriter::new(non_blocking))
                    .with_ansi(false)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_filter(build_filter(level));
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        tracing_subscriber::registry()
            .with(stderr_json)
            .with(stderr_text)
            .with(file_layer)
            .try_init()
            .context("Failed to install tracing subscriber")?;

        tracing::debug!(
            level = %level,
            format = %config.format,
            file_output = config.log_dir.is_some(),
            "logger initialized"
        );

        Ok(Self { _guard: guard })
    }
}

fn file_appender(dir: &Path, rotation: &str) -> rolling::RollingFileAppender {
    match rotation {
        "hourly" => rolling::hourly(dir, LOG_FILE_NAME),
        "never" => rolling::never(dir, LOG_FILE_NAME),
        _ => rolling::daily(dir, LOG_FILE_NAME),
    }
}

/// Parse log level string to Level
fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!("Invalid log level: {level}"),
    }
}

/// Each `-v` lowers the threshold by one level, never below the configured one.
fn effective_level(configured: Level, verbosity: u8) -> Level {
    let requested = match verbosity {
        0 => return configured,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    // `Level` orders more verbose levels as greater.
    configured.max(requested)
}

/// Directive string: our crate at `level`, dependencies (the AWS SDK is
/// chatty) at warn.
fn filter_directives(level: Level) -> String {
    format!("warn,iam_key_rotator={}", level.as_str().to_lowercase())
}

fn build_filter(level: Level) -> EnvFilter {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(spec) if !spec.trim().is_empty() => EnvFilter::new(spec),
        _ => EnvFilter::new(filter_directives(level)),
    }
}

// Re-export tracing macros for convenience
pub use tracing::{debug, error, info, instrument, trace, warn};
