//! Structured logging using tracing.
//!
//! Two outputs:
//! - Console output, filtered by `RUST_LOG`
//! - A session log file in the working directory, truncated at every launch

use std::{fs::File, path::PathBuf};

use tracing::Level;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Error, Result};

/// Logging configuration options.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// File that receives the session log.
    pub log_file: PathBuf,
    /// Maximum log level for console output when `RUST_LOG` is unset.
    pub console_level: Level,
    /// Maximum log level for file output.
    pub file_level: Level,
    /// Whether to include ANSI color codes in console output.
    pub console_ansi: bool,
    /// Whether to include file/line info in logs.
    pub include_file_line: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LoggingConfig {
    /// Verbose console, everything to the file.
    #[must_use]
    pub fn development() -> Self {
        Self {
            log_file: PathBuf::from("youtube_downloader.log"),
            console_level: Level::DEBUG,
            file_level: Level::TRACE,
            console_ansi: true,
            include_file_line: true,
        }
    }

    #[must_use]
    pub fn production() -> Self {
        Self {
            log_file: PathBuf::from("youtube_downloader.log"),
            console_level: Level::INFO,
            file_level: Level::DEBUG,
            console_ansi: true,
            include_file_line: false,
        }
    }

    /// Pick a preset based on build type.
    #[must_use]
    pub fn auto() -> Self {
        if cfg!(debug_assertions) {
            Self::development()
        } else {
            Self::production()
        }
    }

    #[must_use]
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = path.into();
        self
    }

    #[must_use]
    pub const fn with_console_level(mut self, level: Level) -> Self {
        self.console_level = level;
        self
    }

    #[must_use]
    pub const fn with_file_level(mut self, level: Level) -> Self {
        self.file_level = level;
        self
    }
}

/// Keeps the file writer alive. Drop it to flush pending lines.
pub struct LoggingGuard {
    _file_guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Open (and truncate) the session log file.
pub fn open_log_file(config: &LoggingConfig) -> Result<File> {
    File::create(&config.log_file).map_err(|e| Error::Logging {
        path: config.log_file.clone(),
        reason: e.to_string(),
    })
}

/// Install the global subscriber.
///
/// Returns a guard that must be kept alive for the duration of the application.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let file = open_log_file(config)?;
    let (non_blocking, file_guard) = tracing_appender::non_blocking(file);

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,vidgrab={}", level_to_directive(config.console_level))));
    let file_filter = EnvFilter::new(format!(
        "info,vidgrab={}",
        level_to_directive(config.file_level)
    ));

    let console_layer = fmt::layer()
        .with_ansi(config.console_ansi)
        .with_file(config.include_file_line)
        .with_line_number(config.include_file_line)
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_file(config.include_file_line)
        .with_line_number(config.include_file_line)
        .with_filter(file_filter);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Logging {
            path: config.log_file.clone(),
            reason: e.to_string(),
        })?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

const fn level_to_directive(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}
