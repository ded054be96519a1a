//! Logging infrastructure for chatview
//!
//! Provides unified logging setup using the tracing ecosystem. The client
//! owns the terminal for chat output, so its logs go to a file.

use std::fs::File;

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::{paths, ChatviewError, Result};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "CHATVIEW_LOG";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level filter (e.g., "info", "debug", "chatview_client=debug,reqwest=warn")
    pub filter: String,
    /// Include span events (enter/exit)
    pub span_events: bool,
    /// Include file/line in logs
    pub file_line: bool,
}

impl LogConfig {
    /// Create config for the interactive client, filtered by `CHATVIEW_LOG`
    pub fn client() -> Self {
        Self {
            filter: std::env::var(LOG_ENV).unwrap_or_else(|_| "info".into()),
            span_events: false,
            file_line: true,
        }
    }
}

/// Initialize logging to the state directory log file
pub fn init_logging_with_config(config: LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| ChatviewError::config(format!("Invalid log filter: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_ansi(false);

    let fmt_layer = if config.span_events {
        fmt_layer.with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
    } else {
        fmt_layer
    };

    let fmt_layer = if config.file_line {
        fmt_layer.with_file(true).with_line_number(true)
    } else {
        fmt_layer.with_file(false).with_line_number(false)
    };

    let file = open_log_file()?;
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer.with_writer(file))
        .try_init()
        .map_err(|e| ChatviewError::internal(format!("Failed to init logging: {}", e)))?;

    Ok(())
}

/// Open (creating if needed) the append-only log file
fn open_log_file() -> Result<File> {
    let log_dir = paths::log_dir();
    paths::ensure_dir(&log_dir).map_err(|e| ChatviewError::FileWrite {
        path: log_dir.clone(),
        source: e,
    })?;

    let log_path = paths::log_file();
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| ChatviewError::FileWrite {
            path: log_path,
            source: e,
        })
}
