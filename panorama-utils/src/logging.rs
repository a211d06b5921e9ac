//! Logging infrastructure for panorama
//!
//! Provides unified logging setup using the tracing ecosystem.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::{paths, PanoramaError, Result};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "PANORAMA_LOG";

/// Log output destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// Log to stderr
    Stderr,
    /// Log to file (the render client owns the terminal)
    File,
    /// Log to both stderr and file
    Both,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Output destination
    pub output: LogOutput,
    /// Log level filter (e.g., "info", "panorama_bridge=debug,tokio=warn")
    pub filter: String,
    /// Include span events (enter/exit)
    pub span_events: bool,
    /// Include file/line in logs
    pub file_line: bool,
    /// Log file name inside the log directory
    pub file_name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: "info".into(),
            span_events: false,
            file_line: false,
            file_name: "panorama.log".into(),
        }
    }
}

fn filter_from_env(default: &str) -> String {
    std::env::var(LOG_ENV).unwrap_or_else(|_| default.into())
}

impl LogConfig {
    /// Render client: file only, since the TUI owns the terminal
    pub fn client() -> Self {
        Self {
            output: LogOutput::File,
            filter: filter_from_env("warn"),
            span_events: false,
            file_line: false,
            file_name: "client.log".into(),
        }
    }

    /// Coordinator daemon
    pub fn coordinator() -> Self {
        Self {
            output: LogOutput::File,
            filter: filter_from_env("info"),
            span_events: false,
            file_line: true,
            file_name: "coordinator.log".into(),
        }
    }

    /// Raw-output bridge; also echoes to stderr so the operator sees
    /// control-session teardown
    pub fn bridge() -> Self {
        Self {
            output: LogOutput::Both,
            filter: filter_from_env("info"),
            span_events: false,
            file_line: true,
            file_name: "bridge.log".into(),
        }
    }

    /// Verbose stderr logging for development
    pub fn development() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: "debug".into(),
            span_events: true,
            file_line: true,
            file_name: "panorama.log".into(),
        }
    }
}

/// Initialize logging with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(LogConfig::default())
}

fn open_log_file(file_name: &str) -> Result<std::fs::File> {
    let log_dir = paths::log_dir();
    std::fs::create_dir_all(&log_dir).map_err(|e| PanoramaError::FileWrite {
        path: log_dir.clone(),
        source: e,
    })?;

    let log_path = log_dir.join(file_name);
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| PanoramaError::FileWrite {
            path: log_path,
            source: e,
        })
}

/// Initialize logging with custom configuration
pub fn init_logging_with_config(config: LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| PanoramaError::config(format!("Invalid log filter: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false);

    let fmt_layer = if config.span_events {
        fmt_layer.with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
    } else {
        fmt_layer
    };

    let fmt_layer = if config.file_line {
        fmt_layer.with_file(true).with_line_number(true)
    } else {
        fmt_layer.with_file(false).with_line_number(false)
    };

    let init_err = |e: tracing_subscriber::util::TryInitError| {
        PanoramaError::internal(format!("Failed to init logging: {}", e))
    };

    match config.output {
        LogOutput::Stderr => tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.with_writer(std::io::stderr))
            .try_init()
            .map_err(init_err)?,
        LogOutput::File => {
            let file = open_log_file(&config.file_name)?;
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer.with_writer(file).with_ansi(false))
                .try_init()
                .map_err(init_err)?;
        }
        LogOutput::Both => {
            let file = open_log_file(&config.file_name)?;
            let file_layer = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer.with_writer(std::io::stderr))
                .with(file_layer)
                .try_init()
                .map_err(init_err)?;
        }
    }

    Ok(())
}
