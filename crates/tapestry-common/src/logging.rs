//! Logging configuration and initialization
//!
//! One tracing setup for every Tapestry binary. Supports console or
//! daily-rotated file output, text or JSON formatting, and env-filter
//! directives, all configurable from the environment:
//!
//! - `LOG_LEVEL`: minimum level (trace, debug, info, warn, error)
//! - `LOG_FORMAT`: `text` or `json`
//! - `LOG_DIR`: when set, also write daily-rotated files to this directory
//! - `LOG_FILTER`: extra filter directives (e.g. `sqlx=warn,hyper=info`)
//!
//! Use the `tracing` macros with structured fields; never `println!`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Log format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured log shipping
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid log format: {}", s)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Minimum log level (parsed as an `EnvFilter` base directive)
    pub level: String,

    /// Output format
    pub format: LogFormat,

    /// Directory for rotated log files; `None` disables file output
    pub log_dir: Option<PathBuf>,

    /// Log file name prefix (e.g. "tapestry-ingest" ->
    /// "tapestry-ingest.2026-08-05.log")
    pub log_file_prefix: String,

    /// Additional filter directives appended to the base level
    pub filter_directives: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            log_dir: None,
            log_file_prefix: "tapestry".to_string(),
            filter_directives: None,
        }
    }
}

impl LogConfig {
    /// Load configuration from environment variables, falling back to the
    /// given defaults for anything unset.
    pub fn from_env_or(mut defaults: Self) -> Self {
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            defaults.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            if let Ok(parsed) = format.parse() {
                defaults.format = parsed;
            }
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            defaults.log_dir = Some(PathBuf::from(dir));
        }
        if let Ok(filter) = std::env::var("LOG_FILTER") {
            defaults.filter_directives = Some(filter);
        }
        defaults
    }

    /// Convenience for binaries: defaults + env overrides, with the
    /// binary's file prefix.
    pub fn for_binary(prefix: &str) -> Self {
        Self::from_env_or(Self {
            log_file_prefix: prefix.to_string(),
            ..Self::default()
        })
    }

    fn build_filter(&self) -> Result<EnvFilter> {
        let mut filter = EnvFilter::try_new(&self.level)
            .with_context(|| format!("invalid LOG_LEVEL: {}", self.level))?;
        if let Some(ref directives) = self.filter_directives {
            for directive in directives.split(',') {
                filter = filter.add_directive(
                    directive
                        .trim()
                        .parse()
                        .context("failed to parse filter directive")?,
                );
            }
        }
        Ok(filter)
    }
}

/// Initialize the global tracing subscriber.
///
/// Call once at startup; a second call returns an error from
/// `tracing-subscriber` which is surfaced to the caller.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = config.build_filter()?;

    let registry = tracing_subscriber::registry().with(filter);

    match (&config.log_dir, config.format) {
        (None, LogFormat::Text) => {
            registry
                .with(fmt::layer().with_writer(std::io::stdout))
                .try_init()?;
        },
        (None, LogFormat::Json) => {
            registry
                .with(fmt::layer().json().with_writer(std::io::stdout))
                .try_init()?;
        },
        (Some(dir), format) => {
            std::fs::create_dir_all(dir).context("failed to create log directory")?;
            let file_appender =
                tracing_appender::rolling::daily(dir, &config.log_file_prefix);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            // The guard must outlive the process for buffered lines to flush.
            std::mem::forget(guard);

            match format {
                LogFormat::Text => {
                    registry
                        .with(fmt::layer().with_writer(std::io::stdout))
                        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                        .try_init()?;
                },
                LogFormat::Json => {
                    registry
                        .with(fmt::layer().json().with_writer(std::io::stdout))
                        .with(
                            fmt::layer()
                                .json()
                                .with_writer(non_blocking)
                                .with_ansi(false),
                        )
                        .try_init()?;
                },
            }
        },
    }

    tracing::debug!(format = ?config.format, "logging initialized");

    Ok(())
}
