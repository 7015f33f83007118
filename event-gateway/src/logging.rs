//! Logging setup for the event gateway
//!
//! The library only emits `tracing` records. Binaries pick how they are
//! rendered by calling [`init_logging`] or [`init_logging_from_env`] once at
//! startup.

use std::str::FromStr;

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Environment variable selecting the [`LoggingMode`]
pub const ENV_LOG_MODE: &str = "AGENT_LOG_MODE";
/// Environment variable overriding the log filter, takes precedence over `RUST_LOG`
pub const ENV_LOG_LEVEL: &str = "AGENT_LOG_LEVEL";

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No output
    Silent,
    /// Compact stderr output
    Development,
    /// Verbose diagnostics with source locations
    Debug,
    /// One JSON object per record, for log collectors
    Json,
}

impl FromStr for LoggingMode {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "silent" => Ok(Self::Silent),
            "development" => Ok(Self::Development),
            "debug" => Ok(Self::Debug),
            "json" => Ok(Self::Json),
            other => Err(LoggingError::InvalidEnv(format!(
                "{ENV_LOG_MODE}={other}"
            ))),
        }
    }
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid environment variable: {0}")]
    InvalidEnv(String),
}

/// Initialize logging with the specified mode
///
/// # Environment Variables
///
/// - `AGENT_LOG_LEVEL`: filter directives, e.g. `info,agent_hotplug=debug`
/// - `RUST_LOG`: used when `AGENT_LOG_LEVEL` is unset
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let subscriber = match mode {
        LoggingMode::Silent => return Ok(()),
        LoggingMode::Development => Registry::default()
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .compact(),
            )
            .with(create_env_filter("info")?)
            .try_init(),
        LoggingMode::Debug => Registry::default()
            .with(
                fmt::layer()
                    .pretty()
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(create_env_filter("debug")?)
            .try_init(),
        LoggingMode::Json => Registry::default()
            .with(fmt::layer().json().with_current_span(false))
            .with(create_env_filter("info")?)
            .try_init(),
    };

    subscriber.map_err(|e| LoggingError::TracingInit(e.to_string()))
}

/// Initialize logging from `AGENT_LOG_MODE`
///
/// Accepts `silent`, `development`, `debug` or `json`. Defaults to
/// development output when unset.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = match std::env::var(ENV_LOG_MODE) {
        Ok(value) => value.parse()?,
        Err(_) => LoggingMode::Development,
    };

    init_logging(mode)
}

/// Build the filter from `AGENT_LOG_LEVEL`, then `RUST_LOG`, then `default_level`
fn create_env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    let (source, directives) = if let Ok(level) = std::env::var(ENV_LOG_LEVEL) {
        (ENV_LOG_LEVEL, level)
    } else if let Ok(rust_log) = std::env::var("RUST_LOG") {
        ("RUST_LOG", rust_log)
    } else {
        return Ok(EnvFilter::new(default_level));
    };

    EnvFilter::try_new(&directives)
        .map_err(|e| LoggingError::InvalidEnv(format!("{source}={directives}: {e}")))
}
