//! Configuration types for the event gateway
//!
//! This module defines the settings of the HTTP endpoint, the listener
//! transports and the nested hotplug reactor configuration.

use std::net::SocketAddr;
use std::time::Duration;

use agent_hotplug::HotplugConfig;

use crate::error::GatewayError;

/// Environment variable overriding [`GatewayConfig::listen_addr`]
pub const ENV_LISTEN_ADDR: &str = "AGENT_EVENTS_ADDR";
/// Environment variable overriding [`GatewayConfig::websocket_ping_interval`], in seconds
pub const ENV_WS_PING_SECS: &str = "AGENT_WS_PING_SECS";
/// Environment variable overriding [`GatewayConfig::stream_fallback`]
pub const ENV_STREAM_FALLBACK: &str = "AGENT_STREAM_FALLBACK";
/// Environment variable overriding [`HotplugConfig::mount_program`]
pub const ENV_MOUNT_PROGRAM: &str = "AGENT_MOUNT_PROGRAM";

/// Configuration for the EventServer
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address the HTTP endpoint binds to
    /// Default: 127.0.0.1:8443
    pub listen_addr: SocketAddr,

    /// Interval between websocket keepalive pings, zero disables them
    /// Default: 5 seconds
    pub websocket_ping_interval: Duration,

    /// Bytes buffered between a stream listener and its response body
    /// Default: 64 KiB
    pub stream_buffer_size: usize,

    /// Serve clients that do not ask for a websocket as a raw event stream
    /// Default: true
    pub stream_fallback: bool,

    /// Largest accepted event submission
    /// Default: 1 MiB
    pub max_body_bytes: u64,

    /// How long shutdown waits for in-flight responses before dropping them
    /// Default: 5 seconds
    pub shutdown_grace: Duration,

    /// Hotplug reactor settings
    pub hotplug: HotplugConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8443)),
            websocket_ping_interval: Duration::from_secs(5),
            stream_buffer_size: 64 * 1024,
            stream_fallback: true,
            max_body_bytes: 1024 * 1024,
            shutdown_grace: Duration::from_secs(5),
            hotplug: HotplugConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Create a new GatewayConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from the process environment
    ///
    /// Unset variables keep their default value.
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GatewayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup(ENV_LISTEN_ADDR) {
            config.listen_addr = addr.parse().map_err(|_| {
                GatewayError::Configuration(format!("Invalid {ENV_LISTEN_ADDR}: {addr}"))
            })?;
        }

        if let Some(secs) = lookup(ENV_WS_PING_SECS) {
            let secs: u64 = secs.parse().map_err(|_| {
                GatewayError::Configuration(format!("Invalid {ENV_WS_PING_SECS}: {secs}"))
            })?;
            config.websocket_ping_interval = Duration::from_secs(secs);
        }

        if let Some(value) = lookup(ENV_STREAM_FALLBACK) {
            config.stream_fallback = match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(GatewayError::Configuration(format!(
                        "Invalid {ENV_STREAM_FALLBACK}: {value}"
                    )))
                }
            };
        }

        if let Some(program) = lookup(ENV_MOUNT_PROGRAM) {
            config.hotplug.mount_program = program;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.stream_buffer_size == 0 {
            return Err(GatewayError::Configuration(
                "Stream buffer size must be greater than 0".to_string(),
            ));
        }

        if self.max_body_bytes == 0 {
            return Err(GatewayError::Configuration(
                "Max body size must be greater than 0".to_string(),
            ));
        }

        self.hotplug.validate()?;
        Ok(())
    }

    /// Builder pattern methods for fluent configuration

    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.websocket_ping_interval = interval;
        self
    }

    pub fn with_stream_fallback(mut self, enabled: bool) -> Self {
        self.stream_fallback = enabled;
        self
    }

    pub fn with_max_body_bytes(mut self, max: u64) -> Self {
        self.max_body_bytes = max;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn with_hotplug(mut self, hotplug: HotplugConfig) -> Self {
        self.hotplug = hotplug;
        self
    }
}
