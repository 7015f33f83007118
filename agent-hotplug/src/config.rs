//! Configuration for the hotplug reactor.

use std::time::Duration;

use crate::error::HotplugError;

/// Controls how hotplugged disks are mounted.
#[derive(Debug, Clone)]
pub struct HotplugConfig {
    /// Mount utility to invoke
    /// Default: "mount"
    pub mount_program: String,

    /// Filesystem type passed with `-t`
    /// Default: "virtiofs"
    pub fs_type: String,

    /// Prefix of the mount source derived from the device name
    /// Default: "lxd"
    pub source_prefix: String,

    /// Number of mount attempts before giving up
    /// Default: 5
    pub max_attempts: u32,

    /// Fixed pause between two attempts
    /// Default: 500 milliseconds
    pub retry_delay: Duration,

    /// Permissions of mount target directories created by the reactor
    /// Default: 0o755
    pub dir_mode: u32,
}

impl Default for HotplugConfig {
    fn default() -> Self {
        Self {
            mount_program: "mount".to_string(),
            fs_type: "virtiofs".to_string(),
            source_prefix: "lxd".to_string(),
            max_attempts: 5,
            retry_delay: Duration::from_millis(500),
            dir_mode: 0o755,
        }
    }
}

impl HotplugConfig {
    /// Create a new HotplugConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<(), HotplugError> {
        if self.mount_program.is_empty() {
            return Err(HotplugError::Configuration(
                "Mount program must not be empty".to_string(),
            ));
        }

        if self.fs_type.is_empty() {
            return Err(HotplugError::Configuration(
                "Filesystem type must not be empty".to_string(),
            ));
        }

        if self.max_attempts == 0 {
            return Err(HotplugError::Configuration(
                "Max attempts must be greater than 0".to_string(),
            ));
        }

        if self.dir_mode > 0o7777 {
            return Err(HotplugError::Configuration(format!(
                "Invalid directory mode: {:o}",
                self.dir_mode
            )));
        }

        Ok(())
    }

    pub fn with_mount_program(mut self, program: impl Into<String>) -> Self {
        self.mount_program = program.into();
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, delay: Duration) -> Self {
        self.max_attempts = max_attempts;
        self.retry_delay = delay;
        self
    }

    pub fn with_source_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.source_prefix = prefix.into();
        self
    }
}
