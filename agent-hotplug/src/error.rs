//! Error types for the hotplug reactor.

use std::process::ExitStatus;

/// Errors from running an external command.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CommandError {
    /// The program could not be started at all
    #[error("Failed to run {program}: {message}")]
    Spawn { program: String, message: String },

    /// The program ran and exited unsuccessfully
    #[error("Command {program} failed ({status}): {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
}

impl CommandError {
    pub(crate) fn failed(program: &str, status: ExitStatus, stderr: &[u8]) -> Self {
        Self::Failed {
            program: program.to_string(),
            status: status.to_string(),
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
        }
    }
}

/// Errors that can occur in the hotplug reactor.
#[derive(Debug, thiserror::Error)]
pub enum HotplugError {
    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The mount target directory could not be created
    #[error("Failed to create mount target {path}: {source}")]
    CreateTarget {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Every mount attempt failed
    #[error("Mount failed after {attempts} attempts: {source}")]
    MountFailed {
        attempts: u32,
        #[source]
        source: CommandError,
    },
}

/// Convenience type alias for Results using HotplugError.
pub type Result<T> = std::result::Result<T, HotplugError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_display() {
        let error = CommandError::Spawn {
            program: "mount".to_string(),
            message: "No such file or directory".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to run mount: No such file or directory"
        );

        let error = CommandError::Failed {
            program: "mount".to_string(),
            status: "exit status: 32".to_string(),
            stderr: "mount: unknown filesystem type".to_string(),
        };
        assert!(error.to_string().contains("exit status: 32"));
        assert!(error.to_string().contains("unknown filesystem type"));
    }

    #[test]
    fn test_hotplug_error_display() {
        let error = HotplugError::Configuration("bad".to_string());
        assert_eq!(error.to_string(), "Configuration error: bad");

        let error = HotplugError::MountFailed {
            attempts: 5,
            source: CommandError::Spawn {
                program: "mount".to_string(),
                message: "denied".to_string(),
            },
        };
        assert_eq!(
            error.to_string(),
            "Mount failed after 5 attempts: Failed to run mount: denied"
        );
    }
}
