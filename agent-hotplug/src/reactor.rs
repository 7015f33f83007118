//! Mounting hotplugged disks in response to device events.
//!
//! The reactor is fed through a [`ReactorHandle`]. Handing an event over
//! never blocks and reports nothing back: a background worker picks it up
//! and spawns one task per device event, so a slow or failing mount can
//! never stall event ingestion.

use std::path::Path;
use std::sync::Arc;

use agent_events::Event;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::command::{CommandRunner, SystemCommandRunner};
use crate::config::HotplugConfig;
use crate::device::{DeviceEvent, MountRequest};
use crate::error::{CommandError, HotplugError, Result};

/// Final result of mounting one hotplugged disk.
#[derive(Debug, Clone)]
pub enum MountOutcome {
    /// The mount succeeded on the given attempt
    Mounted { attempts: u32 },
    /// Every attempt failed; `error` is the last failure
    Failed { attempts: u32, error: CommandError },
}

impl MountOutcome {
    pub fn is_mounted(&self) -> bool {
        matches!(self, Self::Mounted { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Mounted { attempts } | Self::Failed { attempts, .. } => *attempts,
        }
    }
}

/// Turns device events into virtiofs mounts.
#[derive(Clone)]
pub struct HotplugReactor {
    config: Arc<HotplugConfig>,
    runner: Arc<dyn CommandRunner>,
}

impl HotplugReactor {
    /// Create a reactor that runs mounts through `runner`.
    pub fn new(config: HotplugConfig, runner: Arc<dyn CommandRunner>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            runner,
        })
    }

    /// Create a reactor that spawns the real mount utility.
    pub fn with_system_runner(config: HotplugConfig) -> Result<Self> {
        Self::new(config, Arc::new(SystemCommandRunner))
    }

    pub fn config(&self) -> &HotplugConfig {
        &self.config
    }

    /// React to a single event.
    ///
    /// Returns `None` when the event is not an added path-based disk; such
    /// events never touch the filesystem or run a command.
    pub async fn react(&self, event: &Event) -> Option<MountOutcome> {
        if !event.is_device() {
            return None;
        }

        let device = match DeviceEvent::from_metadata(&event.metadata) {
            Ok(device) => device,
            Err(e) => {
                tracing::debug!("Ignoring device event with unexpected metadata: {}", e);
                return None;
            }
        };

        let request = MountRequest::from_device(&device, &self.config)?;
        Some(self.mount(&request).await)
    }

    /// Create the mount target and mount it, retrying on failure.
    pub async fn mount(&self, request: &MountRequest) -> MountOutcome {
        if let Err(e) = ensure_target_dir(&request.target, self.config.dir_mode).await {
            // The mount below fails on its own if the target is really unusable.
            tracing::warn!("{}", e);
        }

        self.mount_with_retry(request).await
    }

    async fn mount_with_retry(&self, request: &MountRequest) -> MountOutcome {
        let args = request.args(&self.config.fs_type);
        let mut attempt = 1;

        loop {
            match self.runner.run(&self.config.mount_program, &args).await {
                Ok(_) => {
                    tracing::info!(
                        fs_type = %self.config.fs_type,
                        source = %request.source,
                        path = %request.target.display(),
                        attempts = attempt,
                        "Mounted hotplug"
                    );
                    return MountOutcome::Mounted { attempts: attempt };
                }
                Err(error) if attempt >= self.config.max_attempts => {
                    tracing::warn!(
                        fs_type = %self.config.fs_type,
                        source = %request.source,
                        path = %request.target.display(),
                        attempts = attempt,
                        err = %error,
                        "Failed to mount hotplug"
                    );
                    return MountOutcome::Failed {
                        attempts: attempt,
                        error,
                    };
                }
                Err(error) => {
                    tracing::debug!(
                        "Mount attempt {} of {} for {} failed: {}",
                        attempt,
                        self.config.max_attempts,
                        request.target.display(),
                        error
                    );
                }
            }

            attempt += 1;
            tokio::time::sleep(self.config.retry_delay).await;
        }
    }

    /// Start the dispatch worker.
    ///
    /// The worker runs until every [`ReactorHandle`] is dropped. Mount tasks
    /// it spawned are detached and run to completion on their own.
    pub fn spawn(self) -> (ReactorHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();

        let worker = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if !event.is_device() {
                    continue;
                }

                let reactor = self.clone();
                tokio::spawn(async move {
                    reactor.react(&event).await;
                });
            }
            tracing::debug!("Hotplug reactor worker stopped");
        });

        (ReactorHandle { tx }, worker)
    }
}

/// Sending side of the reactor's dispatch channel.
#[derive(Debug, Clone)]
pub struct ReactorHandle {
    tx: mpsc::UnboundedSender<Event>,
}

impl ReactorHandle {
    /// Hand an event to the reactor without waiting for it to be processed.
    pub fn dispatch(&self, event: Event) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Hotplug reactor is not running, dropping event");
        }
    }

    /// Returns true while the dispatch worker is alive.
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Create `path` and any missing parents. An existing directory is fine.
pub async fn ensure_target_dir(path: &Path, mode: u32) -> Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(mode);
    #[cfg(not(unix))]
    let _ = mode;

    builder
        .create(path)
        .await
        .map_err(|source| HotplugError::CreateTarget {
            path: path.display().to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[tokio::test]
    async fn test_ensure_target_dir_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("a/b/c");

        ensure_target_dir(&target, 0o755).await.unwrap();
        assert!(target.is_dir());

        ensure_target_dir(&target, 0o755).await.unwrap();
        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn test_ensure_target_dir_applies_mode() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("share");

        ensure_target_dir(&target, 0o700).await.unwrap();
        let mode = std::fs::metadata(&target).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700 & !current_umask());
    }

    #[tokio::test]
    async fn test_ensure_target_dir_reports_file_in_the_way() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("occupied");
        std::fs::write(&file, b"x").unwrap();

        let error = ensure_target_dir(&file.join("below"), 0o755)
            .await
            .unwrap_err();
        assert!(matches!(error, HotplugError::CreateTarget { .. }));
    }

    #[test]
    fn test_mount_outcome_accessors() {
        let mounted = MountOutcome::Mounted { attempts: 2 };
        assert!(mounted.is_mounted());
        assert_eq!(mounted.attempts(), 2);

        let failed = MountOutcome::Failed {
            attempts: 5,
            error: CommandError::Spawn {
                program: "mount".to_string(),
                message: "missing".to_string(),
            },
        };
        assert!(!failed.is_mounted());
        assert_eq!(failed.attempts(), 5);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = HotplugConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(HotplugReactor::with_system_runner(config).is_err());
    }

    fn current_umask() -> u32 {
        let tmp = tempfile::tempdir().unwrap();
        let scratch = tmp.path().join("scratch");
        std::fs::DirBuilder::new().create(&scratch).unwrap();
        let mode = std::fs::metadata(&scratch).unwrap().permissions().mode() & 0o777;
        0o777 & !mode
    }
}
