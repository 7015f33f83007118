//! Disk hotplug reactor for the guest agent.
//!
//! The host announces hotplugged devices with `device` events. For an added
//! disk that carries a path, the reactor creates the mount point and mounts
//! the host share over virtiofs:
//!
//! ```text
//! mount [-o <options>] -t virtiofs <source> <path>
//! ```
//!
//! Host-side hotplug can complete after the guest sees the event, so each
//! mount is tried a fixed number of times with a fixed pause in between.
//! Failures are logged and dropped; nothing is reported to the publisher.
//!
//! # Example
//!
//! ```no_run
//! use agent_events::Event;
//! use agent_hotplug::{HotplugConfig, HotplugReactor};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), agent_hotplug::HotplugError> {
//! let reactor = HotplugReactor::with_system_runner(HotplugConfig::default())?;
//! let (handle, _worker) = reactor.spawn();
//!
//! handle.dispatch(Event::new(
//!     "device",
//!     json!({"action": "added", "name": "share", "config": {"type": "disk", "path": "/mnt/share"}}),
//! ));
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod config;
pub mod device;
pub mod error;
pub mod reactor;

pub use command::{CommandRunner, SystemCommandRunner};
pub use config::HotplugConfig;
pub use device::{normalize_target, DeviceEvent, MountHint, MountRequest};
pub use error::{CommandError, HotplugError, Result};
pub use reactor::{ensure_target_dir, HotplugReactor, MountOutcome, ReactorHandle};
