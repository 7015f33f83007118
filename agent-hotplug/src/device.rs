//! Decoding device events into mount requests.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use agent_events::decode::{null_as_default, null_values_as_default};
use serde::Deserialize;

use crate::config::HotplugConfig;

/// Only this action triggers a mount; removals are not handled.
pub const ACTION_ADDED: &str = "added";

/// Device type of path-based disks.
pub const DEVICE_TYPE_DISK: &str = "disk";

/// Decoded payload of a `device` event.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DeviceEvent {
    #[serde(deserialize_with = "null_as_default")]
    pub action: String,
    #[serde(deserialize_with = "null_values_as_default")]
    pub config: HashMap<String, String>,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub mount: MountHint,
}

/// Explicit mount parameters supplied by the host.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MountHint {
    #[serde(deserialize_with = "null_as_default")]
    pub source: String,
    #[serde(deserialize_with = "null_as_default")]
    pub options: Vec<String>,
}

impl DeviceEvent {
    /// Decode the metadata of a device event.
    pub fn from_metadata(metadata: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(metadata)
    }

    /// Mount path requested for a disk device, if any.
    pub fn disk_path(&self) -> Option<&str> {
        if self.config.get("type").map(String::as_str) != Some(DEVICE_TYPE_DISK) {
            return None;
        }

        self.config
            .get("path")
            .map(String::as_str)
            .filter(|path| !path.is_empty())
    }
}

/// Everything needed to run one mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRequest {
    /// Shared-filesystem tag exposed by the host
    pub source: String,
    /// Absolute mount point inside the guest
    pub target: PathBuf,
    /// Mount options, joined with commas on the command line
    pub options: Vec<String>,
}

impl MountRequest {
    /// Derive a mount request from a device event.
    ///
    /// Returns `None` unless the event announces an added disk with a path.
    pub fn from_device(device: &DeviceEvent, config: &HotplugConfig) -> Option<Self> {
        if device.action != ACTION_ADDED {
            return None;
        }

        let path = device.disk_path()?;

        let source = if device.mount.source.is_empty() {
            format!("{}_{}", config.source_prefix, device.name)
        } else {
            device.mount.source.clone()
        };

        Some(Self {
            source,
            target: normalize_target(path),
            options: device.mount.options.clone(),
        })
    }

    /// Arguments for the mount utility.
    pub fn args(&self, fs_type: &str) -> Vec<String> {
        let mut args = Vec::new();
        if !self.options.is_empty() {
            args.push("-o".to_string());
            args.push(self.options.join(","));
        }

        args.push("-t".to_string());
        args.push(fs_type.to_string());
        args.push(self.source.clone());
        args.push(self.target.to_string_lossy().into_owned());
        args
    }
}

/// Anchor a mount path at the filesystem root.
///
/// Relative paths are resolved against `/` rather than the agent's working
/// directory, and `..` never climbs above the root. Absolute paths are
/// returned unchanged.
pub fn normalize_target(path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        return path.to_path_buf();
    }

    let mut target = PathBuf::from("/");
    for component in path.components() {
        match component {
            Component::Normal(part) => target.push(part),
            Component::ParentDir => {
                target.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    target
}
