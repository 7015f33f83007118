//! The event model shared by publishers, the bus and every listener.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decode::null_as_default;

/// Well-known event type tags.
///
/// The set is open-ended: the bus accepts any tag, these are just the ones
/// the agent itself produces or listens for by default.
pub mod event_type {
    pub const LOGGING: &str = "logging";
    pub const OPERATION: &str = "operation";
    pub const LIFECYCLE: &str = "lifecycle";
    pub const CONFIG: &str = "config";
    pub const DEVICE: &str = "device";
}

/// A typed notification with an opaque payload.
///
/// Events are immutable once published; the bus shares a single copy between
/// all listeners that accept it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Short type tag, e.g. `"device"`
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub event_type: String,

    /// Time the bus accepted the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Payload, shape depends on `event_type`
    #[serde(default)]
    pub metadata: serde_json::Value,

    /// Project the event was published under, empty when unknown
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub project: String,
}

impl Event {
    /// Create an unstamped event with the given type and payload.
    pub fn new(event_type: impl Into<String>, metadata: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: None,
            metadata,
            project: String::new(),
        }
    }

    /// Returns true if this is a device event.
    pub fn is_device(&self) -> bool {
        self.event_type == event_type::DEVICE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_submitted_event() {
        let event: Event = serde_json::from_str(
            r#"{"type":"device","metadata":{"action":"added","name":"disk0"}}"#,
        )
        .unwrap();

        assert_eq!(event.event_type, "device");
        assert!(event.is_device());
        assert_eq!(event.metadata["name"], "disk0");
        assert!(event.timestamp.is_none());
        assert!(event.project.is_empty());
    }

    #[test]
    fn test_decode_tolerates_missing_fields() {
        let event: Event = serde_json::from_str("{}").unwrap();
        assert_eq!(event.event_type, "");
        assert_eq!(event.metadata, serde_json::Value::Null);
    }

    #[test]
    fn test_decode_tolerates_null_fields() {
        let event: Event =
            serde_json::from_str(r#"{"type":null,"metadata":null,"project":null}"#).unwrap();
        assert_eq!(event.event_type, "");
        assert_eq!(event.metadata, serde_json::Value::Null);
        assert!(event.project.is_empty());
    }

    #[test]
    fn test_decode_rejects_non_object() {
        assert!(serde_json::from_str::<Event>("not json").is_err());
        assert!(serde_json::from_str::<Event>("[1, 2]").is_err());
    }

    #[test]
    fn test_encode_omits_empty_project() {
        let event = Event::new(event_type::LIFECYCLE, json!({"action": "started"}));
        let encoded = serde_json::to_value(&event).unwrap();

        assert_eq!(encoded["type"], "lifecycle");
        assert_eq!(encoded["metadata"]["action"], "started");
        assert!(encoded.get("project").is_none());
        assert!(encoded.get("timestamp").is_none());
    }
}
