//! Event type filters requested by listeners.

use std::collections::BTreeSet;
use std::fmt;

use crate::event::event_type;

/// Types delivered to a listener that did not ask for anything specific.
///
/// `config` is part of the default so that local listeners observe
/// configuration changes, which the host-facing API does not expose.
pub const DEFAULT_EVENT_TYPES: [&str; 5] = [
    event_type::LOGGING,
    event_type::OPERATION,
    event_type::LIFECYCLE,
    event_type::CONFIG,
    event_type::DEVICE,
];

/// Set of event types a listener accepts. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTypeFilter {
    types: BTreeSet<String>,
}

impl EventTypeFilter {
    /// Parse a comma-separated type list as found in the `type` query parameter.
    ///
    /// Empty tokens are dropped. When the value is absent or contains no
    /// non-empty token the [`DEFAULT_EVENT_TYPES`] set is used.
    pub fn parse(raw: Option<&str>) -> Self {
        let types: BTreeSet<String> = raw
            .unwrap_or_default()
            .split(',')
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect();

        if types.is_empty() {
            Self::default()
        } else {
            Self { types }
        }
    }

    /// Returns true if events of `event_type` should be delivered.
    pub fn accepts(&self, event_type: &str) -> bool {
        self.types.contains(event_type)
    }

    /// Iterate over the accepted types in sorted order.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for EventTypeFilter {
    fn default() -> Self {
        Self {
            types: DEFAULT_EVENT_TYPES.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl fmt::Display for EventTypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.types().collect();
        write!(f, "{}", joined.join(","))
    }
}
