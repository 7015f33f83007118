//! In-process event bus with filtered fan-out to listeners.
//!
//! The bus keeps one entry per live [`Listener`]. Publishing an event walks
//! the entries and queues a shared copy on every listener whose type filter
//! and project scope accept it. Each listener drains its own FIFO queue, so
//! events reach a given listener in publish order while slow listeners never
//! hold up publishers or each other.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::connection::ListenerConnection;
use crate::error::{BusError, Result};
use crate::event::Event;
use crate::filter::EventTypeFilter;
use crate::listener::Listener;

/// Which projects a listener wants to hear about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectScope<'a> {
    /// Project name, empty when `all_projects` is set
    pub project: &'a str,
    /// Receive events from every project
    pub all_projects: bool,
}

impl ProjectScope<'static> {
    /// Visibility into events from every project.
    pub const ALL_PROJECTS: ProjectScope<'static> = ProjectScope {
        project: "",
        all_projects: true,
    };
}

/// Bus-side record of a registered listener.
pub(crate) struct ListenerEntry {
    project: String,
    all_projects: bool,
    filter: EventTypeFilter,
    queue: mpsc::UnboundedSender<Arc<Event>>,
}

impl ListenerEntry {
    fn accepts(&self, event: &Event) -> bool {
        self.filter.accepts(&event.event_type)
            && (self.all_projects || self.project == event.project)
    }
}

pub(crate) struct BusInner {
    pub(crate) listeners: DashMap<Uuid, ListenerEntry>,
    pub(crate) shutdown: CancellationToken,
}

/// Handle to the shared event bus.
///
/// Cloning is cheap and every clone refers to the same bus. All methods are
/// safe to call concurrently from any number of publishers and subscribers.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                listeners: DashMap::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Register a listener bound to `connection`.
    ///
    /// The returned [`Listener`] receives every event published after this
    /// call that `filter` and `scope` accept. It stays registered until it is
    /// dropped, which [`Listener::wait`] does once its lifetime ends.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ShuttingDown`] once [`EventBus::shutdown`] was called.
    pub fn add_listener(
        &self,
        scope: ProjectScope<'_>,
        filter: EventTypeFilter,
        connection: Arc<dyn ListenerConnection>,
    ) -> Result<Listener> {
        if self.inner.shutdown.is_cancelled() {
            return Err(BusError::ShuttingDown);
        }

        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        self.inner.listeners.insert(
            id,
            ListenerEntry {
                project: scope.project.to_string(),
                all_projects: scope.all_projects,
                filter: filter.clone(),
                queue: tx,
            },
        );

        tracing::debug!(
            "Registered {} listener {} for types [{}]",
            connection.kind(),
            id,
            filter
        );

        Ok(Listener::new(id, filter, connection, rx, self.inner.clone()))
    }

    /// Publish an event to every matching listener.
    ///
    /// The bus stamps the event with the current time and the given project.
    /// Returns the number of listeners the event was queued for.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ShuttingDown`] once [`EventBus::shutdown`] was called.
    pub fn send(
        &self,
        project: &str,
        event_type: &str,
        metadata: serde_json::Value,
    ) -> Result<usize> {
        if self.inner.shutdown.is_cancelled() {
            return Err(BusError::ShuttingDown);
        }

        let event = Arc::new(Event {
            event_type: event_type.to_string(),
            timestamp: Some(Utc::now()),
            metadata,
            project: project.to_string(),
        });

        let mut delivered = 0;
        for entry in self.inner.listeners.iter() {
            if !entry.accepts(&event) {
                continue;
            }

            // A closed queue means the listener is on its way out.
            if entry.queue.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }

        tracing::trace!("Published {} event to {} listeners", event_type, delivered);
        Ok(delivered)
    }

    /// Stop accepting listeners and events, and end every waiting listener.
    pub fn shutdown(&self) {
        if !self.inner.shutdown.is_cancelled() {
            tracing::debug!(
                "Shutting down event bus with {} listeners",
                self.inner.listeners.len()
            );
        }
        self.inner.shutdown.cancel();
    }

    /// Returns true once [`EventBus::shutdown`] was called.
    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Number of currently registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
