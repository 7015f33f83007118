//! Live subscriptions and their lifetime.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::bus::BusInner;
use crate::connection::ListenerConnection;
use crate::event::Event;
use crate::filter::EventTypeFilter;

/// Why a listener stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerExit {
    /// The request context was cancelled
    Cancelled,
    /// The bus was shut down
    BusShutdown,
    /// The peer went away
    Disconnected,
    /// Writing an event to the connection failed
    WriteFailed,
}

impl fmt::Display for ListenerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Cancelled => "cancelled",
            Self::BusShutdown => "bus shutdown",
            Self::Disconnected => "peer disconnected",
            Self::WriteFailed => "write failed",
        };
        f.write_str(reason)
    }
}

/// A live subscription bound to one connection.
///
/// Created by [`EventBus::add_listener`](crate::EventBus::add_listener). The
/// listener owns its connection exclusively and is deregistered from the bus
/// when dropped. There is no explicit unsubscribe: the subscription ends when
/// the cancellation token passed to [`Listener::wait`] fires, the bus shuts
/// down, or the connection fails.
pub struct Listener {
    id: Uuid,
    filter: EventTypeFilter,
    connection: Arc<dyn ListenerConnection>,
    queue: mpsc::UnboundedReceiver<Arc<Event>>,
    bus: Arc<BusInner>,
}

impl Listener {
    pub(crate) fn new(
        id: Uuid,
        filter: EventTypeFilter,
        connection: Arc<dyn ListenerConnection>,
        queue: mpsc::UnboundedReceiver<Arc<Event>>,
        bus: Arc<BusInner>,
    ) -> Self {
        Self {
            id,
            filter,
            connection,
            queue,
            bus,
        }
    }

    /// Unique identifier of this listener.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Event types this listener accepts.
    pub fn filter(&self) -> &EventTypeFilter {
        &self.filter
    }

    /// Deliver queued events until the subscription ends.
    ///
    /// Suspends until `cancel` fires, the bus shuts down, the peer
    /// disconnects or a write fails. A write that never completes is
    /// abandoned as soon as any of the other conditions holds. The
    /// connection is closed before this returns and the listener is
    /// deregistered when it is consumed.
    pub async fn wait(mut self, cancel: &CancellationToken) -> ListenerExit {
        let exit = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break ListenerExit::Cancelled,
                _ = self.bus.shutdown.cancelled() => break ListenerExit::BusShutdown,
                _ = self.connection.disconnected() => break ListenerExit::Disconnected,
                event = self.queue.recv() => event,
            };

            let Some(event) = next else {
                break ListenerExit::BusShutdown;
            };

            // A peer that stops reading must not hold up cancellation.
            let written = tokio::select! {
                biased;
                _ = cancel.cancelled() => break ListenerExit::Cancelled,
                _ = self.bus.shutdown.cancelled() => break ListenerExit::BusShutdown,
                _ = self.connection.disconnected() => break ListenerExit::Disconnected,
                result = self.connection.write_event(&event) => result,
            };

            if let Err(e) = written {
                tracing::debug!("Listener {} failed to write event: {}", self.id, e);
                break ListenerExit::WriteFailed;
            }
        };

        self.connection.close().await;
        tracing::debug!(
            "{} listener {} ended: {}",
            self.connection.kind(),
            self.id,
            exit
        );

        exit
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.bus.listeners.remove(&self.id);
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("filter", &self.filter)
            .field("kind", &self.connection.kind())
            .finish()
    }
}
