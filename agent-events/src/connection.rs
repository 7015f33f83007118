//! The capability a listener needs from its transport.

use async_trait::async_trait;

use crate::error::ConnectionError;
use crate::event::Event;

/// A bidirectional event-frame channel with explicit close semantics.
///
/// Implementations hide which wire transport carries the frames. The bus
/// only ever writes events, watches for the peer going away, and closes.
#[async_trait]
pub trait ListenerConnection: Send + Sync {
    /// Short transport name used in log records.
    fn kind(&self) -> &'static str;

    /// Write one event frame to the peer.
    async fn write_event(&self, event: &Event) -> Result<(), ConnectionError>;

    /// Resolves once the peer has disconnected.
    ///
    /// Must be cancel safe: the listener polls it repeatedly inside a select.
    async fn disconnected(&self);

    /// Close the connection. Calling it more than once is harmless.
    async fn close(&self);
}
