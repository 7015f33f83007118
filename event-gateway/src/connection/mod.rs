//! Listener connection adapters.
//!
//! Each adapter turns one wire transport into an
//! [`agent_events::ListenerConnection`]. The adapters own background tasks
//! that watch the peer; those tasks stop when the adapter is dropped.

use std::time::Duration;

mod stream;
mod websocket;

/// Upper bound on flushing and closing a connection whose peer stopped reading.
pub(crate) const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

pub use stream::StreamConnection;
pub use websocket::WebsocketConnection;
