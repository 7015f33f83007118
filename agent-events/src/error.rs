//! Error types for the agent-events crate.

/// Errors returned by the event bus.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The bus no longer accepts listeners or events
    #[error("Event bus is shutting down")]
    ShuttingDown,
}

/// Errors raised by a listener connection while delivering events.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The peer went away or the connection was already closed
    #[error("Connection closed")]
    Closed,

    /// The event could not be encoded for the wire
    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    /// Writing to the underlying stream failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The websocket transport reported an error
    #[error("Websocket error: {0}")]
    WebSocket(String),
}

/// Convenience type alias for Results using BusError.
pub type Result<T> = std::result::Result<T, BusError>;
