//! Event model and in-process event bus for the guest agent.
//!
//! # Overview
//!
//! - [`Event`]: a typed notification with an opaque JSON payload.
//! - [`EventTypeFilter`]: the set of event types a listener accepts.
//! - [`EventBus`]: fans published events out to every matching listener.
//! - [`Listener`]: a live subscription bound to one [`ListenerConnection`]
//!   and one cancellation token.
//!
//! The bus knows nothing about wire transports. Anything that can write an
//! event frame, notice the peer leaving and close itself can be used as a
//! [`ListenerConnection`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use agent_events::{EventBus, EventTypeFilter, ListenerConnection, ProjectScope};
//! use tokio_util::sync::CancellationToken;
//!
//! async fn serve(bus: EventBus, connection: Arc<dyn ListenerConnection>) {
//!     let listener = bus
//!         .add_listener(ProjectScope::ALL_PROJECTS, EventTypeFilter::parse(Some("device")), connection)
//!         .expect("bus is shutting down");
//!
//!     let cancel = CancellationToken::new();
//!     listener.wait(&cancel).await;
//! }
//! ```

pub mod bus;
pub mod connection;
pub mod decode;
pub mod error;
pub mod event;
pub mod filter;
pub mod listener;

#[cfg(test)]
mod testing;

pub use bus::{EventBus, ProjectScope};
pub use connection::ListenerConnection;
pub use error::{BusError, ConnectionError, Result};
pub use event::{event_type, Event};
pub use filter::{EventTypeFilter, DEFAULT_EVENT_TYPES};
pub use listener::{Listener, ListenerExit};
