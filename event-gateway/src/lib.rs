//! Event endpoint of the guest agent.
//!
//! This crate serves `/1.0/events` over HTTP:
//!
//! - `GET` registers a listener that receives a live, filtered event stream.
//!   Clients that send `Upgrade: websocket` get one JSON text frame per
//!   event; everyone else gets a long-lived response carrying one JSON
//!   document per line.
//! - `POST` publishes a submitted event to every matching listener and hands
//!   it to the disk hotplug reactor.
//!
//! # Overview
//!
//! - [`EventServer`]: binds the endpoint and owns the bus and reactor.
//! - [`transport`]: picks the wire transport for a listener request.
//! - [`connection`]: adapters turning each transport into an
//!   [`agent_events::ListenerConnection`].
//! - [`handlers`]: the request handlers and their shared state.
//! - [`GatewayConfig`]: endpoint, transport and hotplug settings.
//!
//! # Example
//!
//! ```no_run
//! use event_gateway::{EventServer, GatewayConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     event_gateway::logging::init_logging_from_env()?;
//!
//!     let server = EventServer::start(GatewayConfig::from_env()?).await?;
//!     println!("Event gateway listening at: {}", server.base_url());
//!
//!     tokio::signal::ctrl_c().await?;
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod response;
mod server;
pub mod transport;

pub use config::GatewayConfig;
pub use connection::{StreamConnection, WebsocketConnection};
pub use error::{GatewayError, Result};
pub use handlers::{EventsService, SUBSCRIPTION_SCOPE};
pub use server::{routes, EventServer};
pub use transport::{select_transport, BodyHijacker, Hijack, Transport, TransportError};
