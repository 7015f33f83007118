//! Request handlers for `/1.0/events`.
//!
//! `GET` registers a listener and keeps the request open for as long as the
//! listener lives. `POST` publishes a submitted event and hands it to the
//! hotplug reactor.

use std::sync::Arc;

use agent_events::{
    Event, EventBus, EventTypeFilter, Listener, ListenerConnection, ProjectScope,
};
use agent_hotplug::ReactorHandle;
use bytes::Bytes;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use warp::ws::{WebSocket, Ws};
use warp::{Rejection, Reply};

use crate::config::GatewayConfig;
use crate::connection::{StreamConnection, WebsocketConnection};
use crate::error::{GatewayError, Result};
use crate::response::empty_sync_response;
use crate::transport::{select_transport, BodyHijacker, Hijack, Transport, TransportError};

/// Every gateway listener sees events from all projects.
pub const SUBSCRIPTION_SCOPE: ProjectScope<'static> = ProjectScope::ALL_PROJECTS;

/// Query string of a listener request.
#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    /// Comma-separated event types
    #[serde(rename = "type")]
    pub types: Option<String>,
}

/// Shared state behind the events endpoint.
#[derive(Clone)]
pub struct EventsService {
    bus: EventBus,
    reactor: ReactorHandle,
    config: Arc<GatewayConfig>,
    shutdown: CancellationToken,
}

impl EventsService {
    pub fn new(
        bus: EventBus,
        reactor: ReactorHandle,
        config: Arc<GatewayConfig>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            bus,
            reactor,
            config,
            shutdown,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Register a listener bound to `connection`.
    pub fn register(
        &self,
        filter: EventTypeFilter,
        connection: Arc<dyn ListenerConnection>,
    ) -> Result<Listener> {
        Ok(self
            .bus
            .add_listener(SUBSCRIPTION_SCOPE, filter, connection)?)
    }

    /// Cancellation token for one listener request.
    ///
    /// Fires when the server shuts down.
    pub fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// The raw-stream capability, if enabled.
    pub fn hijacker(&self) -> Option<BodyHijacker> {
        self.config
            .stream_fallback
            .then(|| BodyHijacker::new(self.config.stream_buffer_size))
    }

    /// Take over the connection and serve a stream listener on it.
    ///
    /// The listener is registered before the response is returned; it is
    /// served by a background task until its lifetime ends.
    pub fn open_stream<H: Hijack>(
        &self,
        hijacker: H,
        filter: EventTypeFilter,
    ) -> Result<warp::reply::Response> {
        let (stream, response) = hijacker.hijack().map_err(TransportError::from)?;
        let connection = Arc::new(StreamConnection::new(stream));
        let listener = self.register(filter, connection)?;

        tracing::debug!(
            "Serving stream listener {} for [{}]",
            listener.id(),
            listener.filter()
        );
        let cancel = self.request_token();
        tokio::spawn(async move {
            listener.wait(&cancel).await;
        });

        Ok(response)
    }

    /// Serve a websocket listener until its lifetime ends.
    pub async fn serve_websocket(self, socket: WebSocket, filter: EventTypeFilter) {
        let connection = Arc::new(WebsocketConnection::new(
            socket,
            self.config.websocket_ping_interval,
        ));

        match self.register(filter, connection.clone()) {
            Ok(listener) => {
                tracing::debug!(
                    "Serving websocket listener {} for [{}]",
                    listener.id(),
                    listener.filter()
                );
                let cancel = self.request_token();
                listener.wait(&cancel).await;
            }
            Err(e) => {
                tracing::debug!("Refusing websocket listener: {}", e);
                connection.close().await;
            }
        }
    }

    /// Decode and publish a submitted event, then hand it to the reactor.
    pub fn accept(&self, body: &[u8]) -> Result<()> {
        let value: serde_json::Value = serde_json::from_slice(body)?;
        if !value.is_object() {
            return Err(GatewayError::Decode(serde::de::Error::custom(
                "event must be a JSON object",
            )));
        }
        let event: Event = serde_json::from_value(value)?;

        self.bus.send(
            SUBSCRIPTION_SCOPE.project,
            &event.event_type,
            event.metadata.clone(),
        )?;
        self.reactor.dispatch(event);

        Ok(())
    }
}

/// `GET /1.0/events`
pub async fn events_get(
    query: EventsQuery,
    upgrade_header: Option<String>,
    ws: Option<Ws>,
    service: EventsService,
) -> std::result::Result<Box<dyn Reply>, Rejection> {
    let filter = EventTypeFilter::parse(query.types.as_deref());

    let transport = match select_transport(upgrade_header.as_deref(), ws, service.hijacker()) {
        Ok(transport) => transport,
        Err(e) => {
            tracing::warn!("Rejecting event listener: {}", e);
            return Ok(Box::new(GatewayError::from(e)));
        }
    };

    match transport {
        Transport::Upgrade(ws) => Ok(Box::new(
            ws.on_upgrade(move |socket| service.serve_websocket(socket, filter)),
        )),
        Transport::Hijack(hijacker) => match service.open_stream(hijacker, filter) {
            Ok(response) => Ok(Box::new(response)),
            Err(e) => {
                tracing::warn!("Failed to open event stream: {}", e);
                Ok(Box::new(e))
            }
        },
    }
}

/// `POST /1.0/events`
pub async fn events_post(
    body: Bytes,
    service: EventsService,
) -> std::result::Result<Box<dyn Reply>, Rejection> {
    let max = service.config.max_body_bytes;
    if body.len() as u64 > max {
        return Ok(Box::new(GatewayError::BodyTooLarge { max }));
    }

    match service.accept(&body) {
        Ok(()) => Ok(Box::new(empty_sync_response())),
        Err(e) => {
            tracing::warn!("Failed to accept event: {}", e);
            Ok(Box::new(e))
        }
    }
}
