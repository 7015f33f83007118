//! HTTP server exposing the events endpoint.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use agent_events::EventBus;
use agent_hotplug::{CommandRunner, HotplugReactor};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::handlers::{self, EventsQuery, EventsService};
use crate::response::error_response;

/// HTTP server for the guest agent's event endpoint.
///
/// Serves `GET /1.0/events` (listeners) and `POST /1.0/events` (event
/// submission) and runs the hotplug reactor that reacts to submitted device
/// events.
///
/// # Example
///
/// ```no_run
/// use event_gateway::{EventServer, GatewayConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let server = EventServer::start(GatewayConfig::default())
///         .await
///         .expect("Failed to start event server");
///
///     println!("Listening at: {}", server.base_url());
///
///     tokio::signal::ctrl_c().await.ok();
///     server.shutdown().await;
/// }
/// ```
pub struct EventServer {
    /// Address the server is bound to
    local_addr: SocketAddr,
    /// Bus shared by listeners and submissions
    bus: EventBus,
    /// Parent of every request's cancellation token
    shutdown: CancellationToken,
    /// Server task handle
    server_handle: Option<JoinHandle<()>>,
    /// Time allowed for in-flight responses to drain on shutdown
    shutdown_grace: Duration,
}

impl EventServer {
    /// Bind the configured address and start serving.
    ///
    /// Mounts are performed with the system's mount program.
    pub async fn start(config: GatewayConfig) -> Result<Self> {
        let reactor = HotplugReactor::with_system_runner(config.hotplug.clone())?;
        Self::launch(config, reactor)
    }

    /// Like [`EventServer::start`], running mount commands through `runner`.
    pub async fn with_runner(
        config: GatewayConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self> {
        let reactor = HotplugReactor::new(config.hotplug.clone(), runner)?;
        Self::launch(config, reactor)
    }

    fn launch(config: GatewayConfig, reactor: HotplugReactor) -> Result<Self> {
        config.validate()?;

        let bus = EventBus::new();
        let shutdown = CancellationToken::new();
        let (reactor_handle, _worker) = reactor.spawn();
        let addr = config.listen_addr;
        let shutdown_grace = config.shutdown_grace;

        let service = EventsService::new(
            bus.clone(),
            reactor_handle,
            Arc::new(config),
            shutdown.clone(),
        );

        let signal = shutdown.clone();
        let (local_addr, server) = warp::serve(routes(service))
            .try_bind_with_graceful_shutdown(addr, async move {
                signal.cancelled().await;
            })
            .map_err(|e| GatewayError::Bind {
                addr,
                message: e.to_string(),
            })?;

        tracing::info!("Event gateway listening on {}", local_addr);
        let server_handle = tokio::spawn(server);

        Ok(Self {
            local_addr,
            bus,
            shutdown,
            server_handle: Some(server_handle),
            shutdown_grace,
        })
    }

    /// Address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Base URL of the server, e.g. `http://127.0.0.1:8443`.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    /// The event bus behind the endpoint.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Shut the server down.
    ///
    /// Stops the bus, ends every listener and waits up to the configured
    /// grace period for the HTTP server to finish in-flight requests.
    /// Responses still pending after that, such as a stream whose client
    /// stopped reading, are abandoned. Mounts already in progress run to
    /// completion on their own.
    pub async fn shutdown(mut self) {
        self.bus.shutdown();
        self.shutdown.cancel();

        if let Some(mut handle) = self.server_handle.take() {
            match tokio::time::timeout(self.shutdown_grace, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("Event server task failed: {}", e),
                Err(_) => {
                    tracing::warn!(
                        "Event server did not drain within {:?}, abandoning open connections",
                        self.shutdown_grace
                    );
                    handle.abort();
                }
            }
        }
        tracing::info!("Event gateway stopped");
    }
}

impl Drop for EventServer {
    fn drop(&mut self) {
        self.bus.shutdown();
        self.shutdown.cancel();
    }
}

/// The `/1.0/events` routes with rejection handling.
pub fn routes(
    service: EventsService,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let max_body = service.config().max_body_bytes;
    let with_service = warp::any().map(move || service.clone());

    let upgrade = warp::ws()
        .map(Some)
        .or(warp::any().map(|| None::<warp::ws::Ws>))
        .unify();

    let listen = warp::path!("1.0" / "events")
        .and(warp::get())
        .and(warp::query::<EventsQuery>())
        .and(warp::header::optional::<String>("upgrade"))
        .and(upgrade)
        .and(with_service.clone())
        .and_then(handlers::events_get);

    let submit = warp::path!("1.0" / "events")
        .and(warp::post())
        .and(body_limit(max_body))
        .and(warp::body::bytes())
        .and(with_service)
        .and_then(handlers::events_post);

    listen.or(submit).recover(handle_rejection)
}

/// Rejects bodies whose declared length exceeds `max`.
///
/// Bodies without a declared length are checked after they are read.
fn body_limit(max: u64) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::header::optional::<u64>("content-length")
        .and_then(move |length: Option<u64>| async move {
            match length {
                Some(length) if length > max => Err(warp::reject::custom(BodyTooLarge { max })),
                _ => Ok(()),
            }
        })
        .untuple_one()
}

#[derive(Debug)]
struct BodyTooLarge {
    max: u64,
}

impl warp::reject::Reject for BodyTooLarge {}

/// Map rejections to the error envelope.
async fn handle_rejection(
    err: Rejection,
) -> std::result::Result<warp::reply::Response, Infallible> {
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(limit) = err.find::<BodyTooLarge>() {
        let error = GatewayError::BodyTooLarge { max: limit.max };
        (error.status(), error.to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if let Some(e) = err.find::<warp::reject::InvalidHeader>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else {
        tracing::warn!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    };

    Ok(error_response(code, &message))
}
