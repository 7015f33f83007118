//! Choosing the wire transport for an event listener.
//!
//! A listener request is served over exactly one of two transports:
//!
//! - a websocket, when the client asks for the upgrade;
//! - otherwise the raw connection is taken over and events are written to it
//!   as a stream of JSON lines.
//!
//! Both end up behind [`ListenerConnection`](agent_events::ListenerConnection),
//! so nothing past this module knows which one is in use.

use std::io;

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio_util::io::ReaderStream;
use warp::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use warp::http::StatusCode;
use warp::hyper::Body;
use warp::reply::Response;

/// Errors establishing a listener transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The client asked for a websocket but the handshake cannot complete
    #[error("Websocket upgrade failed: {0}")]
    UpgradeFailed(String),

    /// The front-end cannot hand over the raw connection
    #[error("Missing required duplex-takeover support")]
    HijackUnsupported,

    /// Taking over the raw connection failed
    #[error("Failed to take over connection: {0}")]
    Hijack(#[from] io::Error),
}

/// A raw byte stream taken over from the HTTP machinery.
pub trait RawStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> RawStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Capability to detach a request's connection into a raw byte stream.
pub trait Hijack {
    type Stream: RawStream;

    /// Take over the connection.
    ///
    /// Returns the raw stream and the response head that has to be sent to
    /// the client for the stream to reach it.
    fn hijack(self) -> io::Result<(Self::Stream, Response)>;
}

/// Takes over a warp response by handing out the writing end of a pipe
/// whose reading end becomes the streamed response body.
///
/// Reading from the returned stream yields EOF once the client goes away
/// and the body is dropped.
#[derive(Debug, Clone, Copy)]
pub struct BodyHijacker {
    buffer_size: usize,
}

impl BodyHijacker {
    pub fn new(buffer_size: usize) -> Self {
        Self { buffer_size }
    }
}

impl Hijack for BodyHijacker {
    type Stream = DuplexStream;

    fn hijack(self) -> io::Result<(DuplexStream, Response)> {
        let (local, remote) = tokio::io::duplex(self.buffer_size);

        let response = warp::http::Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "application/json")
            .header(CACHE_CONTROL, "no-cache")
            .body(Body::wrap_stream(ReaderStream::new(remote)))
            .map_err(io::Error::other)?;

        Ok((local, response))
    }
}

/// The transport chosen for one request.
#[derive(Debug)]
pub enum Transport<U, H> {
    /// Full-duplex websocket
    Upgrade(U),
    /// Raw stream of JSON lines
    Hijack(H),
}

/// Returns true if the `Upgrade` header asks for a websocket.
pub fn wants_websocket(upgrade_header: Option<&str>) -> bool {
    upgrade_header.is_some_and(|value| value.trim().eq_ignore_ascii_case("websocket"))
}

/// Pick the transport for a listener request.
///
/// `upgrade` is the websocket handshake if the request carries a valid one,
/// `hijacker` the raw takeover capability if the front-end offers it. There
/// is no fallback from one to the other: a request that asks for a websocket
/// and cannot be upgraded fails.
pub fn select_transport<U, H>(
    upgrade_header: Option<&str>,
    upgrade: Option<U>,
    hijacker: Option<H>,
) -> Result<Transport<U, H>, TransportError> {
    if wants_websocket(upgrade_header) {
        return upgrade.map(Transport::Upgrade).ok_or_else(|| {
            TransportError::UpgradeFailed(
                "request is missing the websocket handshake headers".to_string(),
            )
        });
    }

    hijacker
        .map(Transport::Hijack)
        .ok_or(TransportError::HijackUnsupported)
}
