//! Websocket transport: one JSON text frame per event.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agent_events::{ConnectionError, Event, ListenerConnection};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tokio_util::sync::{CancellationToken, DropGuard};
use warp::ws::{Message, WebSocket};

use super::CLOSE_TIMEOUT;

type Sink = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Event frames written to an upgraded websocket.
///
/// A reader task watches for close frames and EOF. When a ping interval is
/// configured a heartbeat task pings the peer and treats a failed ping as a
/// disconnect.
pub struct WebsocketConnection {
    sink: Sink,
    peer_gone: CancellationToken,
    closed: AtomicBool,
    _tasks: DropGuard,
}

impl WebsocketConnection {
    /// Wrap an upgraded socket. A zero `ping_interval` disables the heartbeat.
    pub fn new(socket: WebSocket, ping_interval: Duration) -> Self {
        let (sink, stream) = socket.split();
        let sink: Sink = Arc::new(Mutex::new(sink));
        let peer_gone = CancellationToken::new();
        let stop = CancellationToken::new();

        tokio::spawn(watch_peer(stream, peer_gone.clone(), stop.clone()));
        if !ping_interval.is_zero() {
            tokio::spawn(heartbeat(
                sink.clone(),
                ping_interval,
                peer_gone.clone(),
                stop.clone(),
            ));
        }

        Self {
            sink,
            peer_gone,
            closed: AtomicBool::new(false),
            _tasks: stop.drop_guard(),
        }
    }
}

async fn watch_peer(
    mut stream: SplitStream<WebSocket>,
    peer_gone: CancellationToken,
    stop: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            _ = stop.cancelled() => return,
            message = stream.next() => message,
        };

        match message {
            Some(Ok(message)) if message.is_close() => break,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                tracing::debug!("Websocket listener read failed: {}", e);
                break;
            }
            None => break,
        }
    }
    peer_gone.cancel();
}

async fn heartbeat(
    sink: Sink,
    interval: Duration,
    peer_gone: CancellationToken,
    stop: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    loop {
        tokio::select! {
            _ = stop.cancelled() => return,
            _ = peer_gone.cancelled() => return,
            _ = ticker.tick() => {}
        }

        if let Err(e) = sink.lock().await.send(Message::ping(Vec::new())).await {
            tracing::debug!("Websocket listener ping failed: {}", e);
            peer_gone.cancel();
            return;
        }
    }
}

#[async_trait]
impl ListenerConnection for WebsocketConnection {
    fn kind(&self) -> &'static str {
        "websocket"
    }

    async fn write_event(&self, event: &Event) -> Result<(), ConnectionError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ConnectionError::Closed);
        }

        let frame = serde_json::to_string(event)?;
        self.sink
            .lock()
            .await
            .send(Message::text(frame))
            .await
            .map_err(|e| ConnectionError::WebSocket(e.to_string()))
    }

    async fn disconnected(&self) {
        self.peer_gone.cancelled().await;
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let closing = async {
            let mut sink = self.sink.lock().await;
            if !self.peer_gone.is_cancelled() {
                let _ = sink.send(Message::close()).await;
            }
            sink.close().await
        };
        match tokio::time::timeout(CLOSE_TIMEOUT, closing).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!("Failed to close websocket listener: {}", e),
            Err(_) => tracing::debug!("Gave up closing websocket listener"),
        }
    }
}
