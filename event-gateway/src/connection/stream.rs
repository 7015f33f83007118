//! Raw stream transport: one JSON document per line.

use std::sync::atomic::{AtomicBool, Ordering};

use agent_events::{ConnectionError, Event, ListenerConnection};
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio_util::sync::{CancellationToken, DropGuard};

use super::CLOSE_TIMEOUT;
use crate::transport::RawStream;

/// Event frames written as newline-delimited JSON onto a taken-over stream.
pub struct StreamConnection<S> {
    writer: Mutex<WriteHalf<S>>,
    peer_gone: CancellationToken,
    closed: AtomicBool,
    _watcher: DropGuard,
}

impl<S: RawStream> StreamConnection<S> {
    /// Wrap `stream` and start watching it for the peer going away.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        let peer_gone = CancellationToken::new();
        let stop = CancellationToken::new();

        tokio::spawn(watch_peer(reader, peer_gone.clone(), stop.clone()));

        Self {
            writer: Mutex::new(writer),
            peer_gone,
            closed: AtomicBool::new(false),
            _watcher: stop.drop_guard(),
        }
    }
}

/// Reads until EOF. Anything the peer sends is discarded.
async fn watch_peer<R>(
    mut reader: ReadHalf<R>,
    peer_gone: CancellationToken,
    stop: CancellationToken,
) where
    R: AsyncRead,
{
    let mut buf = [0u8; 512];
    loop {
        tokio::select! {
            _ = stop.cancelled() => return,
            read = reader.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!("Stream listener read failed: {}", e);
                    break;
                }
            },
        }
    }
    peer_gone.cancel();
}

#[async_trait]
impl<S: RawStream> ListenerConnection for StreamConnection<S> {
    fn kind(&self) -> &'static str {
        "stream"
    }

    async fn write_event(&self, event: &Event) -> Result<(), ConnectionError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ConnectionError::Closed);
        }

        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn disconnected(&self) {
        self.peer_gone.cancelled().await;
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let closing = async { self.writer.lock().await.shutdown().await };
        match tokio::time::timeout(CLOSE_TIMEOUT, closing).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!("Failed to shut down stream listener: {}", e),
            Err(_) => tracing::debug!("Gave up shutting down stream listener"),
        }
    }
}
