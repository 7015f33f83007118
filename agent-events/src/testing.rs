//! In-memory listener connection for unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::connection::ListenerConnection;
use crate::error::ConnectionError;
use crate::event::Event;

pub(crate) struct MemoryConnection {
    events: Mutex<Vec<Event>>,
    written: Notify,
    peer_gone: CancellationToken,
    closed: AtomicBool,
    fail_writes: AtomicBool,
    stall_writes: AtomicBool,
    stalled: CancellationToken,
}

impl MemoryConnection {
    pub(crate) fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            written: Notify::new(),
            peer_gone: CancellationToken::new(),
            closed: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            stall_writes: AtomicBool::new(false),
            stalled: CancellationToken::new(),
        }
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) async fn wait_for_events(&self, count: usize) {
        loop {
            let notified = self.written.notified();
            if self.events.lock().unwrap().len() >= count {
                return;
            }
            notified.await;
        }
    }

    pub(crate) fn disconnect(&self) {
        self.peer_gone.cancel();
    }

    pub(crate) fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Make every later write hang forever, like a peer that stopped reading.
    pub(crate) fn stall_writes(&self) {
        self.stall_writes.store(true, Ordering::SeqCst);
    }

    pub(crate) async fn wait_for_stalled_write(&self) {
        self.stalled.cancelled().await
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ListenerConnection for MemoryConnection {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn write_event(&self, event: &Event) -> Result<(), ConnectionError> {
        if self.fail_writes.load(Ordering::SeqCst) || self.is_closed() {
            return Err(ConnectionError::Closed);
        }
        if self.stall_writes.load(Ordering::SeqCst) {
            self.stalled.cancel();
            std::future::pending::<()>().await;
        }
        self.events.lock().unwrap().push(event.clone());
        self.written.notify_waiters();
        Ok(())
    }

    async fn disconnected(&self) {
        self.peer_gone.cancelled().await
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
