//! Byte transport boundary, the fire-and-forget outbound sender and an
//! in-memory bus.

use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use crate::error::TransportError;

/// Best-effort broadcast to every other node.
pub trait Transport: Send + Sync {
    fn broadcast(&self, payload: Bytes) -> Result<(), TransportError>;
}

/// Receiver side of a transport.
pub trait InboundHandler: Send + Sync {
    /// Must return quickly; the caller is the transport's I/O task.
    fn on_receive(&self, payload: Bytes);
}

// ---------------------------------------------------------------------------
// Outbound sender
// ---------------------------------------------------------------------------

enum OutboundCommand {
    Send { tag: String, payload: Bytes },
    Flush(oneshot::Sender<()>),
}

/// Drains encoded messages into a [`Transport`] from a dedicated tokio task,
/// so callers never wait on I/O.
pub struct Outbound {
    command_tx: mpsc::UnboundedSender<OutboundCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Outbound {
    /// Must be called inside a tokio runtime.
    pub fn spawn(transport: Arc<dyn Transport>) -> Self {
        let (command_tx, mut command_rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(async move {
            while let Some(command) = command_rx.recv().await {
                match command {
                    OutboundCommand::Send { tag, payload } => {
                        trace!("Broadcasting {tag} ({} bytes)", payload.len());
                        if let Err(e) = transport.broadcast(payload) {
                            warn!("Failed to broadcast {tag} message: {e}");
                        }
                    }
                    OutboundCommand::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });
        Self {
            command_tx,
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn send(&self, tag: &str, payload: Bytes) {
        let command = OutboundCommand::Send {
            tag: tag.to_string(),
            payload,
        };
        if self.command_tx.send(command).is_err() {
            warn!("Dropping {tag} message, outbound sender is closed");
        }
    }

    /// Resolve once everything sent before this call reached the transport.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.command_tx.send(OutboundCommand::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Flush, then stop the sender task.
    pub async fn close(&self) {
        self.flush().await;
        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory bus
// ---------------------------------------------------------------------------

/// Delivers every broadcast to every connected handler, the sender included.
#[derive(Clone, Default)]
pub struct LocalBus {
    members: Arc<RwLock<Vec<Weak<dyn InboundHandler>>>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::new(self.clone())
    }

    pub fn connect(&self, handler: Weak<dyn InboundHandler>) {
        self.members.write().push(handler);
    }

    pub fn member_count(&self) -> usize {
        self.members.read().iter().filter(|m| m.strong_count() > 0).count()
    }
}

impl Transport for LocalBus {
    fn broadcast(&self, payload: Bytes) -> Result<(), TransportError> {
        let members: Vec<_> = {
            let mut members = self.members.write();
            members.retain(|m| m.strong_count() > 0);
            members.iter().filter_map(Weak::upgrade).collect()
        };
        if members.is_empty() {
            return Err(TransportError::Closed);
        }
        for member in members {
            member.on_receive(payload.clone());
        }
        Ok(())
    }
}
