//! UDP peer transport: every envelope is sent as one datagram to each
//! configured peer.
//!
//! `broadcast` only queues the payload. A sender task awaits the socket for
//! each datagram, so nothing is lost while the socket is not yet writable.

use std::net::SocketAddr;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use tabsync_sync::{InboundHandler, Transport, TransportError};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{info, trace, warn};

/// Largest datagram the receive loop accepts.
const RECV_BUF_SIZE: usize = 65_535;

enum Outgoing {
    Datagram(Bytes),
    Barrier(oneshot::Sender<()>),
}

pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    outgoing: mpsc::UnboundedSender<Outgoing>,
}

impl UdpTransport {
    /// Bind the socket and start the sender task. The task ends once the
    /// transport is dropped.
    pub async fn bind(addr: SocketAddr, peers: Vec<SocketAddr>) -> std::io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Replication transport bound on {addr} with {} peers", peers.len());
        let (outgoing, rx) = mpsc::unbounded_channel();
        tokio::spawn(send_loop(socket.clone(), peers, rx));
        Ok(Self { socket, outgoing })
    }

    /// Wait until everything broadcast so far was handed to the socket.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.outgoing.send(Outgoing::Barrier(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    #[cfg(test)]
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Feed every received datagram to `handler` until shutdown.
    pub fn spawn_receiver(
        &self,
        handler: Weak<dyn InboundHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let socket = self.socket.clone();
        tokio::spawn(async move {
            let mut recv_buf = vec![0u8; RECV_BUF_SIZE];
            loop {
                tokio::select! {
                    result = socket.recv_from(&mut recv_buf) => {
                        match result {
                            Ok((len, addr)) => {
                                let Some(handler) = handler.upgrade() else {
                                    break;
                                };
                                trace!("Received {len} bytes from {addr}");
                                handler.on_receive(Bytes::copy_from_slice(&recv_buf[..len]));
                            }
                            Err(e) => warn!("UDP recv error: {e}"),
                        }
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Replication transport stopped");
        })
    }
}

impl Transport for UdpTransport {
    fn broadcast(&self, payload: Bytes) -> Result<(), TransportError> {
        self.outgoing
            .send(Outgoing::Datagram(payload))
            .map_err(|_| TransportError::Closed)
    }
}

async fn send_loop(
    socket: Arc<UdpSocket>,
    peers: Vec<SocketAddr>,
    mut rx: mpsc::UnboundedReceiver<Outgoing>,
) {
    while let Some(outgoing) = rx.recv().await {
        let payload = match outgoing {
            Outgoing::Datagram(payload) => payload,
            Outgoing::Barrier(done) => {
                let _ = done.send(());
                continue;
            }
        };
        for peer in &peers {
            if let Err(e) = socket.send_to(&payload, *peer).await {
                warn!("Failed to send {} bytes to {peer}: {e}", payload.len());
            }
        }
    }
    trace!("Replication sender stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct Collect(mpsc::UnboundedSender<Bytes>);

    impl InboundHandler for Collect {
        fn on_receive(&self, payload: Bytes) {
            let _ = self.0.send(payload);
        }
    }

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn datagram_reaches_peer() {
        let receiver = UdpTransport::bind(loopback(), Vec::new()).await.unwrap();
        let sender = UdpTransport::bind(loopback(), vec![receiver.local_addr().unwrap()])
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler: Arc<dyn InboundHandler> = Arc::new(Collect(tx));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = receiver.spawn_receiver(Arc::downgrade(&handler), shutdown_rx);

        sender.broadcast(Bytes::from_static(b"envelope")).unwrap();
        let got = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&got[..], b"envelope");

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn burst_right_after_bind_is_delivered() {
        let receiver = UdpTransport::bind(loopback(), Vec::new()).await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler: Arc<dyn InboundHandler> = Arc::new(Collect(tx));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        receiver.spawn_receiver(Arc::downgrade(&handler), shutdown_rx);

        let sender = UdpTransport::bind(loopback(), vec![receiver.local_addr().unwrap()])
            .await
            .unwrap();
        for i in 0..5u8 {
            sender.broadcast(Bytes::from(vec![i])).unwrap();
        }
        sender.flush().await;

        for i in 0..5u8 {
            let got = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(&got[..], &[i]);
        }
    }

    #[tokio::test]
    async fn broadcast_without_peers_is_a_no_op() {
        let transport = UdpTransport::bind(loopback(), Vec::new()).await.unwrap();
        assert!(transport.broadcast(Bytes::from_static(b"x")).is_ok());
    }
}
