//! Per-connection peer state and the read/write loop built on
//! `network::wire`. Mirrors the teacher's `PeerConnection`/`PeerStateManager`
//! split (`network/peer_state.rs`): a cheap, cloneable handle carrying a
//! channel to the peer's write task, plus a registry keyed by peer id.

use crate::constants::network::{MAX_MISSED_PONGS, PING_INTERVAL_SECS, PONG_TIMEOUT_SECS};
use crate::error::PeerError;
use crate::network::message::Message;
use crate::network::wire;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionDirection {
    Inbound,
    Outbound,
}

/// A handle to a connected peer's write side. Sending never blocks on I/O —
/// messages queue on the channel and the peer's write task drains it.
#[derive(Clone)]
pub struct PeerHandle {
    pub peer_id: String,
    pub remote_addr: SocketAddr,
    pub direction: ConnectionDirection,
    pub is_trusted: bool,
    tx: mpsc::UnboundedSender<(Message, u16)>,
    connected_at: Instant,
    last_activity: Arc<RwLock<Instant>>,
    missed_pongs: Arc<RwLock<u32>>,
}

impl PeerHandle {
    pub fn send(&self, message: Message, request_id: u16) -> Result<(), PeerError> {
        self.tx
            .send((message, request_id))
            .map_err(|_| PeerError::HandshakeFailed("peer write task has exited".to_string()))
    }

    pub async fn mark_active(&self) {
        *self.last_activity.write().await = Instant::now();
        *self.missed_pongs.write().await = 0;
    }

    pub async fn idle_for(&self) -> Duration {
        Instant::now().duration_since(*self.last_activity.read().await)
    }

    pub async fn record_missed_pong(&self) -> u32 {
        let mut missed = self.missed_pongs.write().await;
        *missed += 1;
        *missed
    }

    pub fn uptime(&self) -> Duration {
        Instant::now().duration_since(self.connected_at)
    }
}

/// Drives a single peer connection: reads frames off `reader` and forwards
/// them to `inbound`, writes whatever arrives on the per-peer channel to
/// `writer`, and disconnects the peer once it misses `MAX_MISSED_PONGS` in a
/// row (spec §5's liveness check, same cadence as the teacher's ping loop).
pub async fn run_connection<R, W>(
    peer_id: String,
    remote_addr: SocketAddr,
    direction: ConnectionDirection,
    is_trusted: bool,
    mut reader: R,
    mut writer: W,
    registry: PeerRegistry,
    inbound: mpsc::UnboundedSender<(String, Message, u16)>,
) -> Result<(), PeerError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = PeerHandle {
        peer_id: peer_id.clone(),
        remote_addr,
        direction,
        is_trusted,
        tx,
        connected_at: Instant::now(),
        last_activity: Arc::new(RwLock::new(Instant::now())),
        missed_pongs: Arc::new(RwLock::new(0)),
    };
    registry.insert(handle.clone()).await;

    let write_task = {
        let peer_id = peer_id.clone();
        tokio::spawn(async move {
            while let Some((message, request_id)) = rx.recv().await {
                if let Err(e) = wire::send_message(&mut writer, &message, request_id).await {
                    warn!(peer = %peer_id, error = %e, "failed writing to peer, closing connection");
                    break;
                }
            }
        })
    };

    let read_result: Result<(), PeerError> = async {
        loop {
            let (message, request_id) = wire::recv_message(&mut reader).await?;
            handle.mark_active().await;
            if matches!(message, Message::Pong { .. }) {
                continue;
            }
            inbound
                .send((peer_id.clone(), message, request_id))
                .map_err(|_| {
                    PeerError::HandshakeFailed("inbound message channel closed".to_string())
                })?;
        }
    }
    .await;

    write_task.abort();
    registry.remove(&peer_id).await;
    debug!(peer = %peer_id, "connection closed");
    read_result
}

/// Sends periodic pings and disconnects peers that stop answering. Intended
/// to run as a single background task over the whole registry, not one task
/// per peer.
pub async fn run_liveness_checker(registry: PeerRegistry) {
    let mut interval = tokio::time::interval(Duration::from_secs(PING_INTERVAL_SECS));
    loop {
        interval.tick().await;
        for handle in registry.all().await {
            if handle.idle_for().await < Duration::from_secs(PONG_TIMEOUT_SECS) {
                continue;
            }
            let missed = handle.record_missed_pong().await;
            if missed >= MAX_MISSED_PONGS {
                warn!(peer = %handle.peer_id, missed, "peer missed too many pongs, disconnecting");
                registry.remove(&handle.peer_id).await;
                continue;
            }
            let _ = handle.send(Message::Ping { nonce: missed as u64 }, wire::NO_REQUEST_ID);
        }
    }
}

/// Registry of live peer handles keyed by peer id (spec §5: "one connection
/// per peer identity").
#[derive(Clone)]
pub struct PeerRegistry {
    peers: Arc<RwLock<HashMap<String, PeerHandle>>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self {
            peers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn insert(&self, handle: PeerHandle) {
        self.peers.write().await.insert(handle.peer_id.clone(), handle);
    }

    pub async fn remove(&self, peer_id: &str) -> Option<PeerHandle> {
        self.peers.write().await.remove(peer_id)
    }

    pub async fn get(&self, peer_id: &str) -> Option<PeerHandle> {
        self.peers.read().await.get(peer_id).cloned()
    }

    pub async fn contains(&self, peer_id: &str) -> bool {
        self.peers.read().await.contains_key(peer_id)
    }

    pub async fn all(&self) -> Vec<PeerHandle> {
        self.peers.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn broadcast(&self, message: Message) {
        for handle in self.all().await {
            let _ = handle.send(message.clone(), wire::NO_REQUEST_ID);
        }
    }
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_handle(peer_id: &str) -> PeerHandle {
        let (tx, _rx) = mpsc::unbounded_channel();
        PeerHandle {
            peer_id: peer_id.to_string(),
            remote_addr: "127.0.0.1:1".parse().unwrap(),
            direction: ConnectionDirection::Inbound,
            is_trusted: false,
            tx,
            connected_at: Instant::now(),
            last_activity: Arc::new(RwLock::new(Instant::now())),
            missed_pongs: Arc::new(RwLock::new(0)),
        }
    }

    #[tokio::test]
    async fn registry_tracks_insert_and_remove() {
        let registry = PeerRegistry::new();
        registry.insert(dummy_handle("peer-a")).await;
        assert!(registry.contains("peer-a").await);
        assert_eq!(registry.len().await, 1);
        registry.remove("peer-a").await;
        assert!(!registry.contains("peer-a").await);
    }

    #[tokio::test]
    async fn missed_pong_counter_resets_on_activity() {
        let handle = dummy_handle("peer-b");
        handle.record_missed_pong().await;
        handle.record_missed_pong().await;
        handle.mark_active().await;
        assert_eq!(*handle.missed_pongs.read().await, 0);
    }
}
