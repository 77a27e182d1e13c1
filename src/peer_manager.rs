//! Peer address book: tracks known peer addresses, scores them on
//! (mis)behavior, and decides which candidates to dial to keep the node at
//! its configured peer counts. Grounded in the teacher's sled-backed
//! `PeerManager` (`load_peers_from_disk`/persist-on-write pattern), with
//! its masternode-stake verification and HTTP discovery-server client
//! dropped: this network has no masternode tier, and peer discovery here
//! is DNS-seed + gossip (`Subscribe`/`RequestPeers`) only, per DESIGN.md.

use crate::config::NetworkConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

const REPUTATION_BAN_THRESHOLD: i32 = -50;
const REPUTATION_MISBEHAVIOR_PENALTY: i32 = -20;
const REPUTATION_GOOD_BEHAVIOR_REWARD: i32 = 1;
const PEER_TREE: &str = "peers";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerInfo {
    pub address: String,
    pub last_seen_unix: u64,
    pub connection_attempts: u32,
    pub is_trusted: bool,
    pub reputation_score: i32,
}

impl PeerInfo {
    fn new(address: String) -> Self {
        Self {
            address,
            last_seen_unix: 0,
            connection_attempts: 0,
            is_trusted: false,
            reputation_score: 0,
        }
    }

    fn is_banned(&self) -> bool {
        self.reputation_score <= REPUTATION_BAN_THRESHOLD
    }
}

/// Known peer addresses plus connection bookkeeping, persisted to the
/// store's `peers` tree so a restart doesn't forget the network.
pub struct PeerManager {
    known: Arc<RwLock<HashMap<String, PeerInfo>>>,
    db: Arc<sled::Db>,
    config: NetworkConfig,
}

impl PeerManager {
    pub fn new(db: Arc<sled::Db>, config: NetworkConfig) -> Self {
        Self {
            known: Arc::new(RwLock::new(HashMap::new())),
            db,
            config,
        }
    }

    pub async fn load_from_disk(&self) -> Result<(), sled::Error> {
        let tree = self.db.open_tree(PEER_TREE)?;
        let mut known = self.known.write().await;
        let mut loaded = 0;
        for entry in tree.iter() {
            let (key, value) = entry?;
            match bincode::deserialize::<PeerInfo>(&value) {
                Ok(info) => {
                    known.insert(String::from_utf8_lossy(&key).to_string(), info);
                    loaded += 1;
                }
                Err(e) => warn!(error = %e, "skipping corrupt peer record"),
            }
        }
        info!(loaded, "loaded peers from disk");
        Ok(())
    }

    fn persist(&self, info: &PeerInfo) {
        if let Ok(tree) = self.db.open_tree(PEER_TREE) {
            if let Ok(bytes) = bincode::serialize(info) {
                let _ = tree.insert(info.address.as_bytes(), bytes);
            }
        }
    }

    /// Adds a candidate address learned from a bootstrap list, `RespondPeers`,
    /// or a blacklist exemption. No-op if already known.
    pub async fn add_candidate(&self, address: String) -> bool {
        if self.config.blacklisted_peers.contains(&address) {
            return false;
        }
        let mut known = self.known.write().await;
        if known.contains_key(&address) {
            return false;
        }
        let info = PeerInfo::new(address.clone());
        self.persist(&info);
        known.insert(address, info);
        true
    }

    pub async fn record_connected(&self, address: &str, now_unix: u64) {
        let mut known = self.known.write().await;
        let info = known
            .entry(address.to_string())
            .or_insert_with(|| PeerInfo::new(address.to_string()));
        info.last_seen_unix = now_unix;
        info.connection_attempts += 1;
        info.reputation_score =
            (info.reputation_score + REPUTATION_GOOD_BEHAVIOR_REWARD).min(100);
        self.persist(info);
    }

    pub async fn penalize(&self, address: &str) {
        let mut known = self.known.write().await;
        if let Some(info) = known.get_mut(address) {
            info.reputation_score =
                (info.reputation_score - REPUTATION_MISBEHAVIOR_PENALTY).max(-100);
            if info.is_banned() {
                warn!(peer = address, score = info.reputation_score, "peer banned for misbehavior");
            }
            self.persist(info);
        }
    }

    pub async fn is_banned(&self, address: &str) -> bool {
        self.known
            .read()
            .await
            .get(address)
            .map(|i| i.is_banned())
            .unwrap_or(false)
    }

    /// Picks up to `count` unbanned, not-currently-connected candidates to
    /// dial, preferring addresses that haven't been attempted recently.
    pub async fn pick_dial_candidates(
        &self,
        count: usize,
        already_connected: &[String],
    ) -> Vec<String> {
        let known = self.known.read().await;
        let mut candidates: Vec<&PeerInfo> = known
            .values()
            .filter(|p| !p.is_banned() && !already_connected.contains(&p.address))
            .collect();
        candidates.sort_by_key(|p| p.connection_attempts);
        candidates
            .into_iter()
            .take(count)
            .map(|p| p.address.clone())
            .collect()
    }

    pub async fn known_addresses(&self) -> Vec<String> {
        self.known.read().await.keys().cloned().collect()
    }

    pub async fn peer_count(&self) -> usize {
        self.known.read().await.len()
    }

    pub fn target_peer_count(&self) -> usize {
        self.config.target_peer_count
    }

    pub fn target_outbound_peer_count(&self) -> usize {
        self.config.target_outbound_peer_count
    }
}
