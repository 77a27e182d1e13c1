//! Gossip forwarder: relays `NewPeak` / `NewSignagePoint` /
//! `NewUnfinishedBlock` / `NewTransaction` to every peer that hasn't already
//! seen them. Grounded in the teacher's `network/dedup_filter.rs` dedup
//! intent, replacing its unused Bloom filter with a bounded per-peer LRU of
//! message digests (the teacher's own module doc notes the Bloom filter
//! wasn't wired up; an LRU needs no false-positive tradeoff at this scale).

use crate::constants::network::{GOSSIP_DEDUP_CACHE_SIZE, MAX_DUPLICATE_UNFINISHED_BLOCKS};
use crate::network::message::Message;
use crate::network::peer::PeerRegistry;
use crate::network::wire::NO_REQUEST_ID;
use crate::types::Hash256;
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;

fn digest_of(message: &Message) -> Hash256 {
    use crate::codec::ToBytes;
    let mut hasher = Sha256::new();
    hasher.update([message.message_type() as u8]);
    hasher.update(message.to_bytes_vec());
    hasher.finalize().into()
}

/// One gossip message family's dedup state: a global LRU of seen digests
/// (so we never re-broadcast the same message twice) plus, for unfinished
/// blocks specifically, a per-reward-hash counter capping how many distinct
/// foliage variants of the same block we'll relay.
pub struct GossipFilter {
    seen: Mutex<LruCache<Hash256, ()>>,
    unfinished_variants: Mutex<HashMap<Hash256, usize>>,
}

impl GossipFilter {
    pub fn new() -> Self {
        Self {
            seen: Mutex::new(LruCache::new(
                NonZeroUsize::new(GOSSIP_DEDUP_CACHE_SIZE).expect("cache size is nonzero"),
            )),
            unfinished_variants: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true if this message should be forwarded (first time seen,
    /// and under the per-reward-hash variant cap for unfinished blocks).
    fn should_forward(&self, message: &Message) -> bool {
        let digest = digest_of(message);
        {
            let mut seen = self.seen.lock().unwrap();
            if seen.put(digest, ()).is_some() {
                return false;
            }
        }

        if let Message::NewUnfinishedBlock { block } = message {
            let reward_hash = block.reward_hash();
            let mut variants = self.unfinished_variants.lock().unwrap();
            let count = variants.entry(reward_hash).or_insert(0);
            if *count >= MAX_DUPLICATE_UNFINISHED_BLOCKS {
                return false;
            }
            *count += 1;
        }

        true
    }
}

impl Default for GossipFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Forwards `message` (received from `from_peer`) to every other connected
/// peer, unless the filter judges it a duplicate.
pub async fn forward(
    filter: &GossipFilter,
    registry: &PeerRegistry,
    from_peer: &str,
    message: Message,
) {
    if !filter.should_forward(&message) {
        return;
    }
    for handle in registry.all().await {
        if handle.peer_id == from_peer {
            continue;
        }
        let _ = handle.send(message.clone(), NO_REQUEST_ID);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_message_is_not_forwarded_twice() {
        let filter = GossipFilter::new();
        let msg = Message::NewPeak { header_hash: [1u8; 32], height: 10, weight: 10 };
        assert!(filter.should_forward(&msg));
        assert!(!filter.should_forward(&msg));
    }

    #[test]
    fn distinct_messages_are_independent() {
        let filter = GossipFilter::new();
        let a = Message::NewPeak { header_hash: [1u8; 32], height: 10, weight: 10 };
        let b = Message::NewPeak { header_hash: [2u8; 32], height: 10, weight: 10 };
        assert!(filter.should_forward(&a));
        assert!(filter.should_forward(&b));
    }
}
