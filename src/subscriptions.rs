//! Coin subscription service: lets light-client peers ask to be notified
//! whenever a coin (or any coin under a puzzle hash) changes state, instead
//! of downloading full blocks (spec §4.6). Subscription state is owned
//! entirely by this struct, keyed by peer id; it's dropped wholesale when
//! a peer disconnects, since nothing here claims to survive a reconnect.

use crate::types::{CoinRecord, Hash256};
use std::collections::{HashMap, HashSet};

/// The initial snapshot handed back when a peer subscribes, paginated so a
/// puzzle hash with a huge history doesn't produce one unbounded response.
pub struct SubscriptionResponse {
    pub records: Vec<CoinRecord>,
    pub is_final_page: bool,
}

struct PeerSubscriptions {
    puzzle_hashes: HashSet<Hash256>,
    coin_ids: HashSet<Hash256>,
    is_trusted: bool,
}

impl PeerSubscriptions {
    fn item_count(&self) -> usize {
        self.puzzle_hashes.len() + self.coin_ids.len()
    }
}

pub struct SubscriptionManager {
    peers: HashMap<String, PeerSubscriptions>,
    max_subscribe_items: usize,
    trusted_max_subscribe_items: usize,
    max_subscribe_response_items: usize,
}

impl SubscriptionManager {
    pub fn new(
        max_subscribe_items: usize,
        trusted_max_subscribe_items: usize,
        max_subscribe_response_items: usize,
    ) -> Self {
        Self {
            peers: HashMap::new(),
            max_subscribe_items,
            trusted_max_subscribe_items,
            max_subscribe_response_items,
        }
    }

    pub fn on_peer_disconnected(&mut self, peer_id: &str) {
        self.peers.remove(peer_id);
    }

    fn limit_for(&self, is_trusted: bool) -> usize {
        if is_trusted {
            self.trusted_max_subscribe_items
        } else {
            self.max_subscribe_items
        }
    }

    /// Registers a peer's interest in the given puzzle hashes and coin ids,
    /// silently dropping additions past that peer's item cap (an
    /// overloaded subscriber doesn't get to starve everyone else's
    /// delta-computation cost).
    pub fn subscribe(
        &mut self,
        peer_id: &str,
        is_trusted: bool,
        puzzle_hashes: &[Hash256],
        coin_ids: &[Hash256],
        lookup_by_puzzle_hash: impl Fn(&Hash256) -> Vec<CoinRecord>,
        lookup_by_coin_id: impl Fn(&Hash256) -> Option<CoinRecord>,
    ) -> SubscriptionResponse {
        let limit = self.limit_for(is_trusted);
        let entry = self
            .peers
            .entry(peer_id.to_string())
            .or_insert_with(|| PeerSubscriptions {
                puzzle_hashes: HashSet::new(),
                coin_ids: HashSet::new(),
                is_trusted,
            });

        // Coin-id matches are collected before puzzle-hash matches so they
        // sit at the front of `matched` and survive the truncation below
        // first (spec §4.6: coin-id subscriptions take priority on
        // overflow).
        let mut matched = Vec::new();
        for coin_id in coin_ids {
            if entry.item_count() >= limit {
                break;
            }
            if entry.coin_ids.insert(*coin_id) {
                if let Some(record) = lookup_by_coin_id(coin_id) {
                    matched.push(record);
                }
            }
        }
        for ph in puzzle_hashes {
            if entry.item_count() >= limit {
                break;
            }
            if entry.puzzle_hashes.insert(*ph) {
                matched.extend(lookup_by_puzzle_hash(ph));
            }
        }

        let is_final_page = matched.len() <= self.max_subscribe_response_items;
        matched.truncate(self.max_subscribe_response_items);
        SubscriptionResponse {
            records: matched,
            is_final_page,
        }
    }

    pub fn unsubscribe(&mut self, peer_id: &str, puzzle_hashes: &[Hash256], coin_ids: &[Hash256]) {
        if let Some(entry) = self.peers.get_mut(peer_id) {
            for ph in puzzle_hashes {
                entry.puzzle_hashes.remove(ph);
            }
            for coin_id in coin_ids {
                entry.coin_ids.remove(coin_id);
            }
        }
    }

    /// Computes, for each subscribed peer, the subset of `changed_records`
    /// (new or newly-spent coins from a committed block) that peer cares
    /// about — either because it matches a subscribed coin id directly, or
    /// because the coin's puzzle hash is subscribed to.
    pub fn deltas_for_new_block(
        &self,
        changed_records: &[CoinRecord],
    ) -> HashMap<String, Vec<CoinRecord>> {
        let mut out = HashMap::new();
        for (peer_id, subs) in &self.peers {
            let matching: Vec<CoinRecord> = changed_records
                .iter()
                .filter(|r| {
                    subs.coin_ids.contains(&r.coin.coin_id())
                        || subs.puzzle_hashes.contains(&r.coin.puzzle_hash)
                })
                .cloned()
                .collect();
            if !matching.is_empty() {
                out.insert(peer_id.clone(), matching);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coin;

    fn record(puzzle_hash: u8, amount: u64) -> CoinRecord {
        CoinRecord {
            coin: Coin {
                parent_coin_id: [0u8; 32],
                puzzle_hash: [puzzle_hash; 32],
                amount,
            },
            confirmed_height: 1,
            spent_height: 0,
            coinbase: false,
            timestamp: 0,
        }
    }

    #[test]
    fn subscribe_returns_matching_puzzle_hash_records() {
        let mut mgr = SubscriptionManager::new(200_000, 2_000_000, 100_000);
        let resp = mgr.subscribe(
            "peer-a",
            false,
            &[[7u8; 32]],
            &[],
            |_| vec![record(7, 100)],
            |_| None,
        );
        assert_eq!(resp.records.len(), 1);
        assert!(resp.is_final_page);
    }

    #[test]
    fn item_cap_stops_further_subscriptions() {
        let mut mgr = SubscriptionManager::new(1, 2_000_000, 100_000);
        mgr.subscribe("peer-a", false, &[[1u8; 32], [2u8; 32]], &[], |_| vec![], |_| None);
        let subs = &mgr.peers["peer-a"];
        assert_eq!(subs.item_count(), 1);
    }

    #[test]
    fn disconnect_drops_subscriptions() {
        let mut mgr = SubscriptionManager::new(200_000, 2_000_000, 100_000);
        mgr.subscribe("peer-a", false, &[[1u8; 32]], &[], |_| vec![], |_| None);
        mgr.on_peer_disconnected("peer-a");
        assert!(mgr.peers.get("peer-a").is_none());
    }

    #[test]
    fn delta_only_notifies_subscribed_peers() {
        let mut mgr = SubscriptionManager::new(200_000, 2_000_000, 100_000);
        mgr.subscribe("peer-a", false, &[[7u8; 32]], &[], |_| vec![], |_| None);
        let changed = vec![record(7, 50), record(9, 50)];
        let deltas = mgr.deltas_for_new_block(&changed);
        assert_eq!(deltas.get("peer-a").unwrap().len(), 1);
    }
}
