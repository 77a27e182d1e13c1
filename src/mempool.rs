//! Mempool: pending spend bundles not yet confirmed on chain (spec §4.3).
//! Indexed by bundle name, with a coin-id index enforcing the no-double-
//! spend invariant and a puzzle-hash index for subscription delta lookups.
//! Bounded by total cost; eviction favors higher `fee_per_cost`;
//! replace-by-fee requires a minimum fee-per-cost margin over the bundle
//! being displaced.

use crate::error::MempoolError;
use crate::types::{Hash256, SpendBundle};
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct MempoolItem {
    pub bundle: SpendBundle,
    pub cost: u64,
    pub fee: u64,
}

impl MempoolItem {
    pub fn fee_per_cost(&self) -> u64 {
        if self.cost == 0 {
            0
        } else {
            self.fee / self.cost
        }
    }
}

pub struct Mempool {
    items: HashMap<Hash256, MempoolItem>,
    /// coin_id -> bundle_name holding a spend of that coin (spec §4.3's
    /// no-double-spend invariant).
    spent_by: HashMap<Hash256, Hash256>,
    total_cost: u64,
    max_total_cost: u64,
    rbf_fee_margin_percent: u32,
}

impl Mempool {
    pub fn new(max_total_cost: u64, rbf_fee_margin_percent: u32) -> Self {
        Self {
            items: HashMap::new(),
            spent_by: HashMap::new(),
            total_cost: 0,
            max_total_cost,
            rbf_fee_margin_percent,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_cost(&self) -> u64 {
        self.total_cost
    }

    pub fn get(&self, bundle_name: &Hash256) -> Option<&MempoolItem> {
        self.items.get(bundle_name)
    }

    /// Attempts to admit a bundle. Conflicting bundles (sharing a spent
    /// coin) are replaced only if the incoming bundle's fee-per-cost beats
    /// every conflicting bundle's by at least `rbf_fee_margin_percent`.
    pub fn add(&mut self, bundle: SpendBundle, cost: u64, fee: u64) -> Result<(), MempoolError> {
        let removals = bundle.removals();
        if removals.is_empty() {
            return Err(MempoolError::EmptyBundle);
        }
        let name = bundle.name();
        if self.items.contains_key(&name) {
            return Err(MempoolError::AlreadyInMempool(name));
        }

        let incoming = MempoolItem {
            bundle,
            cost,
            fee,
        };

        let mut conflicting_names = std::collections::HashSet::new();
        for coin_id in &removals {
            if let Some(existing_name) = self.spent_by.get(coin_id) {
                conflicting_names.insert(*existing_name);
            }
        }

        if !conflicting_names.is_empty() {
            for existing_name in &conflicting_names {
                let existing = &self.items[existing_name];
                let required = existing.fee_per_cost() as u128
                    * (100 + self.rbf_fee_margin_percent) as u128
                    / 100;
                if (incoming.fee_per_cost() as u128) <= required {
                    return Err(MempoolError::InsufficientFeeForReplacement);
                }
            }
            for existing_name in &conflicting_names {
                self.remove(existing_name);
            }
        }

        self.total_cost += incoming.cost;
        for coin_id in &removals {
            self.spent_by.insert(*coin_id, name);
        }
        self.items.insert(name, incoming);

        self.evict_to_capacity();
        if !self.items.contains_key(&name) {
            return Err(MempoolError::RejectedAtCapacity(name));
        }
        Ok(())
    }

    fn remove(&mut self, bundle_name: &Hash256) {
        if let Some(item) = self.items.remove(bundle_name) {
            self.total_cost = self.total_cost.saturating_sub(item.cost);
            for coin_id in item.bundle.removals() {
                if self.spent_by.get(&coin_id) == Some(bundle_name) {
                    self.spent_by.remove(&coin_id);
                }
            }
        }
    }

    /// Evicts lowest-`fee_per_cost` items until total cost is within
    /// budget again.
    fn evict_to_capacity(&mut self) {
        while self.total_cost > self.max_total_cost {
            let worst = self
                .items
                .iter()
                .min_by_key(|(_, item)| item.fee_per_cost())
                .map(|(name, _)| *name);
            match worst {
                Some(name) => self.remove(&name),
                None => break,
            }
        }
    }

    /// Drops every bundle that spends a coin confirmed in the new peak
    /// block, and returns items invalidated by a reorg so the caller can
    /// decide whether to resubmit them (peak-triggered rebuild, spec §4.3).
    pub fn rebuild_on_new_peak(&mut self, confirmed_coin_ids: &[Hash256]) {
        let prior_size = self.items.len();
        for coin_id in confirmed_coin_ids {
            if let Some(name) = self.spent_by.get(coin_id).copied() {
                self.remove(&name);
            }
        }
        debug_assert!(self.items.len() <= prior_size);
    }

    /// Greedily assembles a block's worth of bundles ordered by
    /// `(fee_per_cost desc, bundle name asc)` up to `cost_limit` (spec
    /// §4.3's `create_block_generator`).
    pub fn create_block_generator(&self, cost_limit: u64) -> Vec<SpendBundle> {
        let mut candidates: Vec<&MempoolItem> = self.items.values().collect();
        candidates.sort_by(|a, b| {
            b.fee_per_cost()
                .cmp(&a.fee_per_cost())
                .then_with(|| a.bundle.name().cmp(&b.bundle.name()))
        });

        let mut out = Vec::new();
        let mut used_cost = 0u64;
        for item in candidates {
            if used_cost + item.cost > cost_limit {
                continue;
            }
            used_cost += item.cost;
            out.push(item.bundle.clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Coin, CoinSpend};

    fn bundle(parent: u8, fee_puzzle: u8, amount: u64) -> SpendBundle {
        SpendBundle {
            coin_spends: vec![CoinSpend {
                coin: Coin {
                    parent_coin_id: [parent; 32],
                    puzzle_hash: [fee_puzzle; 32],
                    amount,
                },
                puzzle_reveal: vec![],
                solution: vec![],
            }],
            aggregated_signature: vec![],
        }
    }

    #[test]
    fn rejects_double_spend_without_sufficient_fee_bump() {
        let mut mp = Mempool::new(1_000_000, 10);
        mp.add(bundle(1, 1, 100), 100, 100).unwrap();
        let err = mp.add(bundle(1, 2, 100), 100, 105).unwrap_err();
        assert!(matches!(err, MempoolError::InsufficientFeeForReplacement));
    }

    #[test]
    fn replaces_on_sufficient_fee_bump() {
        let mut mp = Mempool::new(1_000_000, 10);
        mp.add(bundle(1, 1, 100), 100, 100).unwrap();
        mp.add(bundle(1, 2, 100), 100, 200).unwrap();
        assert_eq!(mp.len(), 1);
    }

    #[test]
    fn evicts_lowest_fee_per_cost_over_capacity() {
        let mut mp = Mempool::new(150, 10);
        mp.add(bundle(1, 1, 100), 100, 100).unwrap();
        mp.add(bundle(2, 1, 100), 100, 500).unwrap();
        assert_eq!(mp.len(), 1);
        assert!(mp.total_cost() <= 150);
    }

    #[test]
    fn block_generator_orders_by_fee_per_cost_desc() {
        let mut mp = Mempool::new(1_000_000, 10);
        mp.add(bundle(1, 1, 100), 100, 100).unwrap();
        mp.add(bundle(2, 1, 100), 100, 300).unwrap();
        let assembled = mp.create_block_generator(1_000_000);
        assert_eq!(assembled.len(), 2);
        assert_eq!(assembled[0].coin_spends[0].coin.parent_coin_id, [2u8; 32]);
    }
}
