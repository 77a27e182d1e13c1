//! The blockchain store: `sled`-backed durable state for headers, coin
//! records, and sub-epoch summaries, plus the commit pipeline that ties
//! block validation to fork choice and reorg (spec §4.2). Single writer
//! (all mutation goes through `add_block`/`rollback_to`, serialized by
//! `write_lock`), many readers (every other lookup only takes `sled`'s own
//! internal locking).

mod reorg;
mod schema;

pub use schema::{BlockDiff, StoredBlock};

use crate::block::header::{BlockHeader, ChainState, FullBlock};
use crate::block::proof_of_space::PoSpaceVerifier;
use crate::block::validator::{self, BlockContext};
use crate::block::vdf::VdfVerifier;
use crate::error::StoreError;
use crate::network_type::NetworkConstants;
use crate::script::BlockProgramRunner;
use crate::time_sync::WallClock;
use crate::types::{hash_bytes, CoinRecord, Hash256};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Outcome of attempting to add a block to the store (spec §4.2).
#[derive(Debug)]
pub enum AddResult {
    NewPeak(ChainState),
    AddedAsOrphan,
    AlreadyHave,
    Invalid(crate::error::ValidationError),
    Disconnected,
}

pub struct BlockchainStore {
    db: Arc<sled::Db>,
    /// Serializes every block-admitting/rollback mutation; reads never
    /// take this.
    write_lock: Mutex<()>,
}

impl BlockchainStore {
    pub fn open(db: Arc<sled::Db>) -> Result<Self, StoreError> {
        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    pub fn peak(&self) -> Result<Option<ChainState>, StoreError> {
        schema::read_peak(&self.db)
    }

    pub fn get_block(&self, header_hash: &Hash256) -> Result<Option<FullBlock>, StoreError> {
        Ok(schema::read_block(&self.db, header_hash)?.map(|sb| sb.block))
    }

    pub fn get_header(&self, header_hash: &Hash256) -> Result<Option<BlockHeader>, StoreError> {
        Ok(self.get_block(header_hash)?.map(|b| b.header))
    }

    pub fn get_block_at_height(&self, height: u32) -> Result<Option<FullBlock>, StoreError> {
        match schema::read_height_index(&self.db, height)? {
            Some(hash) => self.get_block(&hash),
            None => Ok(None),
        }
    }

    pub fn get_coin_record(&self, coin_id: &Hash256) -> Result<Option<CoinRecord>, StoreError> {
        schema::read_coin_record(&self.db, coin_id)
    }

    pub fn get_coin_records_by_puzzle_hash(
        &self,
        puzzle_hash: &Hash256,
    ) -> Result<Vec<CoinRecord>, StoreError> {
        schema::read_coin_records_by_puzzle_hash(&self.db, puzzle_hash)
    }

    /// Header hashes for `[start_height, end_height)`, ascending.
    pub fn headers_between(
        &self,
        start_height: u32,
        end_height: u32,
    ) -> Result<Vec<BlockHeader>, StoreError> {
        let mut out = Vec::new();
        for h in start_height..end_height {
            if let Some(block) = self.get_block_at_height(h)? {
                out.push(block.header);
            }
        }
        Ok(out)
    }

    pub fn get_sub_epoch_summary(
        &self,
        height: u32,
    ) -> Result<Option<crate::block::header::SubEpochSummary>, StoreError> {
        schema::read_sub_epoch_summary(&self.db, height)
    }

    /// Assembles a weight proof from every sub-epoch summary recorded so
    /// far, one sampled header per summary (spec §4.4's long-sync path).
    pub fn build_weight_proof(
        &self,
        constants: &NetworkConstants,
    ) -> Result<crate::weight_proof::WeightProof, StoreError> {
        let mut summaries = Vec::new();
        let mut sampled_headers = Vec::new();
        if let Some(peak) = self.peak()? {
            let mut height = constants.sub_epoch_blocks;
            while height <= peak.peak_height {
                if let Some(summary) = self.get_sub_epoch_summary(height)? {
                    if let Some(block) = self.get_block_at_height(height)? {
                        sampled_headers.push(block.header);
                    }
                    summaries.push(summary);
                }
                height += constants.sub_epoch_blocks;
            }
        }
        Ok(crate::weight_proof::build_weight_proof(summaries, sampled_headers))
    }

    /// Validates and attempts to admit `block`, applying fork choice and
    /// reorg as needed (spec §4.2, §4.1).
    #[allow(clippy::too_many_arguments)]
    pub async fn add_block(
        &self,
        block: FullBlock,
        clock: Arc<dyn WallClock>,
        constants: NetworkConstants,
        pos_verifier: Arc<dyn PoSpaceVerifier>,
        vdf_verifier: Arc<dyn VdfVerifier>,
        runner: Arc<dyn BlockProgramRunner>,
    ) -> Result<AddResult, StoreError> {
        let _guard = self.write_lock.lock().await;
        let db = self.db.clone();

        tokio::task::spawn_blocking(move || {
            let header_hash = block.header.header_hash();

            if schema::read_block(&db, &header_hash)?.is_some() {
                return Ok(AddResult::AlreadyHave);
            }
            if block.header.height != 0 && schema::read_block(&db, &block.header.prev_header_hash)?.is_none() {
                return Ok(AddResult::Disconnected);
            }

            let ctx = SledContext { db: &db };
            let derived = match validator::validate(
                &block,
                &ctx,
                clock.as_ref(),
                &constants,
                pos_verifier.as_ref(),
                vdf_verifier.as_ref(),
                runner.as_ref(),
            ) {
                Ok(derived) => derived,
                Err(e) => return Ok(AddResult::Invalid(e)),
            };

            let diff = BlockDiff {
                new_coin_records: derived.new_coin_records.clone(),
                spent_coin_ids: derived.spent_coin_ids.clone(),
            };
            schema::write_block(&db, &header_hash, &block, &diff)?;

            // Validation already confirmed any claimed difficulty change at
            // a sub-epoch boundary is correct; persist it so weight proofs
            // (spec §4.4) can be assembled without re-walking every header.
            if block.header.height != 0 && block.header.height % constants.sub_epoch_blocks == 0 {
                if let Some(sub_slot) = &block.header.end_of_sub_slot {
                    let prev_summary_height = block.header.height - constants.sub_epoch_blocks;
                    let prev_sub_epoch_hash = if prev_summary_height == 0 {
                        [0u8; 32]
                    } else {
                        schema::read_sub_epoch_summary(&db, prev_summary_height)?
                            .map(|s| s.hash())
                            .unwrap_or([0u8; 32])
                    };
                    let summary = crate::block::header::SubEpochSummary {
                        prev_sub_epoch_hash,
                        reward_chain_hash: hash_bytes(&block.header.reward_chain_ip_vdf.output),
                        height: block.header.height,
                        weight: block.header.weight,
                        new_sub_slot_iters: Some(sub_slot.sub_slot_iters),
                        new_difficulty: sub_slot.new_difficulty,
                    };
                    schema::write_sub_epoch_summary(&db, block.header.height, &summary)?;
                }
            }

            let current_peak = schema::read_peak(&db)?;
            let should_become_peak = match &current_peak {
                None => true,
                Some(peak) => fork_choice_prefers_new(&block.header, peak),
            };

            if !should_become_peak {
                return Ok(AddResult::AddedAsOrphan);
            }

            if current_peak
                .as_ref()
                .map(|p| p.peak_header_hash == block.header.prev_header_hash)
                .unwrap_or(block.header.height == 0)
            {
                schema::apply_diff(&db, &block.header, &diff)?;
            } else {
                reorg::reorganize(&db, &block.header)?;
            }

            schema::write_peak(&db, &derived.chain_state)?;
            info!(height = block.header.height, "new peak");
            Ok(AddResult::NewPeak(derived.chain_state))
        })
        .await
        .map_err(|e| StoreError::Corruption(format!("add_block task panicked: {e}")))?
    }

    /// Rolls the peak back to `target_height`, undoing every block above it
    /// (spec §4.2). Refuses to roll back more than `MAX_REORG_DEPTH` below
    /// the current peak.
    pub async fn rollback_to(&self, target_height: u32) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || reorg::rollback_to(&db, target_height))
            .await
            .map_err(|e| StoreError::Corruption(format!("rollback task panicked: {e}")))?
    }
}

fn fork_choice_prefers_new(new_header: &BlockHeader, current_peak: &ChainState) -> bool {
    match new_header.weight.cmp(&current_peak.peak_weight) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        // Deterministic tie-break: lexicographically smaller header hash
        // wins (spec §3/§9 open question, resolved in DESIGN.md).
        std::cmp::Ordering::Equal => {
            let new_hash = new_header.header_hash();
            if new_hash == current_peak.peak_header_hash {
                warn!("fork choice compared a header against itself");
                false
            } else {
                new_hash < current_peak.peak_header_hash
            }
        }
    }
}

struct SledContext<'a> {
    db: &'a sled::Db,
}

impl<'a> BlockContext for SledContext<'a> {
    fn get_header(&self, header_hash: &Hash256) -> Option<BlockHeader> {
        schema::read_block(self.db, header_hash)
            .ok()
            .flatten()
            .map(|sb| sb.block.header)
    }

    fn get_coin_record(&self, coin_id: &Hash256) -> Option<CoinRecord> {
        schema::read_coin_record(self.db, coin_id).ok().flatten()
    }
}

/// Lets callers outside this module (the mempool's bundle admission path)
/// use the store directly as a `BlockContext`, without reaching into
/// `sled` themselves.
impl BlockContext for BlockchainStore {
    fn get_header(&self, header_hash: &Hash256) -> Option<BlockHeader> {
        self.get_header(header_hash).ok().flatten()
    }

    fn get_coin_record(&self, coin_id: &Hash256) -> Option<CoinRecord> {
        self.get_coin_record(coin_id).ok().flatten()
    }
}
