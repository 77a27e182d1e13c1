//! Sled key layout and the (de)serialization glue. Block/coin data is
//! `bincode`-encoded for storage — distinct from `crate::codec`'s
//! canonical wire/identity encoding, the same separation the teacher's
//! `storage.rs` draws between its `bincode`-serialized sled values and its
//! hand-rolled wire messages.

use crate::block::header::{BlockHeader, ChainState, FullBlock, SubEpochSummary};
use crate::error::StoreError;
use crate::types::{CoinRecord, Hash256};
use serde::{Deserialize, Serialize};

const TREE_BLOCKS: &str = "blocks";
const TREE_HEIGHT_INDEX: &str = "height_index";
const TREE_COIN_RECORDS: &str = "coin_records";
const TREE_PUZZLE_HASH_INDEX: &str = "puzzle_hash_index";
const TREE_SUB_EPOCH_SUMMARIES: &str = "sub_epoch_summaries";
const TREE_METADATA: &str = "metadata";
const KEY_PEAK: &[u8] = b"peak";

/// What `add_block` persists for a single block: the block itself and the
/// coin-record delta it produced, so a later reorg can undo it without
/// re-running the validator.
#[derive(Clone, Serialize, Deserialize)]
pub struct BlockDiff {
    pub new_coin_records: Vec<CoinRecord>,
    pub spent_coin_ids: Vec<Hash256>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct StoredBlock {
    pub block: FullBlock,
    pub diff: BlockDiff,
}

pub fn write_block(
    db: &sled::Db,
    header_hash: &Hash256,
    block: &FullBlock,
    diff: &BlockDiff,
) -> Result<(), StoreError> {
    let stored = StoredBlock {
        block: block.clone(),
        diff: diff.clone(),
    };
    let bytes = bincode::serialize(&stored)?;
    db.open_tree(TREE_BLOCKS)?.insert(header_hash, bytes)?;
    Ok(())
}

pub fn read_block(db: &sled::Db, header_hash: &Hash256) -> Result<Option<StoredBlock>, StoreError> {
    match db.open_tree(TREE_BLOCKS)?.get(header_hash)? {
        Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
        None => Ok(None),
    }
}

/// Applies a block's diff to the coin-record and height-index trees,
/// making it part of the best chain. Does not touch `peak` — callers write
/// that once the full commit (possibly spanning a reorg) is done.
pub fn apply_diff(db: &sled::Db, header: &BlockHeader, diff: &BlockDiff) -> Result<(), StoreError> {
    let coin_tree = db.open_tree(TREE_COIN_RECORDS)?;
    let puzzle_tree = db.open_tree(TREE_PUZZLE_HASH_INDEX)?;
    let height_tree = db.open_tree(TREE_HEIGHT_INDEX)?;

    for record in &diff.new_coin_records {
        let coin_id = record.coin.coin_id();
        coin_tree.insert(coin_id, bincode::serialize(record)?)?;
        puzzle_tree.insert(puzzle_hash_key(&record.coin.puzzle_hash, &coin_id), &[])?;
    }
    for coin_id in &diff.spent_coin_ids {
        if let Some(bytes) = coin_tree.get(coin_id)? {
            let mut record: CoinRecord = bincode::deserialize(&bytes)?;
            record.spent_height = header.height;
            coin_tree.insert(coin_id, bincode::serialize(&record)?)?;
        }
    }
    height_tree.insert(&header.height.to_be_bytes(), header.header_hash().to_vec())?;
    Ok(())
}

/// Inverse of `apply_diff`: used by reorg to undo a block leaving the best
/// chain.
pub fn undo_diff(db: &sled::Db, header: &BlockHeader, diff: &BlockDiff) -> Result<(), StoreError> {
    let coin_tree = db.open_tree(TREE_COIN_RECORDS)?;
    let puzzle_tree = db.open_tree(TREE_PUZZLE_HASH_INDEX)?;
    let height_tree = db.open_tree(TREE_HEIGHT_INDEX)?;

    for coin_id in &diff.spent_coin_ids {
        if let Some(bytes) = coin_tree.get(coin_id)? {
            let mut record: CoinRecord = bincode::deserialize(&bytes)?;
            record.spent_height = 0;
            coin_tree.insert(coin_id, bincode::serialize(&record)?)?;
        }
    }
    for record in &diff.new_coin_records {
        let coin_id = record.coin.coin_id();
        coin_tree.remove(&coin_id)?;
        puzzle_tree.remove(puzzle_hash_key(&record.coin.puzzle_hash, &coin_id))?;
    }
    height_tree.remove(&header.height.to_be_bytes())?;
    Ok(())
}

fn puzzle_hash_key(puzzle_hash: &Hash256, coin_id: &Hash256) -> Vec<u8> {
    let mut key = Vec::with_capacity(64);
    key.extend_from_slice(puzzle_hash);
    key.extend_from_slice(coin_id);
    key
}

pub fn read_height_index(db: &sled::Db, height: u32) -> Result<Option<Hash256>, StoreError> {
    match db.open_tree(TREE_HEIGHT_INDEX)?.get(height.to_be_bytes())? {
        Some(bytes) => {
            let mut hash = [0u8; 32];
            hash.copy_from_slice(&bytes);
            Ok(Some(hash))
        }
        None => Ok(None),
    }
}

pub fn read_coin_record(db: &sled::Db, coin_id: &Hash256) -> Result<Option<CoinRecord>, StoreError> {
    match db.open_tree(TREE_COIN_RECORDS)?.get(coin_id)? {
        Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
        None => Ok(None),
    }
}

pub fn read_coin_records_by_puzzle_hash(
    db: &sled::Db,
    puzzle_hash: &Hash256,
) -> Result<Vec<CoinRecord>, StoreError> {
    let puzzle_tree = db.open_tree(TREE_PUZZLE_HASH_INDEX)?;
    let coin_tree = db.open_tree(TREE_COIN_RECORDS)?;
    let mut out = Vec::new();
    for entry in puzzle_tree.scan_prefix(puzzle_hash) {
        let (key, _) = entry?;
        let coin_id = &key[32..64];
        if let Some(bytes) = coin_tree.get(coin_id)? {
            out.push(bincode::deserialize::<CoinRecord>(&bytes)?);
        }
    }
    Ok(out)
}

pub fn read_peak(db: &sled::Db) -> Result<Option<ChainState>, StoreError> {
    #[derive(Serialize, Deserialize)]
    struct Peak {
        peak_header_hash: Hash256,
        peak_height: u32,
        peak_weight: u128,
        peak_total_iters: u128,
    }
    match db.open_tree(TREE_METADATA)?.get(KEY_PEAK)? {
        Some(bytes) => {
            let p: Peak = bincode::deserialize(&bytes)?;
            Ok(Some(ChainState {
                peak_header_hash: p.peak_header_hash,
                peak_height: p.peak_height,
                peak_weight: p.peak_weight,
                peak_total_iters: p.peak_total_iters,
            }))
        }
        None => Ok(None),
    }
}

pub fn write_peak(db: &sled::Db, state: &ChainState) -> Result<(), StoreError> {
    #[derive(Serialize, Deserialize)]
    struct Peak {
        peak_header_hash: Hash256,
        peak_height: u32,
        peak_weight: u128,
        peak_total_iters: u128,
    }
    let p = Peak {
        peak_header_hash: state.peak_header_hash,
        peak_height: state.peak_height,
        peak_weight: state.peak_weight,
        peak_total_iters: state.peak_total_iters,
    };
    db.open_tree(TREE_METADATA)?
        .insert(KEY_PEAK, bincode::serialize(&p)?)?;
    Ok(())
}

pub fn read_sub_epoch_summary(
    db: &sled::Db,
    height: u32,
) -> Result<Option<SubEpochSummary>, StoreError> {
    match db
        .open_tree(TREE_SUB_EPOCH_SUMMARIES)?
        .get(height.to_be_bytes())?
    {
        Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
        None => Ok(None),
    }
}

pub fn write_sub_epoch_summary(
    db: &sled::Db,
    height: u32,
    summary: &SubEpochSummary,
) -> Result<(), StoreError> {
    db.open_tree(TREE_SUB_EPOCH_SUMMARIES)?
        .insert(height.to_be_bytes(), bincode::serialize(summary)?)?;
    Ok(())
}

// Re-exported so `reorg.rs` can walk ancestors without importing `schema`
// function-by-function.
pub(super) fn read_header(db: &sled::Db, header_hash: &Hash256) -> Result<Option<BlockHeader>, StoreError> {
    Ok(read_block(db, header_hash)?.map(|sb| sb.block.header))
}

pub(super) fn read_diff(db: &sled::Db, header_hash: &Hash256) -> Result<Option<BlockDiff>, StoreError> {
    Ok(read_block(db, header_hash)?.map(|sb| sb.diff))
}
