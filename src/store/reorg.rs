//! Reorg: find the least common ancestor between the current peak and an
//! incoming block's chain, undo the peak's chain down to that ancestor,
//! then replay the incoming chain's blocks up to it (spec §4.2). Bounded by
//! `MAX_FORK_SEARCH_DEPTH`/`MAX_REORG_DEPTH` so a malicious deep fork can't
//! make a node walk or rewrite unbounded history.

use super::schema;
use crate::block::header::BlockHeader;
use crate::constants::blockchain::{MAX_FORK_SEARCH_DEPTH, MAX_REORG_DEPTH};
use crate::error::StoreError;

pub fn reorganize(db: &sled::Db, new_tip: &BlockHeader) -> Result<(), StoreError> {
    let peak = schema::read_peak(db)?.ok_or_else(|| {
        StoreError::Corruption("reorg attempted with no existing peak".to_string())
    })?;

    if peak.peak_height.saturating_sub(new_tip.height) > MAX_REORG_DEPTH {
        return Err(StoreError::NotAnAncestor);
    }

    // Walk both chains back to equal height, then together until hashes
    // match, bounded by MAX_FORK_SEARCH_DEPTH.
    let mut old_chain = Vec::new();
    let mut old_cursor = schema::read_header(db, &peak.peak_header_hash)?
        .ok_or_else(|| StoreError::Corruption("peak header missing from store".to_string()))?;
    let mut new_chain = vec![new_tip.clone()];
    let mut new_cursor = new_tip.clone();

    let mut steps = 0u32;
    while old_cursor.height > new_cursor.height {
        old_chain.push(old_cursor.clone());
        old_cursor = ancestor(db, &old_cursor)?;
        steps += 1;
        if steps > MAX_FORK_SEARCH_DEPTH {
            return Err(StoreError::NotAnAncestor);
        }
    }
    while new_cursor.height > old_cursor.height {
        new_cursor = ancestor(db, &new_cursor)?;
        new_chain.push(new_cursor.clone());
        steps += 1;
        if steps > MAX_FORK_SEARCH_DEPTH {
            return Err(StoreError::NotAnAncestor);
        }
    }
    while old_cursor.header_hash() != new_cursor.header_hash() {
        old_chain.push(old_cursor.clone());
        old_cursor = ancestor(db, &old_cursor)?;
        new_chain.push(new_cursor.clone());
        new_cursor = ancestor(db, &new_cursor)?;
        steps += 1;
        if steps > MAX_FORK_SEARCH_DEPTH {
            return Err(StoreError::NotAnAncestor);
        }
    }

    // Undo the old chain from tip down to (exclusive of) the ancestor.
    for header in &old_chain {
        let diff = schema::read_diff(db, &header.header_hash())?
            .ok_or_else(|| StoreError::Corruption("missing diff for stored block".to_string()))?;
        schema::undo_diff(db, header, &diff)?;
    }

    // Replay the new chain from (exclusive of) the ancestor up to the tip.
    for header in new_chain.iter().rev() {
        let diff = schema::read_diff(db, &header.header_hash())?
            .ok_or_else(|| StoreError::Corruption("missing diff for stored block".to_string()))?;
        schema::apply_diff(db, header, &diff)?;
    }

    Ok(())
}

fn ancestor(db: &sled::Db, header: &BlockHeader) -> Result<BlockHeader, StoreError> {
    schema::read_header(db, &header.prev_header_hash)?
        .ok_or_else(|| StoreError::Corruption("ancestor header missing from store".to_string()))
}

/// Rolls the peak back to `target_height` by undoing every block above it,
/// without replaying an alternate chain (used for manual recovery / tests,
/// not the normal reorg path).
pub fn rollback_to(db: &sled::Db, target_height: u32) -> Result<(), StoreError> {
    let peak = schema::read_peak(db)?.ok_or_else(|| {
        StoreError::Corruption("rollback attempted with no existing peak".to_string())
    })?;
    if target_height > peak.peak_height {
        return Err(StoreError::NotAnAncestor);
    }
    if peak.peak_height - target_height > MAX_REORG_DEPTH {
        return Err(StoreError::NotAnAncestor);
    }

    let mut cursor = schema::read_header(db, &peak.peak_header_hash)?
        .ok_or_else(|| StoreError::Corruption("peak header missing from store".to_string()))?;
    while cursor.height > target_height {
        let diff = schema::read_diff(db, &cursor.header_hash())?
            .ok_or_else(|| StoreError::Corruption("missing diff for stored block".to_string()))?;
        schema::undo_diff(db, &cursor, &diff)?;
        cursor = ancestor(db, &cursor)?;
    }

    schema::write_peak(
        db,
        &crate::block::header::ChainState {
            peak_header_hash: cursor.header_hash(),
            peak_height: cursor.height,
            peak_weight: cursor.weight,
            peak_total_iters: cursor.total_iters,
        },
    )
}
