//! Error taxonomy: one `thiserror` enum per subsystem, converging into
//! `AppError` at the top. Only `StoreError::Corruption` and a handful of
//! programmer-invariant violations are fatal (spec §7); everything else
//! propagates to the caller as a `Result` and is logged, not a process exit.

use thiserror::Error;

use crate::codec::CodecError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("mempool error: {0}")]
    Mempool(#[from] MempoolError),

    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("peer error: {0}")]
    Peer(#[from] PeerError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("initialization error: {0}")]
    Initialization(String),
}

/// Errors out of the blockchain store (`crate::store`).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("block not found: {0}")]
    BlockNotFound(String),

    #[error("coin record not found: {0}")]
    CoinRecordNotFound(String),

    #[error("requested rollback target is not an ancestor of the current peak")]
    NotAnAncestor,

    #[error("store is corrupted: {0}")]
    Corruption(String),
}

/// Errors from `crate::validator::validate` (spec §4.1).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("bad proof of space: {0}")]
    BadProofOfSpace(String),

    #[error("bad proof of time: {0}")]
    BadProofOfTime(String),

    #[error("header links to unknown previous block {0:?}")]
    UnknownPrevBlock([u8; 32]),

    #[error("block timestamp {block_timestamp} outside the allowed window around {local_time}")]
    BadTimestamp {
        block_timestamp: u64,
        local_time: u64,
    },

    #[error("weight {found} does not match expected {expected}")]
    BadWeight { found: u128, expected: u128 },

    #[error("coin {0:?} spent twice within this block")]
    DoubleSpendWithinBlock([u8; 32]),

    #[error("coin {0:?} does not exist or is already spent")]
    UnknownOrSpentCoin([u8; 32]),

    #[error("puzzle reveal does not hash to the coin's puzzle_hash")]
    PuzzleHashMismatch,

    #[error("aggregate signature failed to verify")]
    BadAggregateSignature,

    #[error("block program evaluation failed: {0}")]
    ProgramError(String),

    #[error("block cost {cost} exceeds the limit {limit}")]
    CostExceeded { cost: u64, limit: u64 },

    #[error("arithmetic overflow while summing coin amounts")]
    Arithmetic,

    #[error("difficulty/sub_slot_iters {found:?} does not match recomputed {expected:?}")]
    BadDifficulty {
        found: (u64, u64),
        expected: (u64, u64),
    },
}

/// Errors from `crate::mempool` (spec §4.3).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MempoolError {
    #[error("coin {0:?} is already spent by another mempool entry")]
    DoubleSpend([u8; 32]),

    #[error("replacement bundle's fee per cost does not exceed the existing entry by the required margin")]
    InsufficientFeeForReplacement,

    #[error("bundle {0:?} already present in the mempool")]
    AlreadyInMempool([u8; 32]),

    #[error("bundle spends no coins")]
    EmptyBundle,

    #[error("bundle {0:?} was admitted but immediately evicted at capacity by lower-fee competition")]
    RejectedAtCapacity([u8; 32]),
}

/// Errors from `crate::network::sync` (spec §4.4).
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("no peer reached quorum within max_sync_wait")]
    PeakQuorumTimeout,

    #[error("weight proof failed verification: {0}")]
    BadWeightProof(String),

    #[error("weight proof request to peer timed out")]
    WeightProofTimeout,

    #[error("short sync could not find a common ancestor within the backtrack limit")]
    NoCommonAncestor,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from `crate::network::peer` / `crate::peer_manager` (spec §4.5).
#[derive(Error, Debug)]
pub enum PeerError {
    #[error("peer sent a frame exceeding the maximum frame size")]
    FrameTooLarge,

    #[error("peer handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("peer exceeded its rate limit for message type {0}")]
    RateLimited(String),

    #[error("peer is banned")]
    Banned,

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
