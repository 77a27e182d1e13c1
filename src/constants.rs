//! Protocol constants that are not per-network (see `network_type::NetworkConstants`
//! for the ones that differ between mainnet and testnet) and are not config
//! knobs (see `config::Config` for the ones an operator can tune).

pub mod blockchain {
    /// Target time between signage points within a sub-slot, seconds.
    pub const SUB_SLOT_TIME_TARGET_SECS: u64 = 600;

    /// Signage points per sub-slot.
    pub const SIGNAGE_POINTS_PER_SUB_SLOT: u32 = 64;

    /// Maximum serialized block size in bytes.
    pub const MAX_BLOCK_SIZE: usize = 2_000_000;

    /// Maximum cost a block's spend bundles may charge (spec §4.1 step 7).
    pub const MAX_BLOCK_COST: u64 = 11_000_000_000;

    /// Allowed clock drift for a block's declared timestamp, spec §4.1 step 6.
    pub const TIMESTAMP_TOLERANCE_SECS: i64 = 60;

    /// Blocks deeper than this below the peak are final; the store refuses
    /// to roll back past this depth (spec §4.2).
    pub const MAX_REORG_DEPTH: u32 = 100;

    /// Maximum depth searched for a least-common-ancestor during reorg.
    pub const MAX_FORK_SEARCH_DEPTH: u32 = 2_000;

    /// Number of recent full blocks the store keeps warm in its header cache.
    pub const BLOCK_CACHE_SIZE: usize = 100;
}

pub mod network {
    /// Interval between keepalive pings to a connected peer.
    pub const PING_INTERVAL_SECS: u64 = 30;

    /// Timeout waiting for a pong before counting it as missed.
    pub const PONG_TIMEOUT_SECS: u64 = 90;

    /// Missed pongs before a peer is disconnected.
    pub const MAX_MISSED_PONGS: u32 = 3;

    /// Invalid blocks from a peer before it is banned (spec §4.5).
    pub const MAX_INVALID_BLOCKS: u32 = 5;

    /// Headers requested per batch during long sync.
    pub const SYNC_BATCH_SIZE: u32 = 100;

    /// Concurrent in-flight batch requests during long sync.
    pub const SYNC_PIPELINE_DEPTH: usize = 3;

    /// Hard cap on a single wire frame's payload, independent of the codec's
    /// own per-value length limit.
    pub const MAX_FRAME_SIZE: usize = 2 * 1024 * 1024;

    /// Distinct unfinished-block foliage variants forwarded per reward hash
    /// before the gossip forwarder starts dropping duplicates (spec §4.7).
    pub const MAX_DUPLICATE_UNFINISHED_BLOCKS: usize = 3;

    /// Per-peer LRU size for the gossip de-duplication filter.
    pub const GOSSIP_DEDUP_CACHE_SIZE: usize = 2_000;
}

pub mod performance {
    /// Database writes batched together per `sled` transaction during block
    /// commit and rollback.
    pub const DB_BATCH_SIZE: usize = 100;
}
