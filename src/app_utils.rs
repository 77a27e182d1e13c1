use crate::error::{AppError, StoreError};
use tracing::{error, info};

/// Cache size heuristic: a fixed fraction of a conservative default rather
/// than probing system memory (the teacher's `sysinfo`-based probe pulls in
/// a dependency this workspace doesn't otherwise need; `Config::storage`'s
/// `cache_size_mb` lets an operator override this directly anyway).
pub fn calculate_cache_size(configured_mb: usize) -> u64 {
    let cache_bytes = (configured_mb as u64) * 1024 * 1024;
    info!(cache_mb = configured_mb, "configured sled cache");
    cache_bytes
}

/// Opens a sled database with the store's standard tuning.
pub fn open_database(base_path: &str, name: &str, cache_size: u64) -> Result<sled::Db, AppError> {
    let path = format!("{}/{}", base_path, name);

    sled::Config::new()
        .path(&path)
        .cache_capacity(cache_size)
        .mode(sled::Mode::HighThroughput)
        .open()
        .map_err(|e| {
            error!(database = name, path = &path, "failed to open database");
            AppError::Store(StoreError::Sled(e))
        })
}

/// Extracts the host part of a `host:port` address string.
pub fn extract_ip(address: &str) -> &str {
    address.split(':').next().unwrap_or(address)
}
