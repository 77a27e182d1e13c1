//! Configuration: loaded once at startup into an immutable value and passed
//! to every service behind an `Arc` (see `AppError::Config` callers in
//! `main.rs`). No global mutable config — every long-running task reads its
//! own clone of the fields it needs.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::network_type::NetworkType;

/// Platform-specific data directory, `~/.spacetimed` (or `%APPDATA%\spacetimed`).
pub fn get_data_dir() -> PathBuf {
    if cfg!(windows) {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("spacetimed")
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".spacetimed")
    }
}

pub fn get_network_data_dir(network: &NetworkType) -> PathBuf {
    let base = get_data_dir();
    match network {
        NetworkType::Mainnet => base,
        NetworkType::Testnet => base.join("testnet"),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub node: NodeConfig,
    pub network: NetworkConfig,
    pub sync: SyncConfig,
    pub mempool: MempoolConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    #[serde(default = "default_network")]
    pub network: String,
}

impl NodeConfig {
    pub fn network_type(&self) -> NetworkType {
        match self.network.as_str() {
            "mainnet" => NetworkType::Mainnet,
            _ => NetworkType::Testnet,
        }
    }
}

fn default_network() -> String {
    "testnet".to_string()
}

/// Peer protocol and topology, spec §4.5/§6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub listen_address: String,
    pub external_address: Option<String>,
    #[serde(default = "default_target_peer_count")]
    pub target_peer_count: usize,
    #[serde(default = "default_target_outbound_peer_count")]
    pub target_outbound_peer_count: usize,
    #[serde(default = "default_peer_connect_timeout_secs")]
    pub peer_connect_timeout_secs: u64,
    pub bootstrap_peers: Vec<String>,
    pub blacklisted_peers: Vec<String>,
    #[serde(default)]
    pub enable_peer_discovery: bool,
    /// Percentage (0-100) of each message-type's fixed per-peer rate budget
    /// granted to inbound traffic; the remainder covers outbound.
    #[serde(default = "default_rate_limit_percent")]
    pub inbound_rate_limit_percent: u8,
    #[serde(default = "default_rate_limit_percent")]
    pub outbound_rate_limit_percent: u8,
}

fn default_target_peer_count() -> usize {
    40
}

fn default_target_outbound_peer_count() -> usize {
    8
}

fn default_peer_connect_timeout_secs() -> u64 {
    30
}

fn default_rate_limit_percent() -> u8 {
    100
}

impl NetworkConfig {
    pub fn full_listen_address(&self, network_type: &NetworkType) -> String {
        if self.listen_address.contains(':') {
            self.listen_address.clone()
        } else {
            format!("{}:{}", self.listen_address, network_type.default_p2p_port())
        }
    }
}

/// Sync engine thresholds, spec §4.4/§6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_sync_blocks_behind_threshold")]
    pub sync_blocks_behind_threshold: u32,
    #[serde(default = "default_short_sync_blocks_behind_threshold")]
    pub short_sync_blocks_behind_threshold: u32,
    #[serde(default = "default_max_sync_wait_secs")]
    pub max_sync_wait_secs: u64,
    #[serde(default = "default_weight_proof_timeout_secs")]
    pub weight_proof_timeout_secs: u64,
    /// Off by default: delta-sync is an optimisation, not a correctness
    /// requirement, and is not silently enabled (see DESIGN.md).
    #[serde(default)]
    pub use_delta_sync: bool,
    #[serde(default)]
    pub sanitize_weight_proof_only: bool,
}

fn default_sync_blocks_behind_threshold() -> u32 {
    1000
}

fn default_short_sync_blocks_behind_threshold() -> u32 {
    20
}

fn default_max_sync_wait_secs() -> u64 {
    30
}

fn default_weight_proof_timeout_secs() -> u64 {
    60
}

/// Mempool capacity and replace-by-fee, spec §4.3/§6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MempoolConfig {
    #[serde(default = "default_mempool_max_total_cost")]
    pub max_total_cost: u64,
    #[serde(default = "default_mempool_max_size_bytes")]
    pub max_size_bytes: u64,
    #[serde(default = "default_rbf_fee_margin_percent")]
    pub rbf_fee_margin_percent: u32,
}

fn default_mempool_max_total_cost() -> u64 {
    11_000_000_000
}

fn default_mempool_max_size_bytes() -> u64 {
    100 * 1024 * 1024
}

fn default_rbf_fee_margin_percent() -> u32 {
    10
}

/// Blockchain store and subscription-service limits, spec §4.2/§4.6/§6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    #[serde(default = "default_cache_size_mb")]
    pub cache_size_mb: usize,
    #[serde(default = "default_true")]
    pub compress_blocks: bool,
    #[serde(default = "default_true")]
    pub db_sync: bool,
    #[serde(default = "default_max_subscribe_items")]
    pub max_subscribe_items: usize,
    #[serde(default = "default_trusted_max_subscribe_items")]
    pub trusted_max_subscribe_items: usize,
    #[serde(default = "default_max_subscribe_response_items")]
    pub max_subscribe_response_items: usize,
}

fn default_cache_size_mb() -> usize {
    256
}

fn default_max_subscribe_items() -> usize {
    200_000
}

fn default_trusted_max_subscribe_items() -> usize {
    2_000_000
}

fn default_max_subscribe_response_items() -> usize {
    100_000
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Config {
    pub fn get_data_directory(network: &NetworkType) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let data_dir = get_network_data_dir(network);
        fs::create_dir_all(&data_dir)?;
        Ok(data_dir)
    }

    pub fn load_from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self {
            node: NodeConfig {
                name: "spacetimed".to_string(),
                network: "testnet".to_string(),
            },
            network: NetworkConfig {
                listen_address: "0.0.0.0".to_string(),
                external_address: None,
                target_peer_count: default_target_peer_count(),
                target_outbound_peer_count: default_target_outbound_peer_count(),
                peer_connect_timeout_secs: default_peer_connect_timeout_secs(),
                bootstrap_peers: vec![],
                blacklisted_peers: vec![],
                enable_peer_discovery: true,
                inbound_rate_limit_percent: default_rate_limit_percent(),
                outbound_rate_limit_percent: default_rate_limit_percent(),
            },
            sync: SyncConfig {
                sync_blocks_behind_threshold: default_sync_blocks_behind_threshold(),
                short_sync_blocks_behind_threshold: default_short_sync_blocks_behind_threshold(),
                max_sync_wait_secs: default_max_sync_wait_secs(),
                weight_proof_timeout_secs: default_weight_proof_timeout_secs(),
                use_delta_sync: false,
                sanitize_weight_proof_only: false,
            },
            mempool: MempoolConfig {
                max_total_cost: default_mempool_max_total_cost(),
                max_size_bytes: default_mempool_max_size_bytes(),
                rbf_fee_margin_percent: default_rbf_fee_margin_percent(),
            },
            storage: StorageConfig {
                data_dir: String::new(),
                cache_size_mb: default_cache_size_mb(),
                compress_blocks: true,
                db_sync: true,
                max_subscribe_items: default_max_subscribe_items(),
                trusted_max_subscribe_items: default_trusted_max_subscribe_items(),
                max_subscribe_response_items: default_max_subscribe_response_items(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            },
        }
    }

    pub fn load_or_create(
        path: &str,
        network_type: &NetworkType,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let data_dir = get_network_data_dir(network_type);
        fs::create_dir_all(&data_dir)?;

        if fs::metadata(path).is_ok() {
            let contents = fs::read_to_string(path)?;
            let mut config: Config = toml::from_str(&contents)?;
            if config.storage.data_dir.is_empty() || config.storage.data_dir.starts_with("./") {
                config.storage.data_dir = data_dir.to_string_lossy().to_string();
            }
            Ok(config)
        } else {
            let mut config = Config::default();
            config.node.network = match network_type {
                NetworkType::Mainnet => "mainnet".to_string(),
                NetworkType::Testnet => "testnet".to_string(),
            };
            config.storage.data_dir = data_dir.to_string_lossy().to_string();
            config.save_to_file(path)?;
            Ok(config)
        }
    }

    pub fn save_to_file(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}
