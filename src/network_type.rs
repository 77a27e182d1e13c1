//! Network identity: which chain a node is talking to, and the constants
//! that chain's consensus rules are parameterised by.

use crate::types::Hash256;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, Copy, PartialEq, Eq, Hash)]
pub enum NetworkType {
    Mainnet,
    Testnet,
}

impl NetworkType {
    pub fn magic_bytes(&self) -> [u8; 4] {
        match self {
            NetworkType::Mainnet => [0x53, 0x54, 0x4d, 0x01], // "STM" + version
            NetworkType::Testnet => [0x53, 0x54, 0x4d, 0xff],
        }
    }

    pub fn default_p2p_port(&self) -> u16 {
        match self {
            NetworkType::Mainnet => 28444,
            NetworkType::Testnet => 28544,
        }
    }

    /// Per-network consensus constants, loaded once alongside `Config` (see
    /// SPEC_FULL.md's block-and-coin-model supplement).
    pub fn constants(&self) -> NetworkConstants {
        match self {
            NetworkType::Mainnet => NetworkConstants {
                genesis_challenge: [0x00; 32],
                agg_sig_me_additional_data: *b"spacetime-mainnet-agg-sig-me-00",
                difficulty_constant_factor: 10_052_721_566_054,
                sub_epoch_blocks: 384,
                epoch_sub_epochs: 32,
                hard_fork_height: u32::MAX,
                plot_filter_height_thresholds: [0, 10_542_000, 15_592_000, 20_643_000],
                genesis_timestamp: 1_767_225_600,
                initial_difficulty: 50_000,
                initial_sub_slot_iters: 5_000_000,
            },
            NetworkType::Testnet => NetworkConstants {
                genesis_challenge: [0xff; 32],
                agg_sig_me_additional_data: *b"spacetime-testnet-agg-sig-me-00",
                difficulty_constant_factor: 1_000_000,
                sub_epoch_blocks: 96,
                epoch_sub_epochs: 8,
                hard_fork_height: 0,
                plot_filter_height_thresholds: [0, 0, 0, 0],
                genesis_timestamp: 1_764_547_200,
                initial_difficulty: 1000,
                initial_sub_slot_iters: 100_000,
            },
        }
    }
}

impl std::fmt::Display for NetworkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkType::Mainnet => write!(f, "mainnet"),
            NetworkType::Testnet => write!(f, "testnet"),
        }
    }
}

/// Consensus parameters a validator, difficulty adjuster, and weight-proof
/// verifier all need and which differ between mainnet and testnet.
#[derive(Clone, Debug)]
pub struct NetworkConstants {
    pub genesis_challenge: Hash256,
    pub agg_sig_me_additional_data: [u8; 31],
    pub difficulty_constant_factor: u64,
    pub sub_epoch_blocks: u32,
    pub epoch_sub_epochs: u32,
    pub hard_fork_height: u32,
    pub plot_filter_height_thresholds: [u32; 4],
    pub genesis_timestamp: u64,
    /// Difficulty and `sub_slot_iters` a chain starts at before its first
    /// sub-epoch adjustment (spec §4.1 step 8).
    pub initial_difficulty: u64,
    pub initial_sub_slot_iters: u64,
}

impl NetworkConstants {
    pub fn epoch_blocks(&self) -> u32 {
        self.sub_epoch_blocks * self.epoch_sub_epochs
    }
}
