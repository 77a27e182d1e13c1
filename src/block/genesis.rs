//! Genesis block construction: the height-0 block every chain of a given
//! network starts from, built entirely from that network's constants so
//! every node computes byte-identical genesis (spec §8 scenario 1).

use crate::block::header::{
    BlockHeader, Foliage, FoliageTransactionBlock, FullBlock, ProofOfSpace, VdfInfo,
};
use crate::block::validator::reward_coin_for;
use crate::network_type::NetworkConstants;
use ed25519_dalek::SigningKey;

/// Builds the network's genesis block. Deterministic: every field derives
/// from `constants`, including a farmer keypair seeded from the genesis
/// challenge rather than drawn from `rand`, so independently-run nodes
/// agree on the genesis header hash without exchanging anything.
pub fn build_genesis_block(constants: &NetworkConstants) -> FullBlock {
    let seed = constants.genesis_challenge;
    let signing_key = SigningKey::from_bytes(&seed);
    let plot_public_key = signing_key.verifying_key();

    let proof_of_space = ProofOfSpace {
        challenge: constants.genesis_challenge,
        pool_public_key: None,
        plot_public_key,
        size: 32,
        proof: constants.genesis_challenge.to_vec(),
    };

    let genesis_vdf = VdfInfo {
        challenge: constants.genesis_challenge,
        number_of_iterations: 1,
        output: vec![0u8; 32],
    };

    let foliage_transaction_block = FoliageTransactionBlock {
        prev_transaction_block_hash: [0u8; 32],
        timestamp: constants.genesis_timestamp,
        removals_root: crate::block::validator::coin_list_root(&[]),
        additions_root: crate::block::validator::coin_list_root(&[]),
        reward_claims: vec![reward_coin_for([0u8; 32], 0)],
        generator_cost_limit: 0,
    };

    let mut signing_content = Vec::new();
    {
        use crate::codec::ToBytes;
        [0u8; 32].to_bytes(&mut signing_content);
        foliage_transaction_block.to_bytes(&mut signing_content);
    }
    let farmer_signature = signing_key.sign(&signing_content);

    let foliage = Foliage {
        prev_block_hash: [0u8; 32],
        foliage_transaction_block: Some(foliage_transaction_block),
        farmer_signature,
    };

    let header = BlockHeader {
        prev_header_hash: [0u8; 32],
        height: 0,
        weight: 0,
        total_iters: 0,
        signage_point_index: 0,
        proof_of_space,
        challenge_chain_sp_vdf: None,
        challenge_chain_sp_signature: signing_key.sign(&constants.genesis_challenge),
        challenge_chain_ip_vdf: genesis_vdf.clone(),
        reward_chain_sp_vdf: None,
        reward_chain_sp_signature: signing_key.sign(&constants.genesis_challenge),
        reward_chain_ip_vdf: genesis_vdf,
        foliage,
        end_of_sub_slot: None,
        timestamp: constants.genesis_timestamp,
    };

    FullBlock {
        header,
        generator: None,
        generator_args: Vec::new(),
        aggregated_signature: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network_type::NetworkType;

    #[test]
    fn genesis_is_deterministic() {
        let c = NetworkType::Testnet.constants();
        let a = build_genesis_block(&c);
        let b = build_genesis_block(&c);
        assert_eq!(a.header.header_hash(), b.header.header_hash());
    }

    #[test]
    fn mainnet_and_testnet_genesis_differ() {
        let a = build_genesis_block(&NetworkType::Mainnet.constants());
        let b = build_genesis_block(&NetworkType::Testnet.constants());
        assert_ne!(a.header.header_hash(), b.header.header_hash());
    }

    #[test]
    fn genesis_has_height_zero_and_no_parent() {
        let c = NetworkType::Testnet.constants();
        let g = build_genesis_block(&c);
        assert_eq!(g.header.height, 0);
        assert_eq!(g.header.prev_header_hash, [0u8; 32]);
    }
}
