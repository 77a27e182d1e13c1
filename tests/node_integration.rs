//! End-to-end coverage of the pieces a single node actually drives together:
//! committing genesis, extending the chain, reorganizing onto a heavier
//! fork, rejecting a disconnected block, and mempool interaction with a
//! newly confirmed block.

use ed25519_dalek::SigningKey;
use spacetimed::app_utils;
use spacetimed::block::genesis::build_genesis_block;
use spacetimed::block::header::{
    BlockHeader, Foliage, FoliageTransactionBlock, FullBlock, ProofOfSpace, VdfInfo,
};
use spacetimed::block::proof_of_space::{self, StructuralPoSpaceVerifier};
use spacetimed::block::validator::{coin_list_root, reward_coin_for};
use spacetimed::block::vdf::StructuralVdfVerifier;
use spacetimed::mempool::Mempool;
use spacetimed::network_type::{NetworkConstants, NetworkType};
use spacetimed::script::CostOnlyProgramRunner;
use spacetimed::store::{AddResult, BlockchainStore};
use spacetimed::time_sync::{FixedClock, WallClock};
use spacetimed::types::{Coin, CoinSpend, SpendBundle};
use std::sync::Arc;

fn find_passing_farmer(constants: &NetworkConstants, height: u32) -> SigningKey {
    for i in 0u8..=255 {
        let signing_key = SigningKey::from_bytes(&[i; 32]);
        let plot_public_key = signing_key.verifying_key();
        if proof_of_space::passes_plot_filter(
            &plot_public_key,
            &constants.genesis_challenge,
            height,
            constants,
        ) {
            return signing_key;
        }
    }
    panic!("no farmer seed passes the plot filter at height {height}");
}

fn extend(parent: &BlockHeader, constants: &NetworkConstants, timestamp: u64, iters: u64) -> FullBlock {
    let signing_key = find_passing_farmer(constants, parent.height + 1);
    let plot_public_key = signing_key.verifying_key();

    let proof_of_space = ProofOfSpace {
        challenge: constants.genesis_challenge,
        pool_public_key: None,
        plot_public_key,
        size: 32,
        proof: vec![1u8; 32],
    };

    let vdf = VdfInfo {
        challenge: constants.genesis_challenge,
        number_of_iterations: iters,
        output: vec![9u8; 32],
    };

    let ftb = FoliageTransactionBlock {
        prev_transaction_block_hash: parent.header_hash(),
        timestamp,
        removals_root: coin_list_root(&[]),
        additions_root: coin_list_root(&[]),
        reward_claims: vec![reward_coin_for(parent.header_hash(), parent.height + 1)],
        generator_cost_limit: 0,
    };

    let mut signing_content = Vec::new();
    {
        use spacetimed::codec::ToBytes;
        parent.header_hash().to_bytes(&mut signing_content);
        ftb.to_bytes(&mut signing_content);
    }
    let farmer_signature = signing_key.sign(&signing_content);

    let foliage = Foliage {
        prev_block_hash: parent.header_hash(),
        foliage_transaction_block: Some(ftb),
        farmer_signature,
    };

    let header = BlockHeader {
        prev_header_hash: parent.header_hash(),
        height: parent.height + 1,
        weight: parent.weight + constants.initial_difficulty as u128,
        total_iters: parent.total_iters + vdf.number_of_iterations as u128,
        signage_point_index: 0,
        proof_of_space,
        challenge_chain_sp_vdf: None,
        challenge_chain_sp_signature: signing_key.sign(&constants.genesis_challenge),
        challenge_chain_ip_vdf: vdf.clone(),
        reward_chain_sp_vdf: None,
        reward_chain_sp_signature: signing_key.sign(&constants.genesis_challenge),
        reward_chain_ip_vdf: vdf,
        foliage,
        end_of_sub_slot: None,
        timestamp,
    };

    FullBlock {
        header,
        generator: None,
        generator_args: Vec::new(),
        aggregated_signature: Vec::new(),
    }
}

struct Fixtures {
    store: BlockchainStore,
    clock: Arc<dyn WallClock>,
    constants: NetworkConstants,
    pos_verifier: Arc<StructuralPoSpaceVerifier>,
    vdf_verifier: Arc<StructuralVdfVerifier>,
    runner: Arc<CostOnlyProgramRunner>,
}

impl Fixtures {
    fn new(data_dir: &str, now: u64) -> Self {
        let db = Arc::new(
            app_utils::open_database(data_dir, "chain", 8 * 1024 * 1024)
                .expect("failed to open test database"),
        );
        let store = BlockchainStore::open(db).expect("failed to open store");
        Self {
            store,
            clock: Arc::new(FixedClock(now)),
            constants: NetworkType::Testnet.constants(),
            pos_verifier: Arc::new(StructuralPoSpaceVerifier::default()),
            vdf_verifier: Arc::new(StructuralVdfVerifier),
            runner: Arc::new(CostOnlyProgramRunner { cost_per_byte: 0 }),
        }
    }

    async fn add(&self, block: FullBlock) -> AddResult {
        self.store
            .add_block(
                block,
                self.clock.clone(),
                self.constants.clone(),
                self.pos_verifier.clone(),
                self.vdf_verifier.clone(),
                self.runner.clone(),
            )
            .await
            .expect("add_block should not hit a store error")
    }
}

#[tokio::test]
async fn genesis_attaches_and_becomes_peak() {
    let dir = tempfile::tempdir().unwrap();
    let constants = NetworkType::Testnet.constants();
    let genesis = build_genesis_block(&constants);
    let fx = Fixtures::new(dir.path().to_str().unwrap(), genesis.header.timestamp);

    match fx.add(genesis.clone()).await {
        AddResult::NewPeak(state) => {
            assert_eq!(state.peak_height, 0);
            assert_eq!(state.peak_header_hash, genesis.header.header_hash());
        }
        other => panic!("expected genesis to become the new peak, got {other:?}"),
    }

    let peak = fx.store.peak().unwrap().unwrap();
    assert_eq!(peak.peak_height, 0);
}

#[tokio::test]
async fn simple_extension_advances_the_peak() {
    let dir = tempfile::tempdir().unwrap();
    let constants = NetworkType::Testnet.constants();
    let genesis = build_genesis_block(&constants);
    let fx = Fixtures::new(dir.path().to_str().unwrap(), genesis.header.timestamp + 40);

    fx.add(genesis.clone()).await;

    let block1 = extend(&genesis.header, &constants, genesis.header.timestamp + 20, 1000);
    match fx.add(block1.clone()).await {
        AddResult::NewPeak(state) => assert_eq!(state.peak_height, 1),
        other => panic!("expected block 1 to become the new peak, got {other:?}"),
    }

    let fetched = fx.store.get_block_at_height(1).unwrap().unwrap();
    assert_eq!(fetched.header.header_hash(), block1.header.header_hash());
}

#[tokio::test]
async fn disconnected_block_is_rejected_until_its_parent_arrives() {
    let dir = tempfile::tempdir().unwrap();
    let constants = NetworkType::Testnet.constants();
    let genesis = build_genesis_block(&constants);
    let fx = Fixtures::new(dir.path().to_str().unwrap(), genesis.header.timestamp + 100);

    // Build block 2 directly off a block 1 that's never submitted.
    let phantom_block1 = extend(&genesis.header, &constants, genesis.header.timestamp + 20, 1000);
    let block2 = extend(&phantom_block1.header, &constants, genesis.header.timestamp + 40, 1000);

    fx.add(genesis.clone()).await;
    match fx.add(block2).await {
        AddResult::Disconnected => {}
        other => panic!("expected a disconnected result, got {other:?}"),
    }

    assert_eq!(fx.store.peak().unwrap().unwrap().peak_height, 0);
}

#[tokio::test]
async fn heavier_fork_triggers_a_reorg() {
    let dir = tempfile::tempdir().unwrap();
    let constants = NetworkType::Testnet.constants();
    let genesis = build_genesis_block(&constants);
    let fx = Fixtures::new(dir.path().to_str().unwrap(), genesis.header.timestamp + 1000);

    fx.add(genesis.clone()).await;

    // Chain A: two blocks.
    let a1 = extend(&genesis.header, &constants, genesis.header.timestamp + 10, 1000);
    fx.add(a1.clone()).await;
    let a2 = extend(&a1.header, &constants, genesis.header.timestamp + 20, 1000);
    match fx.add(a2.clone()).await {
        AddResult::NewPeak(state) => assert_eq!(state.peak_height, 2),
        other => panic!("expected chain A to reach height 2, got {other:?}"),
    }

    // Chain B: three blocks off the same genesis. Every block accrues the
    // same constant difficulty regardless of its VDF iteration count, so
    // chain B only overtakes chain A's weight by being longer.
    let b1 = extend(&genesis.header, &constants, genesis.header.timestamp + 11, 1000);
    match fx.add(b1.clone()).await {
        AddResult::AddedAsOrphan => {}
        other => panic!("expected chain B's first block to sit as an orphan, got {other:?}"),
    }
    let b2 = extend(&b1.header, &constants, genesis.header.timestamp + 21, 1000);
    match fx.add(b2.clone()).await {
        AddResult::AddedAsOrphan => {}
        other => panic!("expected chain B's second block to still sit as an orphan, got {other:?}"),
    }
    let b3 = extend(&b2.header, &constants, genesis.header.timestamp + 31, 1000);
    match fx.add(b3.clone()).await {
        AddResult::NewPeak(state) => {
            assert_eq!(state.peak_height, 3);
            assert_eq!(state.peak_header_hash, b3.header.header_hash());
        }
        other => panic!("expected chain B's third block to reorg onto the peak, got {other:?}"),
    }

    // The height index now resolves through chain B, not chain A.
    let at_height_1 = fx.store.get_block_at_height(1).unwrap().unwrap();
    assert_eq!(at_height_1.header.header_hash(), b1.header.header_hash());
    let at_height_2 = fx.store.get_block_at_height(2).unwrap().unwrap();
    assert_eq!(at_height_2.header.header_hash(), b2.header.header_hash());
    let at_height_3 = fx.store.get_block_at_height(3).unwrap().unwrap();
    assert_eq!(at_height_3.header.header_hash(), b3.header.header_hash());
}

#[test]
fn confirmed_spend_drops_conflicting_mempool_entries() {
    let spent_coin = Coin {
        parent_coin_id: [7u8; 32],
        puzzle_hash: [1u8; 32],
        amount: 500,
    };
    let low_fee = SpendBundle {
        coin_spends: vec![CoinSpend {
            coin: spent_coin,
            puzzle_reveal: vec![],
            solution: vec![],
        }],
        aggregated_signature: vec![],
    };
    let replacement = SpendBundle {
        coin_spends: vec![CoinSpend {
            coin: spent_coin,
            puzzle_reveal: vec![1],
            solution: vec![2],
        }],
        aggregated_signature: vec![],
    };

    let mut mempool = Mempool::new(1_000_000, 10);
    mempool.add(low_fee, 100, 100).unwrap();

    // A conflicting bundle with too thin a fee bump is rejected, the
    // original stays put.
    assert!(mempool.add(replacement.clone(), 100, 105).is_err());
    assert_eq!(mempool.len(), 1);

    // Once the coin is actually confirmed on chain (by either bundle),
    // the mempool drops whichever version it was still holding.
    mempool.rebuild_on_new_peak(&[spent_coin.coin_id()]);
    assert!(mempool.is_empty());
}
