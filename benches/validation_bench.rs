//! Benchmarks for block validation performance
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ed25519_dalek::SigningKey;
use spacetimed::block::genesis::build_genesis_block;
use spacetimed::block::header::{
    BlockHeader, Foliage, FoliageTransactionBlock, FullBlock, ProofOfSpace, VdfInfo,
};
use spacetimed::block::proof_of_space::{self, StructuralPoSpaceVerifier};
use spacetimed::block::validator::{self, coin_list_root, reward_coin_for, BlockContext};
use spacetimed::block::vdf::StructuralVdfVerifier;
use spacetimed::network_type::{NetworkConstants, NetworkType};
use spacetimed::script::{CostOnlyProgramRunner, ProgramError, ProgramOutput};
use spacetimed::time_sync::FixedClock;
use spacetimed::types::{Coin, CoinRecord, Hash256};
use std::collections::HashMap;

#[derive(Default)]
struct FixtureStore {
    headers: HashMap<Hash256, BlockHeader>,
    coins: HashMap<Hash256, CoinRecord>,
}

impl BlockContext for FixtureStore {
    fn get_header(&self, header_hash: &Hash256) -> Option<BlockHeader> {
        self.headers.get(header_hash).cloned()
    }
    fn get_coin_record(&self, coin_id: &Hash256) -> Option<CoinRecord> {
        self.coins.get(coin_id).cloned()
    }
}

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

/// A program runner standing in for a generator that spends `n_inputs`
/// coins and creates one coin, so the bench can scale with transaction
/// count the way the validator's real cost/double-spend bookkeeping would.
struct SpendingRunner {
    removals: Vec<Coin>,
    additions: Vec<Coin>,
}

impl spacetimed::script::BlockProgramRunner for SpendingRunner {
    fn run_block_program(
        &self,
        _program: &[u8],
        _args: &[u8],
        _cost_limit: u64,
    ) -> Result<ProgramOutput, ProgramError> {
        Ok(ProgramOutput {
            additions: self.additions.clone(),
            removals: self.removals.clone(),
            agg_sig_conditions: vec![],
            cost: self.removals.len() as u64 * 1000,
        })
    }
}

fn extend(
    parent: &BlockHeader,
    constants: &NetworkConstants,
    timestamp: u64,
    removals: Vec<Coin>,
    additions: Vec<Coin>,
) -> FullBlock {
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
        number_of_iterations: 1000,
        output: vec![9u8; 32],
    };

    let ftb = FoliageTransactionBlock {
        prev_transaction_block_hash: parent.header_hash(),
        timestamp,
        removals_root: coin_list_root(&removals),
        additions_root: coin_list_root(&additions),
        reward_claims: vec![reward_coin_for(parent.header_hash(), parent.height + 1)],
        generator_cost_limit: removals.len() as u64 * 2000 + 10_000,
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
        generator: Some(vec![0u8; removals.len() * 10]),
        generator_args: Vec::new(),
        aggregated_signature: Vec::new(),
    }
}

fn bench_empty_block_validation(c: &mut Criterion) {
    let constants = NetworkType::Testnet.constants();
    let genesis = build_genesis_block(&constants);
    let mut ctx = FixtureStore::default();
    ctx.headers
        .insert(genesis.header.header_hash(), genesis.header.clone());

    let block = extend(&genesis.header, &constants, genesis.header.timestamp + 20, vec![], vec![]);
    let clock = FixedClock(block.header.timestamp);
    let pos_verifier = StructuralPoSpaceVerifier::default();
    let vdf_verifier = StructuralVdfVerifier;
    let runner = CostOnlyProgramRunner { cost_per_byte: 0 };

    c.bench_function("validate_empty_block", |b| {
        b.iter(|| {
            validator::validate(
                black_box(&block),
                &ctx,
                &clock,
                &constants,
                &pos_verifier,
                &vdf_verifier,
                &runner,
            )
            .unwrap()
        })
    });
}

fn bench_block_validation_with_spends(c: &mut Criterion) {
    let constants = NetworkType::Testnet.constants();
    let genesis = build_genesis_block(&constants);
    let mut ctx = FixtureStore::default();
    ctx.headers
        .insert(genesis.header.header_hash(), genesis.header.clone());

    let removals: Vec<Coin> = (0..100u64)
        .map(|i| {
            let coin = Coin {
                parent_coin_id: [i as u8; 32],
                puzzle_hash: [1u8; 32],
                amount: 100,
            };
            ctx.coins.insert(
                coin.coin_id(),
                CoinRecord {
                    coin,
                    confirmed_height: 0,
                    spent_height: 0,
                    coinbase: false,
                    timestamp: 0,
                },
            );
            coin
        })
        .collect();
    let additions: Vec<Coin> = (0..100u64)
        .map(|i| Coin {
            parent_coin_id: removals[i as usize].coin_id(),
            puzzle_hash: [2u8; 32],
            amount: 100,
        })
        .collect();

    let block = extend(
        &genesis.header,
        &constants,
        genesis.header.timestamp + 20,
        removals.clone(),
        additions.clone(),
    );
    let clock = FixedClock(block.header.timestamp);
    let pos_verifier = StructuralPoSpaceVerifier::default();
    let vdf_verifier = StructuralVdfVerifier;
    let runner = SpendingRunner {
        removals,
        additions,
    };

    c.bench_function("validate_block_with_100_spends", |b| {
        b.iter(|| {
            validator::validate(
                black_box(&block),
                &ctx,
                &clock,
                &constants,
                &pos_verifier,
                &vdf_verifier,
                &runner,
            )
            .unwrap()
        })
    });
}

fn bench_chain_sequence_validation(c: &mut Criterion) {
    let constants = NetworkType::Testnet.constants();
    let genesis = build_genesis_block(&constants);
    let mut ctx = FixtureStore::default();
    ctx.headers
        .insert(genesis.header.header_hash(), genesis.header.clone());

    let mut blocks = vec![genesis.clone()];
    let mut parent = genesis.header.clone();
    for i in 1..=10u64 {
        let block = extend(&parent, &constants, parent.timestamp + 20 * i, vec![], vec![]);
        ctx.headers
            .insert(block.header.header_hash(), block.header.clone());
        parent = block.header.clone();
        blocks.push(block);
    }

    let pos_verifier = StructuralPoSpaceVerifier::default();
    let vdf_verifier = StructuralVdfVerifier;
    let runner = CostOnlyProgramRunner { cost_per_byte: 0 };

    c.bench_function("validate_chain_sequence_10_blocks", |b| {
        b.iter(|| {
            for block in blocks.iter().skip(1) {
                let last_timestamp = block.header.timestamp;
                validator::validate(
                    black_box(block),
                    &ctx,
                    &FixedClock(last_timestamp),
                    &constants,
                    &pos_verifier,
                    &vdf_verifier,
                    &runner,
                )
                .unwrap();
            }
        })
    });
}

criterion_group!(
    benches,
    bench_empty_block_validation,
    bench_block_validation_with_spends,
    bench_chain_sequence_validation
);
criterion_main!(benches);
