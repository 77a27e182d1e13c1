//! The block validator: a pure function over a block and its context,
//! implementing the full-block admission pipeline in order and
//! short-circuiting at the first failing step. Kept side-effect-free (no
//! I/O beyond the narrow `BlockContext` trait) so it can be unit tested
//! without a real store, mirroring the header/body validation split
//! grounded in `Chia-Network-chia_rs`'s `block_validation.rs`.

use crate::block::difficulty;
use crate::block::header::{BlockHeader, ChainState, FullBlock};
use crate::block::proof_of_space::{self, PoSpaceVerifier};
use crate::block::vdf::VdfVerifier;
use crate::constants::blockchain::{MAX_BLOCK_COST, TIMESTAMP_TOLERANCE_SECS};
use crate::error::ValidationError;
use crate::network_type::NetworkConstants;
use crate::script::BlockProgramRunner;
use crate::time_sync::WallClock;
use crate::types::{hash_bytes, Coin, CoinRecord, Hash256};
use ed25519_dalek::{Signature, VerifyingKey};

/// Narrow read-only view onto chain state the validator needs: looking up
/// an ancestor header and checking a coin's current record. Implemented by
/// `crate::store` in production and by an in-memory fixture in tests.
pub trait BlockContext {
    fn get_header(&self, header_hash: &Hash256) -> Option<BlockHeader>;
    fn get_coin_record(&self, coin_id: &Hash256) -> Option<CoinRecord>;
}

/// What a successfully validated block contributes to chain state: the
/// coin-record changes the store must apply and the new chain tip.
#[derive(Debug, Clone)]
pub struct DerivedState {
    pub new_coin_records: Vec<CoinRecord>,
    pub spent_coin_ids: Vec<Hash256>,
    pub chain_state: ChainState,
}

pub type ValidationResult = Result<DerivedState, ValidationError>;

/// Block reward paid to the block's farmer, minted as a fresh coin with no
/// real parent (spec's coin model requires every coin have a
/// `parent_coin_id`; reward coins use the header hash instead).
const BLOCK_REWARD_AMOUNT: u64 = 2_000_000_000_000;

#[allow(clippy::too_many_arguments)]
pub fn validate(
    block: &FullBlock,
    ctx: &dyn BlockContext,
    clock: &dyn WallClock,
    constants: &NetworkConstants,
    pos_verifier: &dyn PoSpaceVerifier,
    vdf_verifier: &dyn VdfVerifier,
    runner: &dyn BlockProgramRunner,
) -> ValidationResult {
    let header = &block.header;

    // Step 1: previous block must be known, unless this is genesis.
    let parent = if header.height == 0 {
        None
    } else {
        Some(
            ctx.get_header(&header.prev_header_hash)
                .ok_or(ValidationError::UnknownPrevBlock(header.prev_header_hash))?,
        )
    };

    // Step 2: height and weight must chain off the parent monotonically.
    // Weight accrues by the difficulty in effect for this block (not the
    // block's self-reported VDF iteration count), and at a sub-epoch
    // boundary that difficulty must itself be the recomputed one (spec
    // §4.1 step 8, §8's weight-equals-sum-of-difficulties invariant).
    let (difficulty, sub_slot_iters) = if let Some(parent) = &parent {
        current_difficulty_state(ctx, parent, constants)
    } else {
        (constants.initial_difficulty, constants.initial_sub_slot_iters)
    };

    if let Some(parent) = &parent {
        if header.height != parent.height + 1 {
            return Err(ValidationError::BadWeight {
                found: header.weight,
                expected: parent.weight,
            });
        }
        let expected_weight = parent.weight + difficulty as u128;
        if header.weight != expected_weight {
            return Err(ValidationError::BadWeight {
                found: header.weight,
                expected: expected_weight,
            });
        }

        let claimed_difficulty_change = header.end_of_sub_slot.as_ref().and_then(|s| s.new_difficulty);
        if header.height % constants.sub_epoch_blocks == 0 {
            let actual_duration = sub_epoch_start_timestamp(ctx, parent, constants.sub_epoch_blocks)
                .map(|start| header.timestamp.saturating_sub(start))
                .unwrap_or(0);
            let expected = difficulty::adjust(difficulty, sub_slot_iters, actual_duration, constants);
            let found_sub_slot_iters = header
                .end_of_sub_slot
                .as_ref()
                .map(|s| s.sub_slot_iters)
                .unwrap_or(0);
            if claimed_difficulty_change != Some(expected.0) || found_sub_slot_iters != expected.1 {
                return Err(ValidationError::BadDifficulty {
                    found: (claimed_difficulty_change.unwrap_or(0), found_sub_slot_iters),
                    expected,
                });
            }
        } else if let Some(claimed) = claimed_difficulty_change {
            return Err(ValidationError::BadDifficulty {
                found: (claimed, 0),
                expected: (0, 0),
            });
        }
    }

    // Step 3: proof of space must pass the plot filter and decode. Genesis
    // is protocol-issued rather than farmed, so the height-dependent filter
    // (which otherwise only a fraction of plots pass) does not apply to it.
    if header.height != 0
        && !proof_of_space::passes_plot_filter(
            &header.proof_of_space.plot_public_key,
            &header.proof_of_space.challenge,
            header.height,
            constants,
        )
    {
        return Err(ValidationError::BadProofOfSpace(
            "proof does not pass the plot filter for this height".to_string(),
        ));
    }
    if !pos_verifier.verify(&header.proof_of_space) {
        return Err(ValidationError::BadProofOfSpace(
            "proof of space failed to verify".to_string(),
        ));
    }

    // Step 4: the VDF chain (signage point, infusion point) must verify.
    if let Some(sp_vdf) = &header.challenge_chain_sp_vdf {
        if !vdf_verifier.verify(sp_vdf) {
            return Err(ValidationError::BadProofOfTime(
                "challenge chain signage point VDF failed to verify".to_string(),
            ));
        }
    }
    if !vdf_verifier.verify(&header.challenge_chain_ip_vdf) {
        return Err(ValidationError::BadProofOfTime(
            "challenge chain infusion point VDF failed to verify".to_string(),
        ));
    }
    if !vdf_verifier.verify(&header.reward_chain_ip_vdf) {
        return Err(ValidationError::BadProofOfTime(
            "reward chain infusion point VDF failed to verify".to_string(),
        ));
    }

    // A proof's quality sets a floor on how many iterations must elapse
    // before the infusion point may be claimed; genesis is protocol-issued
    // and exempt like the plot filter above.
    if header.height != 0 {
        let quality = proof_of_space::quality_string(&header.proof_of_space, &header.proof_of_space.challenge);
        let required = proof_of_space::required_iters(
            &quality,
            difficulty,
            sub_slot_iters,
            header.proof_of_space.size,
        );
        if header.challenge_chain_ip_vdf.number_of_iterations < required {
            return Err(ValidationError::BadProofOfTime(format!(
                "infusion point reached after {} iterations, required {required}",
                header.challenge_chain_ip_vdf.number_of_iterations
            )));
        }
    }

    // Step 5: the farmer's foliage signature must verify against the
    // proof's plot public key.
    let foliage_signing_content = foliage_signing_bytes(header);
    if header
        .proof_of_space
        .plot_public_key
        .verify_strict(&foliage_signing_content, &header.foliage.farmer_signature)
        .is_err()
    {
        return Err(ValidationError::BadAggregateSignature);
    }

    // Step 6: a block may not claim a timestamp from the future (beyond
    // clock-drift tolerance), and must not precede its parent's. Historical
    // blocks replayed during sync are always in the past by now, so only
    // the future bound is checked against the live clock.
    let now = clock.now_unix();
    let hi = now.saturating_add(TIMESTAMP_TOLERANCE_SECS as u64);
    let parent_timestamp = parent.as_ref().map(|p| p.timestamp).unwrap_or(0);
    if header.timestamp > hi || header.timestamp < parent_timestamp {
        return Err(ValidationError::BadTimestamp {
            block_timestamp: header.timestamp,
            local_time: now,
        });
    }

    // Step 7: if this block carries coin changes, evaluate its program and
    // apply the no-double-spend / existence checks.
    let mut new_coin_records = Vec::new();
    let mut spent_coin_ids = Vec::new();
    let mut all_required_sigs = Vec::new();

    if let Some(ftb) = &header.foliage.foliage_transaction_block {
        let cost_limit = ftb.generator_cost_limit.min(MAX_BLOCK_COST);
        let program = block.generator.as_deref().unwrap_or(&[]);
        let output = runner
            .run_block_program(program, &block.generator_args, cost_limit)
            .map_err(|e| match e {
                crate::script::ProgramError::CostExceeded { cost, limit } => {
                    ValidationError::CostExceeded { cost, limit }
                }
                crate::script::ProgramError::Evaluation(msg) => ValidationError::ProgramError(msg),
            })?;

        if output.cost > cost_limit {
            return Err(ValidationError::CostExceeded {
                cost: output.cost,
                limit: cost_limit,
            });
        }

        let mut seen = std::collections::HashSet::new();
        for removed in &output.removals {
            let coin_id = removed.coin_id();
            if !seen.insert(coin_id) {
                return Err(ValidationError::DoubleSpendWithinBlock(coin_id));
            }
            let record = ctx
                .get_coin_record(&coin_id)
                .ok_or(ValidationError::UnknownOrSpentCoin(coin_id))?;
            if record.is_spent() {
                return Err(ValidationError::UnknownOrSpentCoin(coin_id));
            }
            spent_coin_ids.push(coin_id);
        }

        for added in &output.additions {
            new_coin_records.push(CoinRecord {
                coin: *added,
                confirmed_height: header.height,
                spent_height: 0,
                coinbase: false,
                timestamp: header.timestamp,
            });
        }

        let additions_root = coin_list_root(&output.additions);
        let removals_root = coin_list_root(&output.removals);
        if additions_root != ftb.additions_root || removals_root != ftb.removals_root {
            return Err(ValidationError::PuzzleHashMismatch);
        }

        all_required_sigs.extend(output.agg_sig_conditions);

        // Reward coins: minted with no real parent, so they can't collide
        // with a spent user coin's id.
        let expected_reward = expected_reward_coins(header);
        if ftb.reward_claims != expected_reward {
            return Err(ValidationError::PuzzleHashMismatch);
        }
        for reward in &ftb.reward_claims {
            new_coin_records.push(CoinRecord {
                coin: *reward,
                confirmed_height: header.height,
                spent_height: 0,
                coinbase: true,
                timestamp: header.timestamp,
            });
        }
    }

    // Step 8: the bundle's aggregate signature must cover every condition
    // the program required.
    if !all_required_sigs.is_empty() {
        verify_aggregate(&all_required_sigs, &block.aggregated_signature)?;
    }

    Ok(DerivedState {
        new_coin_records,
        spent_coin_ids,
        chain_state: ChainState {
            peak_header_hash: header.header_hash(),
            peak_height: header.height,
            peak_weight: header.weight,
            peak_total_iters: header.total_iters,
        },
    })
}

/// What admitting a bundle to the mempool costs and pays, once it has been
/// checked against the current peak (spec §4.3's `validate_bundle_against_peak`).
pub struct BundleValidation {
    pub cost: u64,
    pub fee: u64,
}

/// Validates a standalone spend bundle against the store's current peak,
/// the way the mempool must before admitting it: every coin it spends must
/// exist and be unspent, its program must evaluate within `cost_limit`, and
/// its aggregate signature must cover every condition the program required.
/// Unlike `validate`, this never touches chain state — it only answers
/// "would this bundle be acceptable in the next block".
pub fn validate_bundle_against_peak(
    bundle: &crate::types::SpendBundle,
    ctx: &dyn BlockContext,
    runner: &dyn BlockProgramRunner,
    cost_limit: u64,
) -> Result<BundleValidation, ValidationError> {
    if bundle.coin_spends.is_empty() {
        return Err(ValidationError::ProgramError("bundle spends no coins".to_string()));
    }

    let mut program = Vec::new();
    let mut args = Vec::new();
    for spend in &bundle.coin_spends {
        program.extend_from_slice(&spend.puzzle_reveal);
        args.extend_from_slice(&spend.solution);
    }

    let output = runner
        .run_block_program(&program, &args, cost_limit)
        .map_err(|e| match e {
            crate::script::ProgramError::CostExceeded { cost, limit } => {
                ValidationError::CostExceeded { cost, limit }
            }
            crate::script::ProgramError::Evaluation(msg) => ValidationError::ProgramError(msg),
        })?;

    if output.cost > cost_limit {
        return Err(ValidationError::CostExceeded {
            cost: output.cost,
            limit: cost_limit,
        });
    }

    let mut seen = std::collections::HashSet::new();
    let mut spent_amount: u128 = 0;
    for spend in &bundle.coin_spends {
        let coin_id = spend.coin.coin_id();
        if !seen.insert(coin_id) {
            return Err(ValidationError::DoubleSpendWithinBlock(coin_id));
        }
        let record = ctx
            .get_coin_record(&coin_id)
            .ok_or(ValidationError::UnknownOrSpentCoin(coin_id))?;
        if record.is_spent() {
            return Err(ValidationError::UnknownOrSpentCoin(coin_id));
        }
        spent_amount += record.coin.amount as u128;
    }

    let added_amount: u128 = output.additions.iter().map(|c| c.amount as u128).sum();
    if added_amount > spent_amount {
        return Err(ValidationError::Arithmetic);
    }
    let fee = (spent_amount - added_amount) as u64;

    if !output.agg_sig_conditions.is_empty() {
        verify_aggregate(&output.agg_sig_conditions, &bundle.aggregated_signature)?;
    }

    Ok(BundleValidation {
        cost: output.cost,
        fee,
    })
}

/// Walks back from `header` (inclusive) to the most recent sub-epoch
/// boundary's recorded difficulty/`sub_slot_iters`, falling back to the
/// network's initial values once genesis is reached. Bounded by
/// `sub_epoch_blocks`: a validly-chained header is never more than one
/// sub-epoch away from the boundary that set its current difficulty.
fn current_difficulty_state(
    ctx: &dyn BlockContext,
    header: &BlockHeader,
    constants: &NetworkConstants,
) -> (u64, u64) {
    let mut cursor = header.clone();
    for _ in 0..=constants.sub_epoch_blocks {
        if let Some(sub_slot) = &cursor.end_of_sub_slot {
            if let Some(new_difficulty) = sub_slot.new_difficulty {
                return (new_difficulty, sub_slot.sub_slot_iters);
            }
        }
        if cursor.height == 0 {
            break;
        }
        match ctx.get_header(&cursor.prev_header_hash) {
            Some(h) => cursor = h,
            None => break,
        }
    }
    (constants.initial_difficulty, constants.initial_sub_slot_iters)
}

/// Timestamp of the header exactly `sub_epoch_blocks` ancestors back from
/// `header`, i.e. the start of the sub-epoch `header` is the last block of.
/// `None` if the chain isn't yet that deep (first sub-epoch of a chain).
fn sub_epoch_start_timestamp(
    ctx: &dyn BlockContext,
    header: &BlockHeader,
    sub_epoch_blocks: u32,
) -> Option<u64> {
    let mut cursor = header.clone();
    for _ in 0..sub_epoch_blocks {
        if cursor.height == 0 {
            return None;
        }
        cursor = ctx.get_header(&cursor.prev_header_hash)?;
    }
    Some(cursor.timestamp)
}

fn foliage_signing_bytes(header: &BlockHeader) -> Vec<u8> {
    use crate::codec::ToBytes;
    let mut buf = Vec::new();
    header.foliage.prev_block_hash.to_bytes(&mut buf);
    if let Some(ftb) = &header.foliage.foliage_transaction_block {
        ftb.to_bytes(&mut buf);
    }
    buf
}

/// Canonical root over a coin list: sort by coin id, then hash the
/// canonical encoding. Shared with genesis construction so a block with no
/// coin changes agrees with an empty block's roots.
pub fn coin_list_root(coins: &[Coin]) -> Hash256 {
    use crate::codec::ToBytes;
    let mut ids: Vec<Hash256> = coins.iter().map(|c| c.coin_id()).collect();
    ids.sort_unstable();
    let mut buf = Vec::new();
    ids.to_bytes(&mut buf);
    hash_bytes(&buf)
}

/// The reward coin every block (including genesis) must claim. Exposed so
/// genesis construction can mint the exact coin the validator will expect.
pub fn expected_reward_coins(header: &BlockHeader) -> Vec<Coin> {
    vec![reward_coin_for(header.prev_header_hash, header.height)]
}

/// Builds the reward coin for a block identified by its parent hash and
/// height, computable before that block's header is finalized. The parent
/// id is derived from `(prev_header_hash, height)` rather than the block's
/// own header hash: the reward claim is itself a field of the header, so
/// anchoring it to that header's hash would be circular.
pub fn reward_coin_for(prev_header_hash: Hash256, height: u32) -> Coin {
    use crate::codec::ToBytes;
    let mut buf = Vec::new();
    prev_header_hash.to_bytes(&mut buf);
    height.to_bytes(&mut buf);
    let parent_coin_id = hash_bytes(&buf);
    Coin {
        parent_coin_id,
        puzzle_hash: [0u8; 32],
        amount: BLOCK_REWARD_AMOUNT,
    }
}

fn verify_aggregate(
    required: &[crate::types::RequiredSignature],
    signatures: &[Signature],
) -> Result<(), ValidationError> {
    if required.len() != signatures.len() {
        return Err(ValidationError::BadAggregateSignature);
    }
    let messages: Vec<&[u8]> = required.iter().map(|r| r.message.as_slice()).collect();
    let keys: Vec<VerifyingKey> = required.iter().map(|r| r.public_key).collect();
    ed25519_dalek::verify_batch(&messages, signatures, &keys)
        .map_err(|_| ValidationError::BadAggregateSignature)
}

/// Also exposes `difficulty::adjust` for callers assembling the next
/// block's header fields (sync engine, block producer out of scope here).
pub fn next_difficulty(
    prev_difficulty: u64,
    prev_sub_slot_iters: u64,
    actual_duration_secs: u64,
    constants: &NetworkConstants,
) -> (u64, u64) {
    difficulty::adjust(prev_difficulty, prev_sub_slot_iters, actual_duration_secs, constants)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::genesis::build_genesis_block;
    use crate::block::header::VdfInfo;
    use crate::block::proof_of_space::StructuralPoSpaceVerifier;
    use crate::block::vdf::{RejectingVdfVerifier, StructuralVdfVerifier};
    use crate::network_type::NetworkType;
    use crate::script::{CostOnlyProgramRunner, RejectingProgramRunner};
    use crate::time_sync::FixedClock;
    use ed25519_dalek::SigningKey;
    use std::collections::HashMap;

    /// In-memory `BlockContext` fixture: headers and coin records the test
    /// has chosen to pre-populate, nothing more.
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

    fn constants() -> NetworkConstants {
        NetworkType::Testnet.constants()
    }

    fn runner() -> CostOnlyProgramRunner {
        CostOnlyProgramRunner { cost_per_byte: 1 }
    }

    /// Searches for a farmer keypair whose plot passes the height's plot
    /// filter, the way a real farmer only gets to propose a block once its
    /// plot happens to pass. Deterministic across test runs since it walks
    /// seeds in order rather than drawing from `rand`.
    fn find_passing_farmer(constants: &NetworkConstants, height: u32) -> SigningKey {
        for i in 0u8..=255 {
            let seed = [i; 32];
            let signing_key = SigningKey::from_bytes(&seed);
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
        panic!("no farmer seed in the search range passes the plot filter at height {height}");
    }

    /// Builds a height+1 block extending `parent`, signed by a fresh farmer
    /// keypair, claiming only the reward coin (no transactions).
    fn extend(parent: &BlockHeader, constants: &NetworkConstants, timestamp: u64) -> FullBlock {
        let signing_key = find_passing_farmer(constants, parent.height + 1);
        let plot_public_key = signing_key.verifying_key();

        let proof_of_space = crate::block::header::ProofOfSpace {
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

        let ftb = crate::block::header::FoliageTransactionBlock {
            prev_transaction_block_hash: parent.header_hash(),
            timestamp,
            removals_root: coin_list_root(&[]),
            additions_root: coin_list_root(&[]),
            reward_claims: vec![reward_coin_for(parent.header_hash(), parent.height + 1)],
            generator_cost_limit: 0,
        };

        let mut signing_content = Vec::new();
        {
            use crate::codec::ToBytes;
            parent.header_hash().to_bytes(&mut signing_content);
            ftb.to_bytes(&mut signing_content);
        }
        let farmer_signature = signing_key.sign(&signing_content);

        let foliage = crate::block::header::Foliage {
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

    #[test]
    fn genesis_block_validates() {
        let constants = constants();
        let genesis = build_genesis_block(&constants);
        let ctx = FixtureStore::default();
        let clock = FixedClock(genesis.header.timestamp);

        let result = validate(
            &genesis,
            &ctx,
            &clock,
            &constants,
            &StructuralPoSpaceVerifier::default(),
            &StructuralVdfVerifier,
            &runner(),
        )
        .expect("genesis block should validate");

        assert_eq!(result.chain_state.peak_height, 0);
        assert_eq!(result.new_coin_records.len(), 1);
        assert!(result.new_coin_records[0].coinbase);
    }

    #[test]
    fn simple_extension_validates_against_parent() {
        let constants = constants();
        let genesis = build_genesis_block(&constants);
        let mut ctx = FixtureStore::default();
        ctx.headers.insert(genesis.header.header_hash(), genesis.header.clone());

        let child = extend(&genesis.header, &constants, genesis.header.timestamp + 20);
        let clock = FixedClock(child.header.timestamp);

        let result = validate(
            &child,
            &ctx,
            &clock,
            &constants,
            &StructuralPoSpaceVerifier::default(),
            &StructuralVdfVerifier,
            &runner(),
        )
        .expect("simple extension should validate");

        assert_eq!(result.chain_state.peak_height, 1);
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let constants = constants();
        let genesis = build_genesis_block(&constants);
        let ctx = FixtureStore::default();

        let child = extend(&genesis.header, &constants, genesis.header.timestamp + 20);
        let clock = FixedClock(child.header.timestamp);

        let err = validate(
            &child,
            &ctx,
            &clock,
            &constants,
            &StructuralPoSpaceVerifier::default(),
            &StructuralVdfVerifier,
            &runner(),
        )
        .unwrap_err();

        assert!(matches!(err, ValidationError::UnknownPrevBlock(_)));
    }

    #[test]
    fn bad_weight_is_rejected() {
        let constants = constants();
        let genesis = build_genesis_block(&constants);
        let mut ctx = FixtureStore::default();
        ctx.headers.insert(genesis.header.header_hash(), genesis.header.clone());

        let mut child = extend(&genesis.header, &constants, genesis.header.timestamp + 20);
        child.header.weight += 1;
        let clock = FixedClock(child.header.timestamp);

        let err = validate(
            &child,
            &ctx,
            &clock,
            &constants,
            &StructuralPoSpaceVerifier::default(),
            &StructuralVdfVerifier,
            &runner(),
        )
        .unwrap_err();

        assert!(matches!(err, ValidationError::BadWeight { .. }));
    }

    #[test]
    fn future_timestamp_is_rejected() {
        let constants = constants();
        let genesis = build_genesis_block(&constants);
        let mut ctx = FixtureStore::default();
        ctx.headers.insert(genesis.header.header_hash(), genesis.header.clone());

        let far_future = genesis.header.timestamp + 10_000;
        let child = extend(&genesis.header, &constants, far_future);
        let clock = FixedClock(genesis.header.timestamp);

        let err = validate(
            &child,
            &ctx,
            &clock,
            &constants,
            &StructuralPoSpaceVerifier::default(),
            &StructuralVdfVerifier,
            &runner(),
        )
        .unwrap_err();

        assert!(matches!(err, ValidationError::BadTimestamp { .. }));
    }

    #[test]
    fn failing_vdf_verifier_is_rejected() {
        let constants = constants();
        let genesis = build_genesis_block(&constants);
        let mut ctx = FixtureStore::default();
        ctx.headers.insert(genesis.header.header_hash(), genesis.header.clone());

        let child = extend(&genesis.header, &constants, genesis.header.timestamp + 20);
        let clock = FixedClock(child.header.timestamp);

        let err = validate(
            &child,
            &ctx,
            &clock,
            &constants,
            &StructuralPoSpaceVerifier::default(),
            &RejectingVdfVerifier,
            &runner(),
        )
        .unwrap_err();

        assert!(matches!(err, ValidationError::BadProofOfTime(_)));
    }

    #[test]
    fn double_spend_within_block_is_rejected() {
        // A program runner that reports the same coin removed twice,
        // regardless of the (empty) program bytes it is handed.
        struct DoubleSpendRunner;
        impl BlockProgramRunner for DoubleSpendRunner {
            fn run_block_program(
                &self,
                _program: &[u8],
                _args: &[u8],
                _cost_limit: u64,
            ) -> Result<crate::script::ProgramOutput, crate::script::ProgramError> {
                let coin = Coin {
                    parent_coin_id: [1u8; 32],
                    puzzle_hash: [2u8; 32],
                    amount: 10,
                };
                Ok(crate::script::ProgramOutput {
                    removals: vec![coin, coin],
                    ..Default::default()
                })
            }
        }

        let constants = constants();
        let genesis = build_genesis_block(&constants);
        let mut ctx = FixtureStore::default();
        ctx.headers.insert(genesis.header.header_hash(), genesis.header.clone());

        let child = extend(&genesis.header, &constants, genesis.header.timestamp + 20);
        let clock = FixedClock(child.header.timestamp);

        let err = validate(
            &child,
            &ctx,
            &clock,
            &constants,
            &StructuralPoSpaceVerifier::default(),
            &StructuralVdfVerifier,
            &DoubleSpendRunner,
        )
        .unwrap_err();

        assert!(matches!(err, ValidationError::DoubleSpendWithinBlock(_)));
    }

    #[test]
    fn rejecting_program_runner_surfaces_program_error() {
        let constants = constants();
        let genesis = build_genesis_block(&constants);
        let mut ctx = FixtureStore::default();
        ctx.headers.insert(genesis.header.header_hash(), genesis.header.clone());

        let child = extend(&genesis.header, &constants, genesis.header.timestamp + 20);
        let clock = FixedClock(child.header.timestamp);

        let err = validate(
            &child,
            &ctx,
            &clock,
            &constants,
            &StructuralPoSpaceVerifier::default(),
            &StructuralVdfVerifier,
            &RejectingProgramRunner,
        )
        .unwrap_err();

        assert!(matches!(err, ValidationError::ProgramError(_)));
    }

    #[test]
    fn coin_list_root_is_order_independent() {
        let a = Coin {
            parent_coin_id: [1u8; 32],
            puzzle_hash: [2u8; 32],
            amount: 1,
        };
        let b = Coin {
            parent_coin_id: [3u8; 32],
            puzzle_hash: [4u8; 32],
            amount: 2,
        };
        assert_eq!(coin_list_root(&[a, b]), coin_list_root(&[b, a]));
    }
}
