//! Block and chain-state data types: a proof of space, a proof of time
//! (VDF) wrapped around it, and the foliage that carries the block's coin
//! changes. Identity hashing goes through `crate::codec` the same way
//! `crate::types::Coin` does; storage goes through `serde`/`bincode` (see
//! `crate::store`).

use crate::codec::{CodecError, FromBytes, ToBytes};
use crate::types::{hash_of, Coin, Hash256};
use ed25519_dalek::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};

/// Output of the sequential (VDF) function: a witness over a classgroup
/// element, treated as an opaque byte string since verifying the delay
/// function itself is out of scope (spec non-goals).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VdfInfo {
    pub challenge: Hash256,
    pub number_of_iterations: u64,
    pub output: Vec<u8>,
}

impl ToBytes for VdfInfo {
    fn to_bytes(&self, out: &mut Vec<u8>) {
        self.challenge.to_bytes(out);
        self.number_of_iterations.to_bytes(out);
        self.output.to_bytes(out);
    }
}

impl FromBytes for VdfInfo {
    fn from_bytes(buf: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (challenge, buf) = Hash256::from_bytes(buf)?;
        let (number_of_iterations, buf) = u64::from_bytes(buf)?;
        let (output, buf) = Vec::<u8>::from_bytes(buf)?;
        Ok((
            VdfInfo {
                challenge,
                number_of_iterations,
                output,
            },
            buf,
        ))
    }
}

/// A farmer's proof of space: the k-size plot proof for a given challenge.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProofOfSpace {
    pub challenge: Hash256,
    pub pool_public_key: Option<VerifyingKey>,
    pub plot_public_key: VerifyingKey,
    pub size: u8,
    pub proof: Vec<u8>,
}

impl ToBytes for ProofOfSpace {
    fn to_bytes(&self, out: &mut Vec<u8>) {
        self.challenge.to_bytes(out);
        match &self.pool_public_key {
            None => out.push(0),
            Some(k) => {
                out.push(1);
                out.extend_from_slice(k.as_bytes());
            }
        }
        out.extend_from_slice(self.plot_public_key.as_bytes());
        self.size.to_bytes(out);
        self.proof.to_bytes(out);
    }
}

impl FromBytes for ProofOfSpace {
    fn from_bytes(buf: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (challenge, buf) = Hash256::from_bytes(buf)?;
        let (tag, buf) = u8::from_bytes(buf)?;
        let (pool_public_key, buf) = match tag {
            0 => (None, buf),
            1 => {
                if buf.len() < 32 {
                    return Err(CodecError::UnexpectedEof {
                        needed: 32 - buf.len(),
                    });
                }
                let (head, rest) = buf.split_at(32);
                let key = VerifyingKey::from_bytes(head.try_into().unwrap())
                    .map_err(|_| CodecError::InvalidTag(1))?;
                (Some(key), rest)
            }
            other => return Err(CodecError::InvalidTag(other)),
        };
        if buf.len() < 32 {
            return Err(CodecError::UnexpectedEof {
                needed: 32 - buf.len(),
            });
        }
        let (head, buf) = buf.split_at(32);
        let plot_public_key =
            VerifyingKey::from_bytes(head.try_into().unwrap()).map_err(|_| CodecError::InvalidTag(2))?;
        let (size, buf) = u8::from_bytes(buf)?;
        let (proof, buf) = Vec::<u8>::from_bytes(buf)?;
        Ok((
            ProofOfSpace {
                challenge,
                pool_public_key,
                plot_public_key,
                size,
                proof,
            },
            buf,
        ))
    }
}

/// The per-block coin-model payload: what the block's foliage claims about
/// additions, removals, and the reward coins it mints.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FoliageTransactionBlock {
    pub prev_transaction_block_hash: Hash256,
    pub timestamp: u64,
    pub removals_root: Hash256,
    pub additions_root: Hash256,
    pub reward_claims: Vec<Coin>,
    pub generator_cost_limit: u64,
}

impl ToBytes for FoliageTransactionBlock {
    fn to_bytes(&self, out: &mut Vec<u8>) {
        self.prev_transaction_block_hash.to_bytes(out);
        self.timestamp.to_bytes(out);
        self.removals_root.to_bytes(out);
        self.additions_root.to_bytes(out);
        self.reward_claims.to_bytes(out);
        self.generator_cost_limit.to_bytes(out);
    }
}

impl FromBytes for FoliageTransactionBlock {
    fn from_bytes(buf: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (prev_transaction_block_hash, buf) = Hash256::from_bytes(buf)?;
        let (timestamp, buf) = u64::from_bytes(buf)?;
        let (removals_root, buf) = Hash256::from_bytes(buf)?;
        let (additions_root, buf) = Hash256::from_bytes(buf)?;
        let (reward_claims, buf) = Vec::<Coin>::from_bytes(buf)?;
        let (generator_cost_limit, buf) = u64::from_bytes(buf)?;
        Ok((
            FoliageTransactionBlock {
                prev_transaction_block_hash,
                timestamp,
                removals_root,
                additions_root,
                reward_claims,
                generator_cost_limit,
            },
            buf,
        ))
    }
}

/// Foliage: the farmer-signed envelope linking a block into the chain.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Foliage {
    pub prev_block_hash: Hash256,
    pub foliage_transaction_block: Option<FoliageTransactionBlock>,
    pub farmer_signature: Signature,
}

impl ToBytes for Foliage {
    fn to_bytes(&self, out: &mut Vec<u8>) {
        self.prev_block_hash.to_bytes(out);
        match &self.foliage_transaction_block {
            None => out.push(0),
            Some(ftb) => {
                out.push(1);
                ftb.to_bytes(out);
            }
        }
        out.extend_from_slice(&self.farmer_signature.to_bytes());
    }
}

impl FromBytes for Foliage {
    fn from_bytes(buf: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (prev_block_hash, buf) = Hash256::from_bytes(buf)?;
        let (tag, buf) = u8::from_bytes(buf)?;
        let (foliage_transaction_block, buf) = match tag {
            0 => (None, buf),
            1 => {
                let (ftb, rest) = FoliageTransactionBlock::from_bytes(buf)?;
                (Some(ftb), rest)
            }
            other => return Err(CodecError::InvalidTag(other)),
        };
        if buf.len() < 64 {
            return Err(CodecError::UnexpectedEof {
                needed: 64 - buf.len(),
            });
        }
        let (head, buf) = buf.split_at(64);
        let farmer_signature = Signature::from_slice(head).map_err(|_| CodecError::InvalidTag(3))?;
        Ok((
            Foliage {
                prev_block_hash,
                foliage_transaction_block,
                farmer_signature,
            },
            buf,
        ))
    }
}

/// End-of-sub-slot record: carries the next sub-slot's iteration count and,
/// at epoch/sub-epoch boundaries, a difficulty change.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubSlotInfo {
    pub challenge_chain_end_of_slot: VdfInfo,
    pub reward_chain_end_of_slot: VdfInfo,
    pub sub_slot_iters: u64,
    pub new_difficulty: Option<u64>,
}

impl ToBytes for SubSlotInfo {
    fn to_bytes(&self, out: &mut Vec<u8>) {
        self.challenge_chain_end_of_slot.to_bytes(out);
        self.reward_chain_end_of_slot.to_bytes(out);
        self.sub_slot_iters.to_bytes(out);
        self.new_difficulty.to_bytes(out);
    }
}

impl FromBytes for SubSlotInfo {
    fn from_bytes(buf: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (challenge_chain_end_of_slot, buf) = VdfInfo::from_bytes(buf)?;
        let (reward_chain_end_of_slot, buf) = VdfInfo::from_bytes(buf)?;
        let (sub_slot_iters, buf) = u64::from_bytes(buf)?;
        let (new_difficulty, buf) = Option::<u64>::from_bytes(buf)?;
        Ok((
            SubSlotInfo {
                challenge_chain_end_of_slot,
                reward_chain_end_of_slot,
                sub_slot_iters,
                new_difficulty,
            },
            buf,
        ))
    }
}

/// A signage point: the pair of VDF outputs farmers sign against to produce
/// a proof of space at a given index within a sub-slot.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignagePoint {
    pub challenge_chain_sp: VdfInfo,
    pub reward_chain_sp: VdfInfo,
    pub index: u8,
}

/// A block header: proof of space, the VDF chain linking it to its
/// signage point and infusion point, and foliage. `weight` and
/// `total_iters` are cumulative since genesis and drive fork choice
/// (spec §3, §9).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockHeader {
    pub prev_header_hash: Hash256,
    pub height: u32,
    pub weight: u128,
    pub total_iters: u128,
    pub signage_point_index: u8,
    pub proof_of_space: ProofOfSpace,
    pub challenge_chain_sp_vdf: Option<VdfInfo>,
    pub challenge_chain_sp_signature: Signature,
    pub challenge_chain_ip_vdf: VdfInfo,
    pub reward_chain_sp_vdf: Option<VdfInfo>,
    pub reward_chain_sp_signature: Signature,
    pub reward_chain_ip_vdf: VdfInfo,
    pub foliage: Foliage,
    pub end_of_sub_slot: Option<SubSlotInfo>,
    pub timestamp: u64,
}

impl ToBytes for BlockHeader {
    fn to_bytes(&self, out: &mut Vec<u8>) {
        self.prev_header_hash.to_bytes(out);
        self.height.to_bytes(out);
        self.weight.to_bytes(out);
        self.total_iters.to_bytes(out);
        self.signage_point_index.to_bytes(out);
        self.proof_of_space.to_bytes(out);
        self.challenge_chain_sp_vdf.to_bytes(out);
        out.extend_from_slice(&self.challenge_chain_sp_signature.to_bytes());
        self.challenge_chain_ip_vdf.to_bytes(out);
        self.reward_chain_sp_vdf.to_bytes(out);
        out.extend_from_slice(&self.reward_chain_sp_signature.to_bytes());
        self.reward_chain_ip_vdf.to_bytes(out);
        self.foliage.to_bytes(out);
        self.end_of_sub_slot.to_bytes(out);
        self.timestamp.to_bytes(out);
    }
}

impl FromBytes for BlockHeader {
    fn from_bytes(buf: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (prev_header_hash, buf) = Hash256::from_bytes(buf)?;
        let (height, buf) = u32::from_bytes(buf)?;
        let (weight, buf) = u128::from_bytes(buf)?;
        let (total_iters, buf) = u128::from_bytes(buf)?;
        let (signage_point_index, buf) = u8::from_bytes(buf)?;
        let (proof_of_space, buf) = ProofOfSpace::from_bytes(buf)?;
        let (challenge_chain_sp_vdf, buf) = Option::<VdfInfo>::from_bytes(buf)?;
        let (head, buf) = take64(buf)?;
        let challenge_chain_sp_signature =
            Signature::from_slice(head).map_err(|_| CodecError::InvalidTag(4))?;
        let (challenge_chain_ip_vdf, buf) = VdfInfo::from_bytes(buf)?;
        let (reward_chain_sp_vdf, buf) = Option::<VdfInfo>::from_bytes(buf)?;
        let (head, buf) = take64(buf)?;
        let reward_chain_sp_signature =
            Signature::from_slice(head).map_err(|_| CodecError::InvalidTag(5))?;
        let (reward_chain_ip_vdf, buf) = VdfInfo::from_bytes(buf)?;
        let (foliage, buf) = Foliage::from_bytes(buf)?;
        let (end_of_sub_slot, buf) = Option::<SubSlotInfo>::from_bytes(buf)?;
        let (timestamp, buf) = u64::from_bytes(buf)?;
        Ok((
            BlockHeader {
                prev_header_hash,
                height,
                weight,
                total_iters,
                signage_point_index,
                proof_of_space,
                challenge_chain_sp_vdf,
                challenge_chain_sp_signature,
                challenge_chain_ip_vdf,
                reward_chain_sp_vdf,
                reward_chain_sp_signature,
                reward_chain_ip_vdf,
                foliage,
                end_of_sub_slot,
                timestamp,
            },
            buf,
        ))
    }
}

fn take64(buf: &[u8]) -> Result<(&[u8], &[u8]), CodecError> {
    if buf.len() < 64 {
        return Err(CodecError::UnexpectedEof {
            needed: 64 - buf.len(),
        });
    }
    Ok(buf.split_at(64))
}

impl BlockHeader {
    /// The header hash: the chain-identity every child links to via
    /// `prev_header_hash` and every store lookup keys by.
    pub fn header_hash(&self) -> Hash256 {
        hash_of(self)
    }
}

/// A finished block ready to validate and commit: header plus the coin
/// spends it includes, expressed as an opaque program (see
/// `crate::script::BlockProgramRunner`) the way a real node's generator +
/// generator_ref_list works, rather than a decoded spend list.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FullBlock {
    pub header: BlockHeader,
    pub generator: Option<Vec<u8>>,
    pub generator_args: Vec<u8>,
    pub aggregated_signature: Vec<Signature>,
}

/// A block that has a proof of space and signage-point VDFs but has not
/// yet been infused (no infusion-point VDF output): what gossip forwards
/// ahead of the proof of time finishing (spec §4.7).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnfinishedBlock {
    pub prev_header_hash: Hash256,
    pub signage_point_index: u8,
    pub proof_of_space: ProofOfSpace,
    pub challenge_chain_sp_vdf: Option<VdfInfo>,
    pub challenge_chain_sp_signature: Signature,
    pub reward_chain_sp_vdf: Option<VdfInfo>,
    pub reward_chain_sp_signature: Signature,
    pub foliage: Foliage,
    pub generator: Option<Vec<u8>>,
    pub generator_args: Vec<u8>,
    pub aggregated_signature: Vec<Signature>,
}

impl UnfinishedBlock {
    /// Identifies this unfinished block's reward chain for the gossip
    /// forwarder's per-reward-hash duplicate-variant budget (spec §4.7).
    pub fn reward_hash(&self) -> Hash256 {
        hash_of(&self.foliage)
    }
}

/// Summary of one sub-epoch, chained by `prev_sub_epoch_hash`: the unit a
/// weight proof samples and verifies without downloading every block
/// (spec §4's weight-proof module).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubEpochSummary {
    pub prev_sub_epoch_hash: Hash256,
    pub reward_chain_hash: Hash256,
    pub height: u32,
    pub weight: u128,
    pub new_sub_slot_iters: Option<u64>,
    pub new_difficulty: Option<u64>,
}

impl ToBytes for SubEpochSummary {
    fn to_bytes(&self, out: &mut Vec<u8>) {
        self.prev_sub_epoch_hash.to_bytes(out);
        self.reward_chain_hash.to_bytes(out);
        self.height.to_bytes(out);
        self.weight.to_bytes(out);
        self.new_sub_slot_iters.to_bytes(out);
        self.new_difficulty.to_bytes(out);
    }
}

impl FromBytes for SubEpochSummary {
    fn from_bytes(buf: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (prev_sub_epoch_hash, buf) = Hash256::from_bytes(buf)?;
        let (reward_chain_hash, buf) = Hash256::from_bytes(buf)?;
        let (height, buf) = u32::from_bytes(buf)?;
        let (weight, buf) = u128::from_bytes(buf)?;
        let (new_sub_slot_iters, buf) = Option::<u64>::from_bytes(buf)?;
        let (new_difficulty, buf) = Option::<u64>::from_bytes(buf)?;
        Ok((
            SubEpochSummary {
                prev_sub_epoch_hash,
                reward_chain_hash,
                height,
                weight,
                new_sub_slot_iters,
                new_difficulty,
            },
            buf,
        ))
    }
}

impl SubEpochSummary {
    pub fn hash(&self) -> Hash256 {
        hash_of(self)
    }
}

/// The chain's current tip, as tracked by the store and the sync engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainState {
    pub peak_header_hash: Hash256,
    pub peak_height: u32,
    pub peak_weight: u128,
    pub peak_total_iters: u128,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vdf() -> VdfInfo {
        VdfInfo {
            challenge: [9u8; 32],
            number_of_iterations: 1000,
            output: vec![1, 2, 3],
        }
    }

    #[test]
    fn sub_epoch_summary_round_trips() {
        let s = SubEpochSummary {
            prev_sub_epoch_hash: [1u8; 32],
            reward_chain_hash: [2u8; 32],
            height: 10,
            weight: 12345,
            new_sub_slot_iters: Some(100),
            new_difficulty: None,
        };
        let bytes = s.to_bytes_vec();
        let decoded = crate::codec::decode_exact::<SubEpochSummary>(&bytes).unwrap();
        assert_eq!(decoded, s);
    }

    #[test]
    fn vdf_info_round_trips() {
        let v = vdf();
        let bytes = v.to_bytes_vec();
        let decoded = crate::codec::decode_exact::<VdfInfo>(&bytes).unwrap();
        assert_eq!(decoded, v);
    }

    #[test]
    fn sub_slot_info_round_trips_with_difficulty_change() {
        let s = SubSlotInfo {
            challenge_chain_end_of_slot: vdf(),
            reward_chain_end_of_slot: vdf(),
            sub_slot_iters: 200_000,
            new_difficulty: Some(1234),
        };
        let bytes = s.to_bytes_vec();
        let decoded = crate::codec::decode_exact::<SubSlotInfo>(&bytes).unwrap();
        assert_eq!(decoded, s);
    }

    #[test]
    fn block_header_round_trips_with_end_of_sub_slot() {
        use ed25519_dalek::SigningKey;

        let signing_key = SigningKey::from_bytes(&[7u8; 32]);
        let proof_of_space = ProofOfSpace {
            challenge: [1u8; 32],
            pool_public_key: None,
            plot_public_key: signing_key.verifying_key(),
            size: 32,
            proof: vec![1u8; 32],
        };
        let foliage = Foliage {
            prev_block_hash: [2u8; 32],
            foliage_transaction_block: None,
            farmer_signature: signing_key.sign(b"header"),
        };
        let header = BlockHeader {
            prev_header_hash: [3u8; 32],
            height: 96,
            weight: 96_000,
            total_iters: 96_000,
            signage_point_index: 0,
            proof_of_space,
            challenge_chain_sp_vdf: None,
            challenge_chain_sp_signature: signing_key.sign(b"sp"),
            challenge_chain_ip_vdf: vdf(),
            reward_chain_sp_vdf: None,
            reward_chain_sp_signature: signing_key.sign(b"rsp"),
            reward_chain_ip_vdf: vdf(),
            foliage,
            end_of_sub_slot: Some(SubSlotInfo {
                challenge_chain_end_of_slot: vdf(),
                reward_chain_end_of_slot: vdf(),
                sub_slot_iters: 150_000,
                new_difficulty: Some(1500),
            }),
            timestamp: 1_700_000_000,
        };

        let bytes = header.to_bytes_vec();
        let decoded = crate::codec::decode_exact::<BlockHeader>(&bytes).unwrap();
        assert_eq!(decoded, header);
        assert!(decoded.end_of_sub_slot.is_some());
    }
}
