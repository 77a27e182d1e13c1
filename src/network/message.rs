//! The closed set of peer protocol messages, each wire-encoded as a tagged
//! union: one discriminant byte (`MessageType`) identifying the variant,
//! then the variant's `crate::codec` encoding as the frame payload. The
//! set is fixed once a peer's handshake negotiates a protocol version
//! (spec §9 design note).

use crate::block::header::{BlockHeader, FullBlock, SignagePoint, SubEpochSummary, UnfinishedBlock};
use crate::codec::{CodecError, FromBytes, ToBytes};
use crate::error::PeerError;
use crate::types::{CoinRecord, Hash256, SpendBundle};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Handshake = 0,
    Ping = 1,
    Pong = 2,
    NewPeak = 3,
    NewTransaction = 4,
    NewUnfinishedBlock = 5,
    NewSignagePoint = 6,
    RequestBlock = 7,
    RespondBlock = 8,
    RequestBlocks = 9,
    RespondBlocks = 10,
    RequestWeightProof = 11,
    RespondWeightProof = 12,
    Subscribe = 13,
    RespondSubscription = 14,
    RequestPeers = 15,
    RespondPeers = 16,
    Reject = 17,
}

impl MessageType {
    pub fn from_u8(b: u8) -> Option<Self> {
        use MessageType::*;
        Some(match b {
            0 => Handshake,
            1 => Ping,
            2 => Pong,
            3 => NewPeak,
            4 => NewTransaction,
            5 => NewUnfinishedBlock,
            6 => NewSignagePoint,
            7 => RequestBlock,
            8 => RespondBlock,
            9 => RequestBlocks,
            10 => RespondBlocks,
            11 => RequestWeightProof,
            12 => RespondWeightProof,
            13 => Subscribe,
            14 => RespondSubscription,
            15 => RequestPeers,
            16 => RespondPeers,
            17 => Reject,
            _ => return None,
        })
    }
}

#[derive(Clone, Debug)]
pub struct Handshake {
    pub protocol_version: u32,
    pub network_magic: [u8; 4],
    pub node_id: Hash256,
    pub capabilities: Vec<String>,
}

#[derive(Clone, Debug)]
pub enum Message {
    Handshake(Handshake),
    Ping { nonce: u64 },
    Pong { nonce: u64 },
    NewPeak { header_hash: Hash256, height: u32, weight: u128 },
    NewTransaction { bundle: SpendBundle },
    NewUnfinishedBlock { block: UnfinishedBlock },
    NewSignagePoint { signage_point: SignagePoint },
    RequestBlock { header_hash: Hash256 },
    RespondBlock { block: Option<FullBlock> },
    RequestBlocks { start_height: u32, end_height: u32 },
    RespondBlocks { headers: Vec<BlockHeader> },
    RequestWeightProof { tip_header_hash: Hash256 },
    RespondWeightProof {
        summaries: Vec<SubEpochSummary>,
        sampled_headers: Vec<BlockHeader>,
    },
    Subscribe { puzzle_hashes: Vec<Hash256>, coin_ids: Vec<Hash256> },
    RespondSubscription {
        records: Vec<CoinRecord>,
        is_final_page: bool,
    },
    RequestPeers,
    RespondPeers { addresses: Vec<String> },
    Reject { reason: String },
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Handshake(_) => MessageType::Handshake,
            Message::Ping { .. } => MessageType::Ping,
            Message::Pong { .. } => MessageType::Pong,
            Message::NewPeak { .. } => MessageType::NewPeak,
            Message::NewTransaction { .. } => MessageType::NewTransaction,
            Message::NewUnfinishedBlock { .. } => MessageType::NewUnfinishedBlock,
            Message::NewSignagePoint { .. } => MessageType::NewSignagePoint,
            Message::RequestBlock { .. } => MessageType::RequestBlock,
            Message::RespondBlock { .. } => MessageType::RespondBlock,
            Message::RequestBlocks { .. } => MessageType::RequestBlocks,
            Message::RespondBlocks { .. } => MessageType::RespondBlocks,
            Message::RequestWeightProof { .. } => MessageType::RequestWeightProof,
            Message::RespondWeightProof { .. } => MessageType::RespondWeightProof,
            Message::Subscribe { .. } => MessageType::Subscribe,
            Message::RespondSubscription { .. } => MessageType::RespondSubscription,
            Message::RequestPeers => MessageType::RequestPeers,
            Message::RespondPeers { .. } => MessageType::RespondPeers,
            Message::Reject { .. } => MessageType::Reject,
        }
    }

    pub fn to_bytes_vec(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Message::Handshake(h) => {
                h.protocol_version.to_bytes(&mut out);
                out.extend_from_slice(&h.network_magic);
                h.node_id.to_bytes(&mut out);
                h.capabilities.to_bytes(&mut out);
            }
            Message::Ping { nonce } => nonce.to_bytes(&mut out),
            Message::Pong { nonce } => nonce.to_bytes(&mut out),
            Message::NewPeak { header_hash, height, weight } => {
                header_hash.to_bytes(&mut out);
                height.to_bytes(&mut out);
                weight.to_bytes(&mut out);
            }
            Message::NewTransaction { bundle } => bundle.to_bytes(&mut out),
            Message::NewUnfinishedBlock { block } => encode_bincode(block, &mut out),
            Message::NewSignagePoint { signage_point } => encode_bincode(signage_point, &mut out),
            Message::RequestBlock { header_hash } => header_hash.to_bytes(&mut out),
            Message::RespondBlock { block } => encode_bincode(block, &mut out),
            Message::RequestBlocks { start_height, end_height } => {
                start_height.to_bytes(&mut out);
                end_height.to_bytes(&mut out);
            }
            Message::RespondBlocks { headers } => encode_bincode(headers, &mut out),
            Message::RequestWeightProof { tip_header_hash } => tip_header_hash.to_bytes(&mut out),
            Message::RespondWeightProof { summaries, sampled_headers } => {
                summaries.to_bytes(&mut out);
                encode_bincode(sampled_headers, &mut out);
            }
            Message::Subscribe { puzzle_hashes, coin_ids } => {
                puzzle_hashes.to_bytes(&mut out);
                coin_ids.to_bytes(&mut out);
            }
            Message::RespondSubscription { records, is_final_page } => {
                encode_bincode(records, &mut out);
                is_final_page.to_bytes(&mut out);
            }
            Message::RequestPeers => {}
            Message::RespondPeers { addresses } => addresses.to_bytes(&mut out),
            Message::Reject { reason } => reason.to_bytes(&mut out),
        }
        out
    }

    pub fn decode(message_type: MessageType, payload: &[u8]) -> Result<Self, PeerError> {
        let msg = match message_type {
            MessageType::Handshake => {
                let (protocol_version, buf) = u32::from_bytes(payload)?;
                let (network_magic, buf) = <[u8; 4]>::from_bytes_padded(buf)?;
                let (node_id, buf) = Hash256::from_bytes(buf)?;
                let (capabilities, buf) = Vec::<String>::from_bytes(buf)?;
                reject_trailing(buf)?;
                Message::Handshake(Handshake {
                    protocol_version,
                    network_magic,
                    node_id,
                    capabilities,
                })
            }
            MessageType::Ping => {
                let nonce = crate::codec::decode_exact::<u64>(payload)?;
                Message::Ping { nonce }
            }
            MessageType::Pong => {
                let nonce = crate::codec::decode_exact::<u64>(payload)?;
                Message::Pong { nonce }
            }
            MessageType::NewPeak => {
                let (header_hash, buf) = Hash256::from_bytes(payload)?;
                let (height, buf) = u32::from_bytes(buf)?;
                let (weight, buf) = u128::from_bytes(buf)?;
                reject_trailing(buf)?;
                Message::NewPeak { header_hash, height, weight }
            }
            MessageType::NewTransaction => {
                let bundle = crate::codec::decode_exact::<SpendBundle>(payload)?;
                Message::NewTransaction { bundle }
            }
            MessageType::NewUnfinishedBlock => Message::NewUnfinishedBlock {
                block: decode_bincode(payload)?,
            },
            MessageType::NewSignagePoint => Message::NewSignagePoint {
                signage_point: decode_bincode(payload)?,
            },
            MessageType::RequestBlock => {
                let header_hash = crate::codec::decode_exact::<Hash256>(payload)?;
                Message::RequestBlock { header_hash }
            }
            MessageType::RespondBlock => Message::RespondBlock {
                block: decode_bincode(payload)?,
            },
            MessageType::RequestBlocks => {
                let (start_height, buf) = u32::from_bytes(payload)?;
                let (end_height, buf) = u32::from_bytes(buf)?;
                reject_trailing(buf)?;
                Message::RequestBlocks { start_height, end_height }
            }
            MessageType::RespondBlocks => Message::RespondBlocks {
                headers: decode_bincode(payload)?,
            },
            MessageType::RequestWeightProof => {
                let tip_header_hash = crate::codec::decode_exact::<Hash256>(payload)?;
                Message::RequestWeightProof { tip_header_hash }
            }
            MessageType::RespondWeightProof => {
                let (summaries, buf) = Vec::<SubEpochSummary>::from_bytes(payload)?;
                let sampled_headers = decode_bincode(buf)?;
                Message::RespondWeightProof { summaries, sampled_headers }
            }
            MessageType::Subscribe => {
                let (puzzle_hashes, buf) = Vec::<Hash256>::from_bytes(payload)?;
                let (coin_ids, buf) = Vec::<Hash256>::from_bytes(buf)?;
                reject_trailing(buf)?;
                Message::Subscribe { puzzle_hashes, coin_ids }
            }
            MessageType::RespondSubscription => {
                let (records_bytes_len, buf) = u32::from_bytes(payload)?;
                if buf.len() < records_bytes_len as usize {
                    return Err(PeerError::Codec(CodecError::UnexpectedEof {
                        needed: records_bytes_len as usize - buf.len(),
                    }));
                }
                let (head, rest) = buf.split_at(records_bytes_len as usize);
                let records: Vec<CoinRecord> = decode_bincode(head)?;
                let (is_final_page, rest) = bool::from_bytes(rest)?;
                reject_trailing(rest)?;
                Message::RespondSubscription { records, is_final_page }
            }
            MessageType::RequestPeers => {
                reject_trailing(payload)?;
                Message::RequestPeers
            }
            MessageType::RespondPeers => {
                let addresses = crate::codec::decode_exact::<Vec<String>>(payload)?;
                Message::RespondPeers { addresses }
            }
            MessageType::Reject => {
                let reason = crate::codec::decode_exact::<String>(payload)?;
                Message::Reject { reason }
            }
        };
        Ok(msg)
    }
}

/// `RespondSubscription`'s encoder writes a length-prefixed bincode blob so
/// `decode` can split it back out before handing the tail to `bool`.
fn encode_bincode<T: serde::Serialize>(value: &T, out: &mut Vec<u8>) {
    let bytes = bincode::serialize(value).expect("in-memory message types always serialize");
    (bytes.len() as u32).to_bytes(out);
    out.extend_from_slice(&bytes);
}

fn decode_bincode<T: serde::de::DeserializeOwned>(buf: &[u8]) -> Result<T, PeerError> {
    let (len, buf) = u32::from_bytes(buf)?;
    if buf.len() < len as usize {
        return Err(PeerError::Codec(CodecError::UnexpectedEof {
            needed: len as usize - buf.len(),
        }));
    }
    let (head, _) = buf.split_at(len as usize);
    bincode::deserialize(head)
        .map_err(|e| PeerError::HandshakeFailed(format!("bincode payload decode failed: {e}")))
}

fn reject_trailing(buf: &[u8]) -> Result<(), PeerError> {
    if buf.is_empty() {
        Ok(())
    } else {
        Err(PeerError::Codec(CodecError::TrailingBytes))
    }
}

trait FixedBytes: Sized {
    fn from_bytes_padded(buf: &[u8]) -> Result<(Self, &[u8]), CodecError>;
}

impl FixedBytes for [u8; 4] {
    fn from_bytes_padded(buf: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        if buf.len() < 4 {
            return Err(CodecError::UnexpectedEof { needed: 4 - buf.len() });
        }
        let (head, rest) = buf.split_at(4);
        let mut out = [0u8; 4];
        out.copy_from_slice(head);
        Ok((out, rest))
    }
}

impl From<PeerError> for CodecError {
    fn from(_: PeerError) -> Self {
        CodecError::InvalidTag(0)
    }
}

impl From<CodecError> for PeerError {
    fn from(e: CodecError) -> Self {
        PeerError::Codec(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_peak_round_trips() {
        let msg = Message::NewPeak {
            header_hash: [1u8; 32],
            height: 100,
            weight: 12345,
        };
        let bytes = msg.to_bytes_vec();
        let decoded = Message::decode(msg.message_type(), &bytes).unwrap();
        match decoded {
            Message::NewPeak { header_hash, height, weight } => {
                assert_eq!(header_hash, [1u8; 32]);
                assert_eq!(height, 100);
                assert_eq!(weight, 12345);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn request_blocks_round_trips() {
        let msg = Message::RequestBlocks { start_height: 10, end_height: 20 };
        let bytes = msg.to_bytes_vec();
        let decoded = Message::decode(msg.message_type(), &bytes).unwrap();
        match decoded {
            Message::RequestBlocks { start_height, end_height } => {
                assert_eq!(start_height, 10);
                assert_eq!(end_height, 20);
            }
            _ => panic!("wrong variant"),
        }
    }
}
