//! Canonical binary encoding used for identity hashing and the wire protocol.
//!
//! Rules (spec §6): integers big-endian fixed width, byte strings and
//! sequences `u32`-length-prefixed, options a one-byte discriminant,
//! tagged unions a one-byte tag followed by the variant's encoding, hashes
//! bare 32 bytes. This mirrors the shape of `chia_streamable_macro` in the
//! reference pack, hand-written the way the teacher hand-writes its own
//! wire types in `network/message.rs` rather than generated by a derive
//! macro.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of input, expected at least {needed} more byte(s)")]
    UnexpectedEof { needed: usize },
    #[error("sequence or byte string length {0} exceeds the protocol limit")]
    LengthLimitExceeded(u32),
    #[error("invalid tagged union discriminant: {0}")]
    InvalidTag(u8),
    #[error("trailing bytes after decoding a value")]
    TrailingBytes,
}

/// Sequences/byte strings longer than this are always rejected, independent
/// of the overall frame size limit enforced by `network::wire`.
pub const MAX_LENGTH_PREFIX: u32 = 64 * 1024 * 1024;

/// A cursor over an encode target. Kept trivial — `Vec<u8>` already implements
/// everything `ToBytes` needs via `extend_from_slice`.
pub trait ToBytes {
    fn to_bytes(&self, out: &mut Vec<u8>);

    fn to_bytes_vec(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.to_bytes(&mut out);
        out
    }
}

pub trait FromBytes: Sized {
    /// Decodes `Self` from the front of `buf`, returning the remaining slice.
    fn from_bytes(buf: &[u8]) -> Result<(Self, &[u8]), CodecError>;
}

fn take(buf: &[u8], n: usize) -> Result<(&[u8], &[u8]), CodecError> {
    if buf.len() < n {
        return Err(CodecError::UnexpectedEof {
            needed: n - buf.len(),
        });
    }
    Ok(buf.split_at(n))
}

macro_rules! impl_int {
    ($t:ty) => {
        impl ToBytes for $t {
            fn to_bytes(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_be_bytes());
            }
        }
        impl FromBytes for $t {
            fn from_bytes(buf: &[u8]) -> Result<(Self, &[u8]), CodecError> {
                let (head, rest) = take(buf, std::mem::size_of::<$t>())?;
                Ok((<$t>::from_be_bytes(head.try_into().unwrap()), rest))
            }
        }
    };
}

impl_int!(u8);
impl_int!(u16);
impl_int!(u32);
impl_int!(u64);
impl_int!(u128);
impl_int!(i32);
impl_int!(i64);

impl ToBytes for bool {
    fn to_bytes(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }
}

impl FromBytes for bool {
    fn from_bytes(buf: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (b, rest) = u8::from_bytes(buf)?;
        Ok((b != 0, rest))
    }
}

impl ToBytes for [u8; 32] {
    fn to_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }
}

impl FromBytes for [u8; 32] {
    fn from_bytes(buf: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (head, rest) = take(buf, 32)?;
        let mut hash = [0u8; 32];
        hash.copy_from_slice(head);
        Ok((hash, rest))
    }
}

impl ToBytes for Vec<u8> {
    fn to_bytes(&self, out: &mut Vec<u8>) {
        (self.len() as u32).to_bytes(out);
        out.extend_from_slice(self);
    }
}

impl FromBytes for Vec<u8> {
    fn from_bytes(buf: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (len, rest) = u32::from_bytes(buf)?;
        if len > MAX_LENGTH_PREFIX {
            return Err(CodecError::LengthLimitExceeded(len));
        }
        let (head, rest) = take(rest, len as usize)?;
        Ok((head.to_vec(), rest))
    }
}

impl<T: ToBytes> ToBytes for Vec<T> {
    fn to_bytes(&self, out: &mut Vec<u8>) {
        (self.len() as u32).to_bytes(out);
        for item in self {
            item.to_bytes(out);
        }
    }
}

impl<T: FromBytes> FromBytes for Vec<T> {
    fn from_bytes(buf: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (len, mut rest) = u32::from_bytes(buf)?;
        if len > MAX_LENGTH_PREFIX {
            return Err(CodecError::LengthLimitExceeded(len));
        }
        let mut items = Vec::with_capacity(len as usize);
        for _ in 0..len {
            let (item, tail) = T::from_bytes(rest)?;
            items.push(item);
            rest = tail;
        }
        Ok((items, rest))
    }
}

impl<T: ToBytes> ToBytes for Option<T> {
    fn to_bytes(&self, out: &mut Vec<u8>) {
        match self {
            None => out.push(0),
            Some(v) => {
                out.push(1);
                v.to_bytes(out);
            }
        }
    }
}

impl<T: FromBytes> FromBytes for Option<T> {
    fn from_bytes(buf: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (tag, rest) = u8::from_bytes(buf)?;
        match tag {
            0 => Ok((None, rest)),
            1 => {
                let (v, rest) = T::from_bytes(rest)?;
                Ok((Some(v), rest))
            }
            other => Err(CodecError::InvalidTag(other)),
        }
    }
}

impl ToBytes for String {
    fn to_bytes(&self, out: &mut Vec<u8>) {
        self.as_bytes().to_vec().to_bytes(out);
    }
}

impl FromBytes for String {
    fn from_bytes(buf: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (bytes, rest) = Vec::<u8>::from_bytes(buf)?;
        String::from_utf8(bytes)
            .map(|s| (s, rest))
            .map_err(|_| CodecError::InvalidTag(0))
    }
}

/// Decodes a full buffer into exactly one value, rejecting trailing bytes.
/// Every identity-bearing entity's `id()` hashes `encode_exact`'s output, so
/// this is the canonical top-level entry point used outside of framing.
pub fn decode_exact<T: FromBytes>(buf: &[u8]) -> Result<T, CodecError> {
    let (value, rest) = T::from_bytes(buf)?;
    if !rest.is_empty() {
        return Err(CodecError::TrailingBytes);
    }
    Ok(value)
}
