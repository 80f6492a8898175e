//! Canonical encode/decode capability for transaction records.
//!
//! # Responsibility
//! - Define the codec contract the repository layer depends on.
//! - Provide the shipped canonical implementation (fixed-layout binary
//!   encoding, double-SHA-256 id derivation).
//!
//! # Invariants
//! - `encode` is deterministic: equal records yield identical bytes.
//! - `txid` is always the digest of the canonical encoding, so ids derived
//!   before and after a store round-trip agree.

use crate::model::txn::{TxId, Txn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CodecResult<T> = Result<T, CodecError>;

/// Encode or decode failure.
///
/// Payloads are plain strings so alternative codecs (including test fakes)
/// can construct every variant without depending on this module's backend.
#[derive(Debug)]
pub enum CodecError {
    Encode(String),
    Decode(String),
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode(detail) => write!(f, "encode failed: {detail}"),
            Self::Decode(detail) => write!(f, "decode failed: {detail}"),
        }
    }
}

impl Error for CodecError {}

/// Injected serialization capability.
///
/// Implementations must keep `encode` deterministic and `decode` total over
/// whatever `encode` produces. The repository treats the byte form as opaque
/// and never inspects it beyond handing it back to `decode`.
pub trait TxnCodec {
    /// Produces the canonical byte encoding of a record.
    fn encode(&self, txn: &Txn) -> CodecResult<Vec<u8>>;

    /// Reconstructs a record from its canonical byte encoding.
    fn decode(&self, raw: &[u8]) -> CodecResult<Txn>;

    /// Derives the content id of a record from its canonical encoding.
    fn txid(&self, txn: &Txn) -> CodecResult<TxId> {
        Ok(TxId::digest(&self.encode(txn)?))
    }
}

/// Shipped canonical codec: bincode fixed-layout encoding.
///
/// Bincode's default configuration writes fixed-width integers in a stable
/// field order, which makes the encoding deterministic for a given record.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalCodec;

impl TxnCodec for CanonicalCodec {
    fn encode(&self, txn: &Txn) -> CodecResult<Vec<u8>> {
        bincode::serialize(txn).map_err(|err| CodecError::Encode(err.to_string()))
    }

    fn decode(&self, raw: &[u8]) -> CodecResult<Txn> {
        bincode::deserialize(raw).map_err(|err| CodecError::Decode(err.to_string()))
    }
}
