//! Transaction record model.
//!
//! # Responsibility
//! - Define the canonical transaction shape persisted by the repository.
//! - Provide the content-derived `TxId` used as the storage primary key.
//! - Enforce structural invariants before any write path touches SQL.
//!
//! # Invariants
//! - Equal logical transactions always produce equal canonical bytes, so
//!   `TxId` identity never depends on insertion order.
//! - `validate()` must pass before a record reaches a persistence backend.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Upper bound on total spendable value, in satoshis.
pub const MAX_VALUE_SATS: u64 = 21_000_000 * 100_000_000;

/// Content-derived transaction identifier.
///
/// A `TxId` is the double-SHA-256 digest of a transaction's canonical
/// encoding. Its textual form (SQL key, logs, display) is lowercase hex.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TxId([u8; 32]);

impl TxId {
    /// Byte length of every transaction id.
    pub const LEN: usize = 32;

    /// The all-zero id used by coinbase-style previous-output references.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Wraps raw digest bytes without re-hashing.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Computes the id for a canonical byte encoding.
    pub fn digest(data: &[u8]) -> Self {
        let first = Sha256::digest(data);
        let second = Sha256::digest(first);
        Self(second.into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Display for TxId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for TxId {
    type Err = TxIdParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let decoded = hex::decode(value.trim()).map_err(TxIdParseError::InvalidHex)?;
        let bytes: [u8; 32] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| TxIdParseError::InvalidLength {
                expected: Self::LEN,
                actual: decoded.len(),
            })?;
        Ok(Self(bytes))
    }
}

/// Parse failure for the textual (hex) id form.
#[derive(Debug)]
pub enum TxIdParseError {
    InvalidHex(hex::FromHexError),
    InvalidLength { expected: usize, actual: usize },
}

impl Display for TxIdParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidHex(err) => write!(f, "txid is not valid hex: {err}"),
            Self::InvalidLength { expected, actual } => {
                write!(f, "txid must be {expected} bytes, got {actual}")
            }
        }
    }
}

impl Error for TxIdParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidHex(err) => Some(err),
            Self::InvalidLength { .. } => None,
        }
    }
}

/// Reference to the output being spent by an input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxnInput {
    /// Id of the transaction holding the spent output.
    pub prev_txid: TxId,
    /// Output position inside that transaction.
    pub prev_index: u32,
    /// Unlock script satisfying the spent output's conditions.
    pub script_sig: Vec<u8>,
    /// Relative-locking sequence field.
    pub sequence: u32,
}

/// Newly created spendable output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxnOutput {
    /// Amount in satoshis.
    pub value_sats: u64,
    /// Lock script encumbering the amount.
    pub script_pubkey: Vec<u8>,
}

/// Canonical wallet transaction record.
///
/// Field order is part of the canonical encoding; changing it changes every
/// derived `TxId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Txn {
    /// Format version of the record.
    pub version: u32,
    /// Outputs consumed by this transaction.
    pub inputs: Vec<TxnInput>,
    /// Outputs created by this transaction.
    pub outputs: Vec<TxnOutput>,
    /// Earliest time/height at which the transaction is final.
    pub lock_time: u32,
}

impl Txn {
    /// Creates an empty transaction shell with the given format version.
    pub fn new(version: u32) -> Self {
        Self {
            version,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
        }
    }

    /// Returns whether this is a coinbase-style transaction: a single input
    /// spending the null outpoint.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1
            && self.inputs[0].prev_txid == TxId::ZERO
            && self.inputs[0].prev_index == u32::MAX
    }

    /// Checks structural invariants required before persistence.
    ///
    /// # Errors
    /// - [`TxnValidationError::NoOutputs`] when the transaction creates
    ///   nothing spendable.
    /// - [`TxnValidationError::DuplicateInput`] when the same outpoint is
    ///   consumed twice.
    /// - [`TxnValidationError::ValueOverflow`] when outputs exceed
    ///   [`MAX_VALUE_SATS`] in total.
    pub fn validate(&self) -> Result<(), TxnValidationError> {
        if self.outputs.is_empty() {
            return Err(TxnValidationError::NoOutputs);
        }

        for (position, input) in self.inputs.iter().enumerate() {
            let repeated = self.inputs[..position]
                .iter()
                .any(|earlier| {
                    earlier.prev_txid == input.prev_txid
                        && earlier.prev_index == input.prev_index
                });
            if repeated {
                return Err(TxnValidationError::DuplicateInput {
                    prev_txid: input.prev_txid,
                    prev_index: input.prev_index,
                });
            }
        }

        let total_sats: u128 = self
            .outputs
            .iter()
            .map(|output| u128::from(output.value_sats))
            .sum();
        if total_sats > u128::from(MAX_VALUE_SATS) {
            return Err(TxnValidationError::ValueOverflow { total_sats });
        }

        Ok(())
    }
}

/// Structural validation failure for a transaction record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxnValidationError {
    NoOutputs,
    DuplicateInput { prev_txid: TxId, prev_index: u32 },
    ValueOverflow { total_sats: u128 },
}

impl Display for TxnValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoOutputs => write!(f, "transaction has no outputs"),
            Self::DuplicateInput {
                prev_txid,
                prev_index,
            } => write!(
                f,
                "outpoint {prev_txid}:{prev_index} is spent more than once"
            ),
            Self::ValueOverflow { total_sats } => write!(
                f,
                "total output value {total_sats} exceeds {MAX_VALUE_SATS} sats"
            ),
        }
    }
}

impl Error for TxnValidationError {}

#[cfg(test)]
mod tests {
    use super::{Txn, TxnInput, TxnOutput, TxId, TxnValidationError, MAX_VALUE_SATS};
    use std::str::FromStr;

    fn spendable_output(value_sats: u64) -> TxnOutput {
        TxnOutput {
            value_sats,
            script_pubkey: vec![0x76, 0xa9],
        }
    }

    fn input_at(prev_txid: TxId, prev_index: u32) -> TxnInput {
        TxnInput {
            prev_txid,
            prev_index,
            script_sig: vec![0x01],
            sequence: u32::MAX,
        }
    }

    #[test]
    fn txid_hex_roundtrip() {
        let id = TxId::digest(b"canonical bytes");
        let text = id.to_string();
        assert_eq!(text.len(), 64);
        assert_eq!(TxId::from_str(&text).unwrap(), id);
    }

    #[test]
    fn txid_rejects_bad_length_and_bad_hex() {
        assert!(matches!(
            TxId::from_str("abcd"),
            Err(super::TxIdParseError::InvalidLength {
                expected: 32,
                actual: 2
            })
        ));
        assert!(matches!(
            TxId::from_str("zz"),
            Err(super::TxIdParseError::InvalidHex(_))
        ));
    }

    #[test]
    fn digest_is_deterministic_and_content_sensitive() {
        assert_eq!(TxId::digest(b"same"), TxId::digest(b"same"));
        assert_ne!(TxId::digest(b"same"), TxId::digest(b"different"));
    }

    #[test]
    fn validate_accepts_simple_spend() {
        let mut txn = Txn::new(1);
        txn.inputs.push(input_at(TxId::digest(b"funding"), 0));
        txn.outputs.push(spendable_output(50_000));
        assert!(txn.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_outputs() {
        let txn = Txn::new(1);
        assert_eq!(txn.validate(), Err(TxnValidationError::NoOutputs));
    }

    #[test]
    fn validate_rejects_duplicate_outpoint() {
        let funding = TxId::digest(b"funding");
        let mut txn = Txn::new(1);
        txn.inputs.push(input_at(funding, 3));
        txn.inputs.push(input_at(funding, 3));
        txn.outputs.push(spendable_output(1));

        assert!(matches!(
            txn.validate(),
            Err(TxnValidationError::DuplicateInput { prev_index: 3, .. })
        ));
    }

    #[test]
    fn validate_rejects_value_overflow() {
        let mut txn = Txn::new(1);
        txn.outputs.push(spendable_output(MAX_VALUE_SATS));
        txn.outputs.push(spendable_output(1));

        assert!(matches!(
            txn.validate(),
            Err(TxnValidationError::ValueOverflow { .. })
        ));
    }

    #[test]
    fn coinbase_detection_requires_null_outpoint() {
        let mut coinbase = Txn::new(1);
        coinbase.inputs.push(input_at(TxId::ZERO, u32::MAX));
        coinbase.outputs.push(spendable_output(5_000_000_000));
        assert!(coinbase.is_coinbase());

        let mut spend = Txn::new(1);
        spend.inputs.push(input_at(TxId::digest(b"real"), 0));
        spend.outputs.push(spendable_output(1));
        assert!(!spend.is_coinbase());
    }

    #[test]
    fn serde_json_shape_is_stable() {
        let mut txn = Txn::new(2);
        txn.outputs.push(spendable_output(42));
        let json = serde_json::to_string(&txn).unwrap();
        let back: Txn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, txn);
    }
}
