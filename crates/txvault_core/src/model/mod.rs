//! Domain model for stored wallet transactions.
//!
//! # Responsibility
//! - Define the canonical transaction record and its content-derived id.
//! - Keep one storage shape shared by every persistence backend.
//!
//! # Invariants
//! - A transaction's identity is its `TxId`, derived from canonical bytes.
//! - Records are immutable once written; there is no in-place mutation.

pub mod txn;
