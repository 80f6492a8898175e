//! Repository layer contracts and persistence implementations.
//!
//! # Responsibility
//! - Define the keyed store contract for transaction records.
//! - Isolate SQLite statement details from service orchestration.
//!
//! # Invariants
//! - Write paths enforce `Txn::validate()` before touching a backend.
//! - Read paths reject rows whose bytes no longer re-derive to their key
//!   instead of returning silently corrupt records.

pub mod memory;
pub mod txn_repo;
