//! Durable content-addressed persistence for wallet transactions.
//! This crate is the single source of truth for the storage contract.

pub mod codec;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use codec::{CanonicalCodec, CodecError, CodecResult, TxnCodec};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::txn::{Txn, TxnInput, TxnOutput, TxId, TxnValidationError, MAX_VALUE_SATS};
pub use repo::memory::MemoryTxnStore;
pub use repo::txn_repo::{SqliteTxnStore, StoreError, StoreResult, TxnStore};
pub use service::txn_service::TxnService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
