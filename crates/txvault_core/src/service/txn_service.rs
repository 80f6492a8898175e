//! Transaction use-case service.
//!
//! # Responsibility
//! - Provide stable entry points for callers that record and replay
//!   transactions.
//! - Delegate persistence to repository implementations.
//!
//! # Invariants
//! - Service APIs never bypass repository validation or the insert-only
//!   write contract.

use crate::model::txn::{TxId, Txn};
use crate::repo::txn_repo::{StoreError, StoreResult, TxnStore};

/// Use-case wrapper over a transaction store.
pub struct TxnService<S: TxnStore> {
    store: S,
}

impl<S: TxnStore> TxnService<S> {
    /// Creates a service using the provided store implementation.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Persists a record and returns its content-derived id.
    pub fn put(&self, txn: &Txn) -> StoreResult<TxId> {
        self.store.put(txn)
    }

    /// Persists a record, treating an identical already-stored record as
    /// success.
    ///
    /// # Contract
    /// - Identity is by content hash, so a key conflict can only come from a
    ///   byte-identical canonical encoding; reinserting it is a no-op.
    /// - Every other failure propagates unchanged.
    pub fn ensure(&self, txn: &Txn) -> StoreResult<TxId> {
        match self.store.put(txn) {
            Ok(id) => Ok(id),
            Err(StoreError::KeyConflict(id)) => Ok(id),
            Err(err) => Err(err),
        }
    }

    /// Loads one record by id.
    pub fn get(&self, id: TxId) -> StoreResult<Txn> {
        self.store.get(id)
    }

    /// Loads every stored record that decodes cleanly.
    pub fn get_all(&self) -> StoreResult<Vec<Txn>> {
        self.store.get_all()
    }

    /// Removes one record by id; absent ids are not an error.
    pub fn delete(&self, id: TxId) -> StoreResult<()> {
        self.store.delete(id)
    }
}
