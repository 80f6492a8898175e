//! In-memory transaction store.
//!
//! Intended for tests and embedding. Rows are held in a `HashMap` behind the
//! same shared/exclusive lock discipline as the SQLite store, so concurrent
//! readers never observe a half-written row.

use crate::codec::{CanonicalCodec, TxnCodec};
use crate::model::txn::{TxId, Txn};
use crate::repo::txn_repo::{decode_verified, StoreError, StoreResult, TxnStore};
use log::warn;
use std::collections::HashMap;
use std::sync::RwLock;

/// `HashMap`-backed [`TxnStore`] implementation.
///
/// Stores the same `(txid, bytes)` rows the SQLite store persists, so codec
/// behavior (including corrupt-row skipping) is identical across backends.
pub struct MemoryTxnStore<C: TxnCodec = CanonicalCodec> {
    rows: RwLock<HashMap<TxId, Vec<u8>>>,
    codec: C,
}

impl MemoryTxnStore<CanonicalCodec> {
    /// Creates an empty store using the shipped canonical codec.
    pub fn new() -> Self {
        Self::with_codec(CanonicalCodec)
    }
}

impl Default for MemoryTxnStore<CanonicalCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: TxnCodec> MemoryTxnStore<C> {
    /// Creates an empty store with a caller-provided codec.
    pub fn with_codec(codec: C) -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            codec,
        }
    }

    /// Number of rows currently stored.
    pub fn len(&self) -> usize {
        self.rows.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().expect("lock poisoned").is_empty()
    }

    /// Removes every row.
    pub fn clear(&self) {
        self.rows.write().expect("lock poisoned").clear();
    }
}

impl<C: TxnCodec> TxnStore for MemoryTxnStore<C> {
    fn put(&self, txn: &Txn) -> StoreResult<TxId> {
        txn.validate()?;
        let id = self.codec.txid(txn).map_err(StoreError::Encode)?;
        let raw = self.codec.encode(txn).map_err(StoreError::Encode)?;

        let mut rows = self.rows.write().expect("lock poisoned");
        if rows.contains_key(&id) {
            return Err(StoreError::KeyConflict(id));
        }
        rows.insert(id, raw);
        Ok(id)
    }

    fn get(&self, id: TxId) -> StoreResult<Txn> {
        let raw = {
            let rows = self.rows.read().expect("lock poisoned");
            rows.get(&id).cloned()
        };
        let raw = raw.ok_or(StoreError::NotFound(id))?;
        decode_verified(&self.codec, id, &raw)
    }

    fn get_all(&self) -> StoreResult<Vec<Txn>> {
        let rows = self.rows.read().expect("lock poisoned");
        let mut txns = Vec::with_capacity(rows.len());
        for (id, raw) in rows.iter() {
            match decode_verified(&self.codec, *id, raw) {
                Ok(txn) => txns.push(txn),
                Err(err) => {
                    warn!("event=txn_scan module=repo status=skip txid={id} error={err}");
                }
            }
        }
        Ok(txns)
    }

    fn delete(&self, id: TxId) -> StoreResult<()> {
        self.rows.write().expect("lock poisoned").remove(&id);
        Ok(())
    }
}

impl<C: TxnCodec> std::fmt::Debug for MemoryTxnStore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTxnStore")
            .field("row_count", &self.len())
            .finish()
    }
}
