//! Transaction store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide the keyed CRUD API over the canonical `txns` table.
//! - Guard the single backing connection with a shared/exclusive lock:
//!   writes are exclusive, reads run in shared mode.
//!
//! # Invariants
//! - `put` runs inside one unit of work; every exit other than a successful
//!   commit rolls the insert back.
//! - A persisted row's bytes always re-derive to the `txid` keying the row;
//!   reads verify this instead of trusting the stored key.
//! - Inserting an already-present id is a conflict, never an overwrite.

use crate::codec::{CodecError, TxnCodec};
use crate::db::migrations;
use crate::model::txn::{TxId, Txn, TxnValidationError};
use log::{debug, info, warn};
use rusqlite::{Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::RwLock;
use std::time::Instant;

const INSERT_TXN_SQL: &str = "INSERT INTO txns (txid, raw) VALUES (?1, ?2);";
const SELECT_TXN_SQL: &str = "SELECT raw FROM txns WHERE txid = ?1;";
const SELECT_ALL_TXNS_SQL: &str = "SELECT txid, raw FROM txns;";
const DELETE_TXN_SQL: &str = "DELETE FROM txns WHERE txid = ?1;";

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure surfaced by a transaction store operation.
///
/// Backend-transport variants carry string payloads so every `TxnStore`
/// implementation (SQLite or in-memory) can construct them.
#[derive(Debug)]
pub enum StoreError {
    /// The backing handle was unusable or a unit of work could not begin.
    Connection(String),
    /// A statement could not be prepared.
    Statement(String),
    /// Executing an insert, delete, or commit failed.
    Execution(String),
    /// An insert collided with an already-stored id.
    KeyConflict(TxId),
    /// No row exists for the requested id.
    NotFound(TxId),
    /// The record could not be canonically encoded.
    Encode(CodecError),
    /// Stored bytes failed to decode, or re-derived to a different id.
    Decode(CodecError),
    /// The record failed structural validation before write.
    Validation(TxnValidationError),
    /// The connection's schema migrations were never applied.
    SchemaNotApplied {
        expected_version: u32,
        actual_version: u32,
    },
    /// A table the store requires is absent.
    MissingTable(&'static str),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection(detail) => write!(f, "store connection failed: {detail}"),
            Self::Statement(detail) => write!(f, "statement preparation failed: {detail}"),
            Self::Execution(detail) => write!(f, "statement execution failed: {detail}"),
            Self::KeyConflict(id) => write!(f, "transaction {id} is already stored"),
            Self::NotFound(id) => write!(f, "transaction not found: {id}"),
            Self::Encode(err) => write!(f, "{err}"),
            Self::Decode(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::SchemaNotApplied {
                expected_version,
                actual_version,
            } => write!(
                f,
                "schema version {actual_version} is behind required {expected_version}; \
                 open the database through db::open_db first"
            ),
            Self::MissingTable(table) => write!(f, "required table `{table}` is missing"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Encode(err) | Self::Decode(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TxnValidationError> for StoreError {
    fn from(value: TxnValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Keyed persistence contract for transaction records.
///
/// All operations block until the store's lock is available; none retry
/// internally, and every failure is surfaced to the caller immediately.
pub trait TxnStore {
    /// Persists a record and returns its content-derived id.
    fn put(&self, txn: &Txn) -> StoreResult<TxId>;

    /// Loads the unique record whose canonical encoding hashes to `id`.
    fn get(&self, id: TxId) -> StoreResult<Txn>;

    /// Loads every stored record, skipping rows that fail to decode.
    fn get_all(&self) -> StoreResult<Vec<Txn>>;

    /// Removes the record with the given id. Deleting an absent id is not
    /// an error.
    fn delete(&self, id: TxId) -> StoreResult<()>;
}

/// Decodes stored bytes and verifies they still derive the expected id.
pub(crate) fn decode_verified<C: TxnCodec>(
    codec: &C,
    expected: TxId,
    raw: &[u8],
) -> StoreResult<Txn> {
    let txn = codec.decode(raw).map_err(StoreError::Decode)?;
    let derived = codec.txid(&txn).map_err(StoreError::Encode)?;
    if derived != expected {
        return Err(StoreError::Decode(CodecError::Decode(format!(
            "stored bytes re-derive to {derived}, expected {expected}"
        ))));
    }
    Ok(txn)
}

/// SQLite-backed transaction store.
///
/// Owns the backing connection behind a `RwLock`: `put`/`delete` take the
/// lock exclusively, `get`/`get_all` in shared mode. The lock is whole-store
/// on purpose; there is a single underlying connection to protect.
pub struct SqliteTxnStore<C: TxnCodec> {
    conn: RwLock<Connection>,
    codec: C,
}

impl<C: TxnCodec> SqliteTxnStore<C> {
    /// Wraps a migrated connection, refusing one whose schema is not ready.
    ///
    /// # Errors
    /// - [`StoreError::SchemaNotApplied`] when `PRAGMA user_version` is
    ///   behind this binary's latest migration.
    /// - [`StoreError::MissingTable`] when the `txns` table is absent.
    pub fn try_new(conn: Connection, codec: C) -> StoreResult<Self> {
        let actual_version: u32 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .map_err(|err| StoreError::Connection(err.to_string()))?;
        let expected_version = migrations::latest_version();
        if actual_version < expected_version {
            return Err(StoreError::SchemaNotApplied {
                expected_version,
                actual_version,
            });
        }

        let table_present: i64 = conn
            .query_row(
                "SELECT EXISTS(
                    SELECT 1
                    FROM sqlite_master
                    WHERE type = 'table' AND name = 'txns'
                );",
                [],
                |row| row.get(0),
            )
            .map_err(|err| StoreError::Connection(err.to_string()))?;
        if table_present == 0 {
            return Err(StoreError::MissingTable("txns"));
        }

        Ok(Self {
            conn: RwLock::new(conn),
            codec,
        })
    }
}

impl<C: TxnCodec> TxnStore for SqliteTxnStore<C> {
    fn put(&self, txn: &Txn) -> StoreResult<TxId> {
        txn.validate()?;
        let id = self.codec.txid(txn).map_err(StoreError::Encode)?;
        let raw = self.codec.encode(txn).map_err(StoreError::Encode)?;

        let started_at = Instant::now();
        let mut conn = self.conn.write().expect("lock poisoned");
        let tx = conn
            .transaction()
            .map_err(|err| StoreError::Connection(err.to_string()))?;
        {
            let mut stmt = tx
                .prepare(INSERT_TXN_SQL)
                .map_err(|err| StoreError::Statement(err.to_string()))?;
            stmt.execute(rusqlite::params![id.to_string(), raw])
                .map_err(|err| classify_insert_error(id, err))?;
        }
        // Dropping an uncommitted `Transaction` rolls it back, so every
        // early return above leaves the table untouched.
        tx.commit()
            .map_err(|err| StoreError::Execution(err.to_string()))?;

        info!(
            "event=txn_put module=repo status=ok txid={id} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(id)
    }

    fn get(&self, id: TxId) -> StoreResult<Txn> {
        let conn = self.conn.read().expect("lock poisoned");
        let mut stmt = conn
            .prepare(SELECT_TXN_SQL)
            .map_err(|err| StoreError::Statement(err.to_string()))?;
        let raw: Option<Vec<u8>> = stmt
            .query_row([id.to_string()], |row| row.get(0))
            .optional()
            .map_err(|err| StoreError::Execution(err.to_string()))?;

        let raw = raw.ok_or(StoreError::NotFound(id))?;
        decode_verified(&self.codec, id, &raw)
    }

    fn get_all(&self) -> StoreResult<Vec<Txn>> {
        let started_at = Instant::now();
        let conn = self.conn.read().expect("lock poisoned");
        let mut stmt = conn
            .prepare(SELECT_ALL_TXNS_SQL)
            .map_err(|err| StoreError::Statement(err.to_string()))?;
        let mut rows = stmt
            .query([])
            .map_err(|err| StoreError::Execution(err.to_string()))?;

        let mut txns = Vec::new();
        let mut skipped = 0usize;
        while let Some(row) = rows
            .next()
            .map_err(|err| StoreError::Execution(err.to_string()))?
        {
            let key: String = row
                .get(0)
                .map_err(|err| StoreError::Execution(err.to_string()))?;
            let raw: Vec<u8> = row
                .get(1)
                .map_err(|err| StoreError::Execution(err.to_string()))?;

            let parsed = key
                .parse::<TxId>()
                .map_err(|err| CodecError::Decode(err.to_string()));
            match parsed.map_err(StoreError::Decode).and_then(|expected| {
                decode_verified(&self.codec, expected, &raw)
            }) {
                Ok(txn) => txns.push(txn),
                Err(err) => {
                    warn!("event=txn_scan module=repo status=skip txid={key} error={err}");
                    skipped += 1;
                }
            }
        }

        debug!(
            "event=txn_scan module=repo status=ok count={} skipped={skipped} duration_ms={}",
            txns.len(),
            started_at.elapsed().as_millis()
        );
        Ok(txns)
    }

    fn delete(&self, id: TxId) -> StoreResult<()> {
        let started_at = Instant::now();
        let conn = self.conn.write().expect("lock poisoned");
        let changed = conn
            .execute(DELETE_TXN_SQL, [id.to_string()])
            .map_err(|err| StoreError::Execution(err.to_string()))?;

        info!(
            "event=txn_delete module=repo status=ok txid={id} removed={} duration_ms={}",
            changed > 0,
            started_at.elapsed().as_millis()
        );
        Ok(())
    }
}

fn classify_insert_error(id: TxId, err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(failure, _) = &err {
        if failure.code == rusqlite::ErrorCode::ConstraintViolation {
            return StoreError::KeyConflict(id);
        }
    }
    StoreError::Execution(err.to_string())
}
