use rusqlite::Connection;
use txvault_core::db::migrations::latest_version;
use txvault_core::db::{open_db, open_db_in_memory};
use txvault_core::{
    CanonicalCodec, SqliteTxnStore, StoreError, Txn, TxnCodec, TxnInput, TxnOutput, TxnService,
    TxnStore, TxId,
};

#[test]
fn put_then_get_roundtrip() {
    let store = memory_backed_store();

    let txn = spend_txn(1);
    let id = store.put(&txn).unwrap();

    assert_eq!(id, CanonicalCodec.txid(&txn).unwrap());
    assert_eq!(store.get(id).unwrap(), txn);
}

#[test]
fn get_missing_txn_returns_not_found() {
    let store = memory_backed_store();
    let absent = TxId::digest(b"never stored");

    assert!(matches!(
        store.get(absent),
        Err(StoreError::NotFound(id)) if id == absent
    ));
}

#[test]
fn duplicate_put_is_a_conflict_and_preserves_the_row() {
    let store = memory_backed_store();
    let txn = spend_txn(2);
    let id = store.put(&txn).unwrap();

    assert!(matches!(
        store.put(&txn),
        Err(StoreError::KeyConflict(conflicting)) if conflicting == id
    ));

    // The failed insert rolled back; the original row is intact and unique.
    assert_eq!(store.get(id).unwrap(), txn);
    assert_eq!(store.get_all().unwrap().len(), 1);
}

#[test]
fn delete_is_idempotent_and_get_fails_afterwards() {
    let store = memory_backed_store();
    let id = store.put(&spend_txn(3)).unwrap();

    store.delete(id).unwrap();
    store.delete(id).unwrap();

    assert!(matches!(store.get(id), Err(StoreError::NotFound(_))));
}

#[test]
fn get_all_returns_every_stored_txn() {
    let store = memory_backed_store();
    let first = store.put(&spend_txn(10)).unwrap();
    let second = store.put(&spend_txn(11)).unwrap();
    let third = store.put(&spend_txn(12)).unwrap();

    let mut ids: Vec<TxId> = store
        .get_all()
        .unwrap()
        .iter()
        .map(|txn| CanonicalCodec.txid(txn).unwrap())
        .collect();
    ids.sort();

    let mut expected = vec![first, second, third];
    expected.sort();
    assert_eq!(ids, expected);
}

#[test]
fn get_all_skips_externally_corrupted_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("txvault.db");

    let store = SqliteTxnStore::try_new(open_db(&path).unwrap(), CanonicalCodec).unwrap();
    store.put(&spend_txn(20)).unwrap();
    let victim = store.put(&spend_txn(21)).unwrap();
    store.put(&spend_txn(22)).unwrap();

    corrupt_row(&path, victim);

    let survivors = store.get_all().unwrap();
    assert_eq!(survivors.len(), 2);
    assert!(survivors
        .iter()
        .all(|txn| CanonicalCodec.txid(txn).unwrap() != victim));
}

#[test]
fn get_surfaces_corruption_instead_of_a_mangled_txn() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("txvault.db");

    let store = SqliteTxnStore::try_new(open_db(&path).unwrap(), CanonicalCodec).unwrap();
    let victim = store.put(&spend_txn(30)).unwrap();
    corrupt_row(&path, victim);

    assert!(matches!(store.get(victim), Err(StoreError::Decode(_))));
}

#[test]
fn get_rejects_a_row_whose_bytes_belong_to_another_txn() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("txvault.db");

    let store = SqliteTxnStore::try_new(open_db(&path).unwrap(), CanonicalCodec).unwrap();
    let victim = store.put(&spend_txn(40)).unwrap();
    let donor = store.put(&spend_txn(41)).unwrap();

    // Overwrite the victim's bytes with the donor's: they still decode, but
    // no longer re-derive to the victim's key.
    let side_conn = Connection::open(&path).unwrap();
    side_conn
        .execute(
            "UPDATE txns SET raw = (SELECT raw FROM txns WHERE txid = ?1) WHERE txid = ?2;",
            [donor.to_string(), victim.to_string()],
        )
        .unwrap();
    drop(side_conn);

    assert!(matches!(store.get(victim), Err(StoreError::Decode(_))));
    assert_eq!(store.get_all().unwrap().len(), 1);
}

#[test]
fn validation_failure_blocks_put() {
    let store = memory_backed_store();
    let no_outputs = Txn::new(1);

    assert!(matches!(
        store.put(&no_outputs),
        Err(StoreError::Validation(_))
    ));
    assert!(store.get_all().unwrap().is_empty());
}

#[test]
fn store_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();

    match SqliteTxnStore::try_new(conn, CanonicalCodec) {
        Err(StoreError::SchemaNotApplied {
            expected_version,
            actual_version: 0,
        }) => assert!(expected_version > 0),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected schema guard to reject the connection"),
    }
}

#[test]
fn store_rejects_connection_without_txns_table() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    assert!(matches!(
        SqliteTxnStore::try_new(conn, CanonicalCodec),
        Err(StoreError::MissingTable("txns"))
    ));
}

#[test]
fn service_wraps_store_calls() {
    let service = TxnService::new(memory_backed_store());

    let txn = spend_txn(50);
    let id = service.put(&txn).unwrap();

    assert_eq!(service.get(id).unwrap(), txn);
    assert_eq!(service.get_all().unwrap().len(), 1);

    service.delete(id).unwrap();
    assert!(matches!(service.get(id), Err(StoreError::NotFound(_))));
}

#[test]
fn service_ensure_tolerates_reinsertion() {
    let service = TxnService::new(memory_backed_store());
    let txn = spend_txn(60);

    let first = service.ensure(&txn).unwrap();
    let second = service.ensure(&txn).unwrap();

    assert_eq!(first, second);
    assert_eq!(service.get_all().unwrap().len(), 1);

    // Only the conflict is absorbed; other failures still propagate.
    let invalid = Txn::new(1);
    assert!(matches!(
        service.ensure(&invalid),
        Err(StoreError::Validation(_))
    ));
}

fn memory_backed_store() -> SqliteTxnStore<CanonicalCodec> {
    let conn = open_db_in_memory().unwrap();
    SqliteTxnStore::try_new(conn, CanonicalCodec).unwrap()
}

fn spend_txn(tag: u64) -> Txn {
    let mut txn = Txn::new(1);
    txn.inputs.push(TxnInput {
        prev_txid: TxId::digest(&tag.to_le_bytes()),
        prev_index: 0,
        script_sig: vec![0x47],
        sequence: u32::MAX,
    });
    txn.outputs.push(TxnOutput {
        value_sats: 1_000 + tag,
        script_pubkey: vec![0x76, 0xa9, 0x14],
    });
    txn
}

fn corrupt_row(path: &std::path::Path, id: TxId) {
    let conn = Connection::open(path).unwrap();
    conn.execute(
        "UPDATE txns SET raw = X'00' WHERE txid = ?1;",
        [id.to_string()],
    )
    .unwrap();
}
