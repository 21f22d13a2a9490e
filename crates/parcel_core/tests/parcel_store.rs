use parcel_core::db::migrations::latest_version;
use parcel_core::db::{open_db, open_db_in_memory};
use parcel_core::{
    ClientId, Parcel, ParcelRepository, ParcelStatus, ParcelValidationError, RepoError,
    SqliteParcelRepository,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusqlite::Connection;
use std::collections::HashMap;
use std::error::Error;

fn test_parcel() -> Parcel {
    Parcel {
        number: 0,
        client: 1000,
        status: ParcelStatus::Registered,
        address: "test".to_string(),
        created_at: parcel_core::now_rfc3339(),
    }
}

fn random_client() -> ClientId {
    let mut rng = StdRng::from_entropy();
    rng.gen_range(1..10_000_000)
}

#[test]
fn add_get_delete_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelRepository::try_new(&conn).unwrap();
    let mut parcel = test_parcel();

    let id = store.add(&parcel).unwrap();
    assert!(id > 0);
    parcel.number = id;

    let stored = store.get(id).unwrap();
    assert_eq!(stored, parcel);

    assert!(store.delete(id).unwrap());
    let err = store.get(id).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(number) if number == id));
}

#[test]
fn add_ignores_caller_supplied_number() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelRepository::try_new(&conn).unwrap();
    let mut parcel = test_parcel();
    parcel.number = 4242;

    let id = store.add(&parcel).unwrap();
    assert_ne!(id, 4242);
    assert!(store.get(4242).unwrap_err().is_not_found());
}

#[test]
fn add_rejects_invalid_parcel_without_writing() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelRepository::try_new(&conn).unwrap();
    let mut parcel = test_parcel();
    parcel.created_at = "not a timestamp".to_string();

    let err = store.add(&parcel).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ParcelValidationError::InvalidCreatedAt(_))
    ));

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM parcel;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn get_unknown_number_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelRepository::try_new(&conn).unwrap();

    let err = store.get(987_654).unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "parcel not found: 987654");
}

#[test]
fn set_address_updates_registered_parcel() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelRepository::try_new(&conn).unwrap();
    let id = store.add(&test_parcel()).unwrap();

    let new_address = "new test address";
    assert!(store.set_address(id, new_address).unwrap());

    assert_eq!(store.get(id).unwrap().address, new_address);
}

#[test]
fn set_address_is_ignored_after_parcel_is_sent() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelRepository::try_new(&conn).unwrap();
    let id = store.add(&test_parcel()).unwrap();
    store.set_status(id, ParcelStatus::Sent).unwrap();

    assert!(!store.set_address(id, "too late").unwrap());

    assert_eq!(store.get(id).unwrap().address, "test");
}

#[test]
fn set_address_on_unknown_parcel_creates_nothing() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelRepository::try_new(&conn).unwrap();

    assert!(!store.set_address(31_337, "nowhere").unwrap());
    assert!(store.get(31_337).unwrap_err().is_not_found());
}

#[test]
fn empty_address_roundtrips_and_can_be_set() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelRepository::try_new(&conn).unwrap();
    let mut parcel = Parcel::new(1000, "");

    parcel.number = store.add(&parcel).unwrap();
    assert_eq!(store.get(parcel.number).unwrap(), parcel);

    let other = store.add(&test_parcel()).unwrap();
    assert!(store.set_address(other, "").unwrap());
    assert_eq!(store.get(other).unwrap().address, "");
}

#[test]
fn rows_written_outside_the_store_are_read_as_stored() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelRepository::try_new(&conn).unwrap();
    let mut good = test_parcel();
    good.client = 77;
    good.number = store.add(&good).unwrap();
    conn.execute_batch(
        "INSERT INTO parcel (client, status, address, created_at)
         VALUES (77, 'registered', '', '2024-01-01 00:00:00');",
    )
    .unwrap();

    let parcels = store.get_by_client(77).unwrap();
    assert_eq!(parcels.len(), 2);
    assert!(parcels.contains(&good));
    let raw = parcels
        .iter()
        .find(|parcel| parcel.number != good.number)
        .unwrap();
    assert_eq!(raw.address, "");
    assert_eq!(raw.created_at, "2024-01-01 00:00:00");
    assert_eq!(store.get(raw.number).unwrap(), *raw);
}

#[test]
fn add_rejects_non_utc_created_at() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelRepository::try_new(&conn).unwrap();
    let mut parcel = test_parcel();
    parcel.created_at = "2024-01-01T03:00:00+03:00".to_string();

    let err = store.add(&parcel).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ParcelValidationError::NonUtcCreatedAt(_))
    ));
}

#[test]
fn transition_status_only_applies_from_expected_status() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelRepository::try_new(&conn).unwrap();
    let id = store.add(&test_parcel()).unwrap();

    assert!(!store
        .transition_status(id, ParcelStatus::Sent, ParcelStatus::Delivered)
        .unwrap());
    assert_eq!(store.get(id).unwrap().status, ParcelStatus::Registered);

    assert!(store
        .transition_status(id, ParcelStatus::Registered, ParcelStatus::Sent)
        .unwrap());
    assert_eq!(store.get(id).unwrap().status, ParcelStatus::Sent);

    assert!(!store
        .transition_status(id + 1, ParcelStatus::Registered, ParcelStatus::Sent)
        .unwrap());
}

#[test]
fn set_status_is_visible_for_every_status() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelRepository::try_new(&conn).unwrap();
    let id = store.add(&test_parcel()).unwrap();

    for status in [
        ParcelStatus::Sent,
        ParcelStatus::Delivered,
        ParcelStatus::Registered,
    ] {
        assert!(store.set_status(id, status).unwrap());
        assert_eq!(store.get(id).unwrap().status, status);
    }

    assert!(!store.set_status(id + 1, ParcelStatus::Sent).unwrap());
}

#[test]
fn delete_is_ignored_once_parcel_left_registered() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelRepository::try_new(&conn).unwrap();
    let id = store.add(&test_parcel()).unwrap();
    store.set_status(id, ParcelStatus::Sent).unwrap();

    assert!(!store.delete(id).unwrap());
    assert_eq!(store.get(id).unwrap().status, ParcelStatus::Sent);
}

#[test]
fn delete_unknown_parcel_is_a_quiet_no_op() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelRepository::try_new(&conn).unwrap();

    assert!(!store.delete(55).unwrap());
}

#[test]
fn numbers_are_not_reused_after_delete() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelRepository::try_new(&conn).unwrap();

    let first = store.add(&test_parcel()).unwrap();
    assert!(store.delete(first).unwrap());
    let second = store.add(&test_parcel()).unwrap();

    assert!(second > first);
}

#[test]
fn get_by_client_returns_exactly_that_clients_parcels() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelRepository::try_new(&conn).unwrap();
    let client = random_client();

    let mut added: HashMap<i64, Parcel> = HashMap::new();
    for address in ["first", "second", "third"] {
        let mut parcel = test_parcel();
        parcel.client = client;
        parcel.address = address.to_string();
        parcel.number = store.add(&parcel).unwrap();
        added.insert(parcel.number, parcel);
    }

    let mut other = test_parcel();
    other.client = client + 1;
    store.add(&other).unwrap();

    let stored = store.get_by_client(client).unwrap();
    assert_eq!(stored.len(), added.len());
    for parcel in stored {
        let expected = added
            .get(&parcel.number)
            .unwrap_or_else(|| panic!("unexpected parcel {parcel:?}"));
        assert_eq!(&parcel, expected);
    }
}

#[test]
fn get_by_client_without_parcels_is_empty() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelRepository::try_new(&conn).unwrap();

    assert!(store.get_by_client(random_client()).unwrap().is_empty());
}

#[test]
fn documented_flow_scenario() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelRepository::try_new(&conn).unwrap();
    let parcel = Parcel {
        number: 0,
        client: 1000,
        status: ParcelStatus::Registered,
        address: "test".to_string(),
        created_at: "2024-01-01T00:00:00Z".to_string(),
    };

    let id = store.add(&parcel).unwrap();
    let stored = store.get(id).unwrap();
    assert_eq!(stored.number, id);
    assert_eq!(stored.created_at, "2024-01-01T00:00:00Z");

    assert!(store.set_address(id, "new address").unwrap());
    assert_eq!(store.get(id).unwrap().address, "new address");

    assert!(store.set_status(id, ParcelStatus::Sent).unwrap());
    assert_eq!(store.get(id).unwrap().status, ParcelStatus::Sent);

    assert!(!store.delete(id).unwrap());
    assert!(store.get(id).is_ok());
}

#[test]
fn file_backed_store_keeps_parcels_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tracker.db");
    let mut parcel = test_parcel();

    {
        let conn = open_db(&path).unwrap();
        let store = SqliteParcelRepository::try_new(&conn).unwrap();
        parcel.number = store.add(&parcel).unwrap();
    }

    let conn = open_db(&path).unwrap();
    let store = SqliteParcelRepository::try_new(&conn).unwrap();
    assert_eq!(store.get(parcel.number).unwrap(), parcel);
}

#[test]
fn corrupt_status_row_is_reported_as_invalid_data() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "PRAGMA ignore_check_constraints = ON;
         INSERT INTO parcel (client, status, address, created_at)
         VALUES (1, 'lost', 'somewhere', '2024-01-01T00:00:00Z');",
    )
    .unwrap();
    let store = SqliteParcelRepository::try_new(&conn).unwrap();

    let err = store.get_by_client(1).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(message) if message.contains("lost")));
}

#[test]
fn storage_errors_carry_operation_context() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelRepository::try_new(&conn).unwrap();
    conn.execute_batch("DROP TABLE parcel;").unwrap();

    let err = store.add(&test_parcel()).unwrap_err();
    assert!(matches!(err, RepoError::Storage { operation: "add", .. }));
    assert!(err.to_string().starts_with("add: "));
    assert!(err.source().is_some());

    let err = store.get(1).unwrap_err();
    assert!(matches!(err, RepoError::Storage { operation: "get", .. }));
}

#[test]
fn repository_rejects_uninitialized_connection() {
    let conn = Connection::open_in_memory().unwrap();

    match SqliteParcelRepository::try_new(&conn) {
        Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert_eq!(expected_version, latest_version()),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn repository_rejects_connection_without_parcel_table() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    assert!(matches!(
        SqliteParcelRepository::try_new(&conn),
        Err(RepoError::MissingRequiredTable("parcel"))
    ));
}

#[test]
fn repository_rejects_parcel_table_missing_column() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE parcel (
            number INTEGER PRIMARY KEY AUTOINCREMENT,
            client INTEGER NOT NULL,
            status TEXT NOT NULL,
            address TEXT NOT NULL
        );",
    )
    .unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    assert!(matches!(
        SqliteParcelRepository::try_new(&conn),
        Err(RepoError::MissingRequiredColumn {
            table: "parcel",
            column: "created_at"
        })
    ));
}
