use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use fuel_ledger::session::{LedgerSession, SessionError};
use fuel_ledger::store::{BlobStore, FileStore, StoreError, TableStore};
use uuid::Uuid;

fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("fuel_ledger_{}", Uuid::new_v4()))
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 10, 3).unwrap()
}

fn open(dir: &Path) -> LedgerSession<FileStore> {
    LedgerSession::open(TableStore::new(
        FileStore::new(dir),
        "driving_log.csv",
        "fuel_log.csv",
    ))
    .unwrap()
}

#[test]
fn missing_file_reads_as_none() {
    let store = FileStore::new(temp_dir());
    assert_eq!(store.get("driving_log.csv").unwrap(), None);
}

#[test]
fn put_creates_directory_and_file() {
    let dir = temp_dir();
    let mut store = FileStore::new(&dir);
    let version = store.put("driving_log.csv", "Date\n", None).unwrap();
    let blob = store.get("driving_log.csv").unwrap().unwrap();
    assert_eq!(blob.content, "Date\n");
    assert_eq!(blob.version, version);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn external_edit_is_a_conflict() {
    let dir = temp_dir();
    let mut store = FileStore::new(&dir);
    let version = store.put("fuel_log.csv", "a\n", None).unwrap();
    std::fs::write(dir.join("fuel_log.csv"), "b\n").unwrap();
    let err = store.put("fuel_log.csv", "c\n", Some(&version)).unwrap_err();
    assert_eq!(
        err,
        StoreError::Conflict {
            path: "fuel_log.csv".into()
        }
    );
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn tables_are_written_as_csv() {
    let dir = temp_dir();
    let mut session = open(&dir);
    session
        .record_trip(day(), "anna", 120, Some("to the lake".into()), "anna")
        .unwrap();
    session
        .record_fueling(day(), "anna", 60, 35.5, Some(20.0), None)
        .unwrap();

    let trips = std::fs::read_to_string(dir.join("driving_log.csv")).unwrap();
    assert_eq!(
        trips,
        "Date,Driver,Km After,Driven Km,Comment,User\n\
         03.10.2024,anna,60,60,AUTOMATICALLY FUELED,anna\n\
         03.10.2024,anna,120,60,to the lake,anna\n"
    );
    let fuel = std::fs::read_to_string(dir.join("fuel_log.csv")).unwrap();
    assert_eq!(
        fuel,
        "Date,Fueler,Km,Euros,Liters,Note,Km since last fueling\n\
         03.10.2024,anna,60,35.5,20,,60\n"
    );
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn concurrent_writer_gets_conflict_instead_of_lost_update() {
    let dir = temp_dir();
    let mut first = open(&dir);
    let mut second = open(&dir);

    first.record_trip(day(), "anna", 100, None, "anna").unwrap();
    let err = second
        .record_trip(day(), "ben", 80, None, "ben")
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::Store(StoreError::Conflict { .. })
    ));

    second.reload().unwrap();
    let err = second
        .record_trip(day(), "ben", 80, None, "ben")
        .unwrap_err();
    assert_eq!(err.to_string(), "Kilometers must be greater than last entry (100)");
    second.record_trip(day(), "ben", 180, None, "ben").unwrap();

    let reopened = open(&dir);
    assert_eq!(reopened.ledger().trips().len(), 2);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn hand_written_file_is_loaded() {
    let dir = temp_dir();
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("driving_log.csv"),
        "Date,Driver,Km After,Driven Km,Comment,User\n\
         2024-09-01,anna,100,100,,LocalUser\n\
         02.09.2024,ben,150.0,50.0,,LocalUser\n",
    )
    .unwrap();
    let session = open(&dir);
    assert_eq!(session.ledger().last_odometer(), 150);
    assert_eq!(session.ledger().trips()[1].driver, "ben");
    let _ = std::fs::remove_dir_all(dir);
}
