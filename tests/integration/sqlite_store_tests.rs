use chrono::{DateTime, FixedOffset, Utc};
use gymgate::attendance::{
    AttendanceError, AttendanceManager, NewAttendanceRecord, RecordFilter, RecordOrder,
    RecordStore, SqliteRecordStore, StoreError, SCHEMA_VERSION,
};
use gymgate::auth::SubjectId;
use gymgate::notify::MemoryNotifier;
use std::sync::Arc;
use tempfile::tempdir;

fn sid(s: &str) -> SubjectId {
    SubjectId::new(s).unwrap()
}

fn at(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).unwrap()
}

#[tokio::test]
async fn test_open_creates_parent_directories() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("deeper").join("attendance.db");
    SqliteRecordStore::open(&path).unwrap();
    assert!(path.exists());
}

#[tokio::test]
async fn test_sessions_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("attendance.db");

    {
        let store = Arc::new(SqliteRecordStore::open(&path).unwrap());
        let manager = AttendanceManager::new(store, Arc::new(MemoryNotifier::new()));
        manager
            .begin_session(Some(&sid("U1")), at("2024-01-01T09:00:00+02:00"))
            .await
            .unwrap();
    }

    let store = Arc::new(SqliteRecordStore::open(&path).unwrap());
    let manager = AttendanceManager::new(store, Arc::new(MemoryNotifier::new()));
    let closed = manager
        .end_session(Some(&sid("U1")), at("2024-01-01T17:30:00+02:00"))
        .await
        .unwrap();
    assert_eq!(closed.time_in, at("2024-01-01T07:00:00Z").with_timezone(&Utc));
    assert_eq!(closed.duration(), Some(chrono::Duration::minutes(510)));
}

#[tokio::test]
async fn test_local_date_is_stored_not_utc_date() {
    let store = SqliteRecordStore::open_in_memory().unwrap();
    // 00:30 local on Jan 2 is still Jan 1 in UTC
    let record = store
        .insert_open(NewAttendanceRecord::open_at(
            sid("U1"),
            at("2024-01-02T00:30:00+02:00"),
        ))
        .await
        .unwrap();
    assert_eq!(record.date.to_string(), "2024-01-02");
}

#[tokio::test]
async fn test_plain_insert_conflicts_through_manager() {
    let store = Arc::new(SqliteRecordStore::open_in_memory().unwrap());
    let manager = AttendanceManager::new(store.clone(), Arc::new(MemoryNotifier::new()))
        .with_mode(gymgate::attendance::ConsistencyMode::ReadThenWrite);

    manager
        .begin_session(Some(&sid("U1")), at("2024-01-01T09:00:00Z"))
        .await
        .unwrap();
    // The unique index still rejects a second open record even without a pre-check
    let err = manager
        .begin_session(Some(&sid("U1")), at("2024-01-01T09:01:00Z"))
        .await
        .unwrap_err();
    assert!(matches!(err, AttendanceError::SessionAlreadyOpen { .. }));
}

#[tokio::test]
async fn test_corrupt_timestamp_is_reported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("attendance.db");
    SqliteRecordStore::open(&path).unwrap();

    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute(
        "INSERT INTO attendance (subject_id, date, time_in, time_out) VALUES ('U1', '2024-01-01', 'yesterday', NULL)",
        [],
    )
    .unwrap();
    drop(conn);

    let store = SqliteRecordStore::open(&path).unwrap();
    let result = store
        .query(&RecordFilter::subject(sid("U1")), RecordOrder::TimeInAsc, None)
        .await;
    assert!(matches!(result, Err(StoreError::Corrupt(msg)) if msg.contains("yesterday")));
}

#[tokio::test]
async fn test_unknown_schema_version_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("attendance.db");
    SqliteRecordStore::open(&path).unwrap();

    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
        .unwrap();
    drop(conn);

    let result = SqliteRecordStore::open(&path);
    assert!(matches!(result, Err(StoreError::Corrupt(_))));
}

#[tokio::test]
async fn test_not_a_database_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("attendance.db");
    std::fs::write(&path, "this is not sqlite, just some text that is long enough").unwrap();

    assert!(SqliteRecordStore::open(&path).is_err());
}
