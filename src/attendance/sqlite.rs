//! SQLite-backed attendance record store.
//!
//! Stands in for the remote store on a single machine. The one-open-session
//! invariant is enforced by a partial unique index, so even plain inserts cannot
//! create a second open record for the same (subject, date).
//!
//! `rusqlite` is blocking; every operation runs on tokio's blocking pool while
//! holding the connection mutex, which also makes each operation atomic with
//! respect to the others.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::record::{
    AttendancePatch, AttendanceRecord, NewAttendanceRecord, RecordFilter, RecordId, RecordOrder,
};
use super::store::{RecordStore, StoreError, StoreResult};
use crate::auth::SubjectId;

/// Current schema version, stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i32 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS attendance (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    subject_id  TEXT NOT NULL,
    date        TEXT NOT NULL,
    time_in     TEXT NOT NULL,
    time_out    TEXT
);
CREATE INDEX IF NOT EXISTS attendance_subject_time_in
    ON attendance (subject_id, time_in);
CREATE UNIQUE INDEX IF NOT EXISTS attendance_one_open_per_day
    ON attendance (subject_id, date) WHERE time_out IS NULL;
";

const COLUMNS: &str = "id, subject_id, date, time_in, time_out";

/// Attendance store persisted in a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Unavailable(format!("{}: {}", parent.display(), e))
                })?;
            }
        }
        let conn = Connection::open(path)?;
        log::debug!("Opened attendance database at {}", path.display());
        Self::init(conn)
    }

    /// An in-memory database, for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;

        let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version == 0 {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        } else if version != SCHEMA_VERSION {
            return Err(StoreError::Corrupt(format!(
                "unsupported schema version {} (expected {})",
                version, SCHEMA_VERSION
            )));
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("connection lock poisoned".into()))?;
            op(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("blocking task failed: {}", e)))?
    }
}

fn encode_time(t: &DateTime<Utc>) -> String {
    // Fixed-width UTC text sorts chronologically
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{}': {}", raw, e)))
}

struct RawRow {
    id: i64,
    subject_id: String,
    date: String,
    time_in: String,
    time_out: Option<String>,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            subject_id: row.get(1)?,
            date: row.get(2)?,
            time_in: row.get(3)?,
            time_out: row.get(4)?,
        })
    }

    fn decode(self) -> StoreResult<AttendanceRecord> {
        let subject_id = SubjectId::new(self.subject_id)
            .ok_or_else(|| StoreError::Corrupt(format!("record #{} has no subject", self.id)))?;
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .map_err(|e| StoreError::Corrupt(format!("bad date '{}': {}", self.date, e)))?;
        Ok(AttendanceRecord {
            id: RecordId(self.id),
            subject_id,
            date,
            time_in: decode_time(&self.time_in)?,
            time_out: self.time_out.as_deref().map(decode_time).transpose()?,
        })
    }
}

fn is_open_conflict(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn insert_row(conn: &Connection, record: NewAttendanceRecord) -> StoreResult<AttendanceRecord> {
    let result = conn.execute(
        "INSERT INTO attendance (subject_id, date, time_in, time_out) VALUES (?1, ?2, ?3, NULL)",
        params![
            record.subject_id.as_str(),
            record.date.format("%Y-%m-%d").to_string(),
            encode_time(&record.time_in),
        ],
    );
    match result {
        Ok(_) => Ok(record.with_id(RecordId(conn.last_insert_rowid()))),
        Err(e) if is_open_conflict(&e) => Err(StoreError::Conflict {
            subject_id: record.subject_id,
            date: record.date,
        }),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert(&self, record: NewAttendanceRecord) -> StoreResult<AttendanceRecord> {
        self.with_conn(move |conn| insert_row(conn, record)).await
    }

    async fn query(
        &self,
        filter: &RecordFilter,
        order: RecordOrder,
        limit: Option<usize>,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        let mut clauses = Vec::new();
        let mut values: Vec<String> = Vec::new();
        if let Some(subject_id) = &filter.subject_id {
            values.push(subject_id.as_str().to_string());
            clauses.push(format!("subject_id = ?{}", values.len()));
        }
        if let Some(date) = filter.date {
            values.push(date.format("%Y-%m-%d").to_string());
            clauses.push(format!("date = ?{}", values.len()));
        }
        if filter.open_only {
            clauses.push("time_out IS NULL".to_string());
        }

        let mut sql = format!("SELECT {} FROM attendance", COLUMNS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(match order {
            RecordOrder::TimeInAsc => " ORDER BY time_in ASC, id ASC",
            RecordOrder::TimeInDesc => " ORDER BY time_in DESC, id DESC",
        });
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), RawRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(RawRow::decode).collect()
        })
        .await
    }

    async fn update(&self, id: RecordId, patch: AttendancePatch) -> StoreResult<AttendanceRecord> {
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    &format!(
                        "UPDATE attendance SET time_out = ?2 WHERE id = ?1 RETURNING {}",
                        COLUMNS
                    ),
                    params![id.0, encode_time(&patch.time_out)],
                    RawRow::from_row,
                )
                .optional()?;
            row.ok_or(StoreError::NotFound(id))?.decode()
        })
        .await
    }

    async fn insert_open(&self, record: NewAttendanceRecord) -> StoreResult<AttendanceRecord> {
        // The partial unique index turns a second open insert into a conflict
        self.with_conn(move |conn| insert_row(conn, record)).await
    }

    async fn close_latest_open(
        &self,
        subject_id: &SubjectId,
        time_out: DateTime<Utc>,
    ) -> StoreResult<Option<AttendanceRecord>> {
        let subject = subject_id.as_str().to_string();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    &format!(
                        "UPDATE attendance SET time_out = ?2
                         WHERE time_out IS NULL AND id = (
                             SELECT id FROM attendance
                             WHERE subject_id = ?1 AND time_out IS NULL
                             ORDER BY time_in DESC, id DESC LIMIT 1
                         )
                         RETURNING {}",
                        COLUMNS
                    ),
                    params![subject, encode_time(&time_out)],
                    RawRow::from_row,
                )
                .optional()?;
            row.map(RawRow::decode).transpose()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use tempfile::tempdir;

    fn sid(s: &str) -> SubjectId {
        SubjectId::new(s).unwrap()
    }

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_query_roundtrip() {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        let inserted = store
            .insert(NewAttendanceRecord::open_at(sid("U1"), at("2024-01-01T09:00:00+02:00")))
            .await
            .unwrap();

        let found = store
            .query(&RecordFilter::subject(sid("U1")).open(), RecordOrder::TimeInDesc, Some(1))
            .await
            .unwrap();
        assert_eq!(found, vec![inserted]);
        assert_eq!(found[0].time_in, at("2024-01-01T07:00:00Z"));
    }

    #[tokio::test]
    async fn test_unique_open_index_rejects_plain_insert() {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        store
            .insert(NewAttendanceRecord::open_at(sid("U1"), at("2024-01-01T09:00:00Z")))
            .await
            .unwrap();
        let err = store
            .insert(NewAttendanceRecord::open_at(sid("U1"), at("2024-01-01T10:00:00Z")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_closed_records_do_not_conflict() {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        let first = store
            .insert_open(NewAttendanceRecord::open_at(sid("U1"), at("2024-01-01T09:00:00Z")))
            .await
            .unwrap();
        store
            .update(first.id, AttendancePatch::close_at(at("2024-01-01T12:00:00Z")))
            .await
            .unwrap();
        store
            .insert_open(NewAttendanceRecord::open_at(sid("U1"), at("2024-01-01T13:00:00Z")))
            .await
            .unwrap();

        let day = store
            .query(&RecordFilter::subject(sid("U1")), RecordOrder::TimeInAsc, None)
            .await
            .unwrap();
        assert_eq!(day.len(), 2);
        assert!(!day[0].is_open());
        assert!(day[1].is_open());
    }

    #[tokio::test]
    async fn test_close_latest_open_affects_one_row() {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        // Open records on two different days
        store
            .insert_open(NewAttendanceRecord::open_at(sid("U1"), at("2024-01-01T09:00:00Z")))
            .await
            .unwrap();
        let newer = store
            .insert_open(NewAttendanceRecord::open_at(sid("U1"), at("2024-01-02T09:00:00Z")))
            .await
            .unwrap();

        let closed = store
            .close_latest_open(&sid("U1"), at("2024-01-02T17:00:00Z").with_timezone(&Utc))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(closed.id, newer.id);

        let open = store
            .query(&RecordFilter::subject(sid("U1")).open(), RecordOrder::TimeInAsc, None)
            .await
            .unwrap();
        assert_eq!(open.len(), 1);

        assert!(store
            .close_latest_open(&sid("U2"), Utc::now())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        let err = store
            .update(RecordId(42), AttendancePatch::close_at(at("2024-01-01T17:00:00Z")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(RecordId(42))));
    }

    #[tokio::test]
    async fn test_persists_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("attendance.db");
        {
            let store = SqliteRecordStore::open(&path).unwrap();
            store
                .insert(NewAttendanceRecord::open_at(sid("U1"), at("2024-01-01T09:00:00Z")))
                .await
                .unwrap();
        }
        let reopened = SqliteRecordStore::open(&path).unwrap();
        let all = reopened
            .query(&RecordFilter::default(), RecordOrder::TimeInAsc, None)
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }
}
