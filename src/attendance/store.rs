//! The record store contract and its in-memory implementation.
//!
//! The narrow contract (`insert` / `query` / `update`) mirrors what the remote
//! store exposes. The two conditional operations move the one-open-session
//! invariant into the store: each is a single request the store applies
//! atomically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

use super::record::{
    AttendancePatch, AttendanceRecord, NewAttendanceRecord, RecordFilter, RecordId, RecordOrder,
};
use crate::auth::SubjectId;

/// Errors reported by a record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An open record already exists for this subject and date.
    #[error("an open attendance record already exists for {subject_id} on {date}")]
    Conflict {
        /// Subject of the rejected insert.
        subject_id: SubjectId,
        /// Date of the rejected insert.
        date: chrono::NaiveDate,
    },

    /// The record to update does not exist.
    #[error("attendance record {0} not found")]
    NotFound(RecordId),

    /// The store did not answer in time.
    #[error("record store did not respond within {0:?}")]
    Timeout(Duration),

    /// The call was abandoned because shutdown was requested.
    #[error("record store call cancelled")]
    Cancelled,

    /// SQLite failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored value could not be decoded.
    #[error("corrupt attendance record: {0}")]
    Corrupt(String),

    /// Any other backend failure.
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence collaborator holding attendance records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a record unconditionally.
    async fn insert(&self, record: NewAttendanceRecord) -> StoreResult<AttendanceRecord>;

    /// Query records.
    async fn query(
        &self,
        filter: &RecordFilter,
        order: RecordOrder,
        limit: Option<usize>,
    ) -> StoreResult<Vec<AttendanceRecord>>;

    /// Apply a patch to one record.
    async fn update(&self, id: RecordId, patch: AttendancePatch) -> StoreResult<AttendanceRecord>;

    /// Insert an open record unless one is already open for (subject, date).
    ///
    /// Fails with [`StoreError::Conflict`] in that case.
    async fn insert_open(&self, record: NewAttendanceRecord) -> StoreResult<AttendanceRecord>;

    /// Close the subject's most recent open record, affecting at most one record.
    ///
    /// Returns `None` when the subject has no open record.
    async fn close_latest_open(
        &self,
        subject_id: &SubjectId,
        time_out: DateTime<Utc>,
    ) -> StoreResult<Option<AttendanceRecord>>;
}

/// Sort records in place.
pub(crate) fn sort_records(records: &mut [AttendanceRecord], order: RecordOrder) {
    match order {
        RecordOrder::TimeInAsc => records.sort_by(|a, b| (a.time_in, a.id).cmp(&(b.time_in, b.id))),
        RecordOrder::TimeInDesc => {
            records.sort_by(|a, b| (b.time_in, b.id).cmp(&(a.time_in, a.id)))
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    read: Option<String>,
    write: Option<String>,
}

/// In-memory record store.
///
/// Like a remote store without constraints, the plain `insert` accepts any
/// number of open records per subject. Latency and failures can be injected
/// to exercise timeouts, races and error paths.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<Vec<AttendanceRecord>>,
    next_id: AtomicI64,
    latency: StdMutex<Option<Duration>>,
    faults: StdMutex<Faults>,
}

impl MemoryRecordStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every operation by `latency` before touching the data.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(Some(latency));
        self
    }

    /// Change the injected latency.
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut guard) = self.latency.lock() {
            *guard = latency;
        }
    }

    /// Make reads fail with `message` (or stop failing with `None`).
    pub fn fail_reads(&self, message: Option<&str>) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.read = message.map(str::to_string);
        }
    }

    /// Make writes fail with `message` (or stop failing with `None`).
    pub fn fail_writes(&self, message: Option<&str>) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.write = message.map(str::to_string);
        }
    }

    /// Copy of every stored record, in insertion order.
    pub async fn snapshot(&self) -> Vec<AttendanceRecord> {
        self.records.lock().await.clone()
    }

    async fn delay(&self) {
        let latency = self.latency.lock().ok().and_then(|guard| *guard);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_read(&self) -> StoreResult<()> {
        match self.faults.lock().ok().and_then(|f| f.read.clone()) {
            Some(message) => Err(StoreError::Unavailable(message)),
            None => Ok(()),
        }
    }

    fn check_write(&self) -> StoreResult<()> {
        match self.faults.lock().ok().and_then(|f| f.write.clone()) {
            Some(message) => Err(StoreError::Unavailable(message)),
            None => Ok(()),
        }
    }

    fn allocate(&self, record: NewAttendanceRecord) -> AttendanceRecord {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        record.with_id(RecordId(id))
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, record: NewAttendanceRecord) -> StoreResult<AttendanceRecord> {
        self.delay().await;
        self.check_write()?;
        let stored = self.allocate(record);
        self.records.lock().await.push(stored.clone());
        Ok(stored)
    }

    async fn query(
        &self,
        filter: &RecordFilter,
        order: RecordOrder,
        limit: Option<usize>,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        self.delay().await;
        self.check_read()?;
        let mut found: Vec<AttendanceRecord> = self
            .records
            .lock()
            .await
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        sort_records(&mut found, order);
        if let Some(limit) = limit {
            found.truncate(limit);
        }
        Ok(found)
    }

    async fn update(&self, id: RecordId, patch: AttendancePatch) -> StoreResult<AttendanceRecord> {
        self.delay().await;
        self.check_write()?;
        let mut records = self.records.lock().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;
        record.time_out = Some(patch.time_out);
        Ok(record.clone())
    }

    async fn insert_open(&self, record: NewAttendanceRecord) -> StoreResult<AttendanceRecord> {
        self.delay().await;
        self.check_write()?;
        // Check and insert under one lock acquisition
        let mut records = self.records.lock().await;
        let conflict = records
            .iter()
            .any(|r| r.is_open() && r.subject_id == record.subject_id && r.date == record.date);
        if conflict {
            return Err(StoreError::Conflict {
                subject_id: record.subject_id,
                date: record.date,
            });
        }
        let stored = self.allocate(record);
        records.push(stored.clone());
        Ok(stored)
    }

    async fn close_latest_open(
        &self,
        subject_id: &SubjectId,
        time_out: DateTime<Utc>,
    ) -> StoreResult<Option<AttendanceRecord>> {
        self.delay().await;
        self.check_write()?;
        let mut records = self.records.lock().await;
        let latest = records
            .iter_mut()
            .filter(|r| r.is_open() && r.subject_id == *subject_id)
            .max_by_key(|r| (r.time_in, r.id));
        Ok(latest.map(|record| {
            record.time_out = Some(time_out);
            record.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, FixedOffset, NaiveDate};

    fn sid(s: &str) -> SubjectId {
        SubjectId::new(s).unwrap()
    }

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_ids() {
        let store = MemoryRecordStore::new();
        let a = store
            .insert(NewAttendanceRecord::open_at(sid("U1"), at("2024-01-01T09:00:00Z")))
            .await
            .unwrap();
        let b = store
            .insert(NewAttendanceRecord::open_at(sid("U1"), at("2024-01-01T10:00:00Z")))
            .await
            .unwrap();
        assert!(b.id > a.id);
        assert_eq!(store.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn test_query_order_and_limit() {
        let store = MemoryRecordStore::new();
        for hour in ["09", "12", "10"] {
            store
                .insert(NewAttendanceRecord::open_at(
                    sid("U1"),
                    at(&format!("2024-01-01T{}:00:00Z", hour)),
                ))
                .await
                .unwrap();
        }
        let latest = store
            .query(&RecordFilter::subject(sid("U1")), RecordOrder::TimeInDesc, Some(1))
            .await
            .unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].time_in, at("2024-01-01T12:00:00Z"));

        let all = store
            .query(&RecordFilter::default(), RecordOrder::TimeInAsc, None)
            .await
            .unwrap();
        let hours: Vec<_> = all.iter().map(|r| r.time_in.format("%H").to_string()).collect();
        assert_eq!(hours, vec!["09", "10", "12"]);
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let store = MemoryRecordStore::new();
        let err = store
            .update(RecordId(99), AttendancePatch::close_at(at("2024-01-01T17:00:00Z")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(RecordId(99))));
    }

    #[tokio::test]
    async fn test_insert_open_conflict_is_per_date() {
        let store = MemoryRecordStore::new();
        store
            .insert_open(NewAttendanceRecord::open_at(sid("U1"), at("2024-01-01T09:00:00Z")))
            .await
            .unwrap();
        let err = store
            .insert_open(NewAttendanceRecord::open_at(sid("U1"), at("2024-01-01T11:00:00Z")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict { date, .. } if date == NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        ));

        // Another day and another subject are independent
        store
            .insert_open(NewAttendanceRecord::open_at(sid("U1"), at("2024-01-02T09:00:00Z")))
            .await
            .unwrap();
        store
            .insert_open(NewAttendanceRecord::open_at(sid("U2"), at("2024-01-01T09:00:00Z")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_close_latest_open() {
        let store = MemoryRecordStore::new();
        assert!(store
            .close_latest_open(&sid("U1"), Utc::now())
            .await
            .unwrap()
            .is_none());

        store
            .insert(NewAttendanceRecord::open_at(sid("U1"), at("2024-01-01T09:00:00Z")))
            .await
            .unwrap();
        let newer = store
            .insert(NewAttendanceRecord::open_at(sid("U1"), at("2024-01-01T10:00:00Z")))
            .await
            .unwrap();

        let closed = store
            .close_latest_open(&sid("U1"), at("2024-01-01T17:00:00Z").with_timezone(&Utc))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(closed.id, newer.id);
        let open_left = store
            .query(&RecordFilter::subject(sid("U1")).open(), RecordOrder::TimeInAsc, None)
            .await
            .unwrap();
        assert_eq!(open_left.len(), 1);
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let store = MemoryRecordStore::new();
        store.fail_writes(Some("disk full"));
        let err = store
            .insert(NewAttendanceRecord::open_at(sid("U1"), at("2024-01-01T09:00:00Z")))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "record store unavailable: disk full");

        store.fail_writes(None);
        store.fail_reads(Some("offline"));
        assert!(store
            .query(&RecordFilter::default(), RecordOrder::TimeInAsc, None)
            .await
            .is_err());
        assert!(store.snapshot().await.is_empty());
    }
}
