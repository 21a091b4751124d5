//! Time-bounded, cancellable access to a record store.
//!
//! Every call through [`BoundedStore`] races the inner store against a timeout
//! and against a shutdown request, so a hung store can delay a navigation but
//! never block it forever.
//!
//! Giving up on a call does not undo it. A backend that runs on the blocking
//! pool, like the SQLite store, may still commit after a timeout or cancellation
//! has been reported, so a later time-in can then fail as already open.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::record::{
    AttendancePatch, AttendanceRecord, NewAttendanceRecord, RecordFilter, RecordId, RecordOrder,
};
use super::store::{RecordStore, StoreError, StoreResult};
use crate::auth::SubjectId;
use crate::signal::ShutdownHandler;

/// Default per-call deadline.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Record store wrapper adding a deadline and shutdown cancellation.
#[derive(Clone)]
pub struct BoundedStore {
    inner: Arc<dyn RecordStore>,
    timeout: Duration,
    shutdown: Option<ShutdownHandler>,
}

impl std::fmt::Debug for BoundedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedStore")
            .field("inner", &"<store>")
            .field("timeout", &self.timeout)
            .field("shutdown", &self.shutdown.is_some())
            .finish()
    }
}

impl BoundedStore {
    /// Wrap `inner` with the default timeout and no shutdown hook.
    #[must_use]
    pub fn new(inner: Arc<dyn RecordStore>) -> Self {
        Self {
            inner,
            timeout: DEFAULT_STORE_TIMEOUT,
            shutdown: None,
        }
    }

    /// Set the per-call deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Abandon pending calls when `shutdown` fires.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: ShutdownHandler) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// The configured deadline.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T, F>(&self, op: &str, call: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>> + Send,
    {
        if self
            .shutdown
            .as_ref()
            .is_some_and(ShutdownHandler::is_shutdown_requested)
        {
            return Err(StoreError::Cancelled);
        }

        let deadline = tokio::time::timeout(self.timeout, call);
        let result = match &self.shutdown {
            Some(shutdown) => {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        log::warn!("Store {} cancelled by shutdown", op);
                        return Err(StoreError::Cancelled);
                    }
                    result = deadline => result,
                }
            }
            None => deadline.await,
        };

        result.unwrap_or_else(|_| {
            log::warn!("Store {} timed out after {:?}", op, self.timeout);
            Err(StoreError::Timeout(self.timeout))
        })
    }
}

#[async_trait]
impl RecordStore for BoundedStore {
    async fn insert(&self, record: NewAttendanceRecord) -> StoreResult<AttendanceRecord> {
        self.bounded("insert", self.inner.insert(record)).await
    }

    async fn query(
        &self,
        filter: &RecordFilter,
        order: RecordOrder,
        limit: Option<usize>,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        self.bounded("query", self.inner.query(filter, order, limit))
            .await
    }

    async fn update(&self, id: RecordId, patch: AttendancePatch) -> StoreResult<AttendanceRecord> {
        self.bounded("update", self.inner.update(id, patch)).await
    }

    async fn insert_open(&self, record: NewAttendanceRecord) -> StoreResult<AttendanceRecord> {
        self.bounded("insert_open", self.inner.insert_open(record))
            .await
    }

    async fn close_latest_open(
        &self,
        subject_id: &SubjectId,
        time_out: DateTime<Utc>,
    ) -> StoreResult<Option<AttendanceRecord>> {
        self.bounded(
            "close_latest_open",
            self.inner.close_latest_open(subject_id, time_out),
        )
        .await
    }
}
