//! The attendance session state machine.
//!
//! Per (subject, date): `NoSession -> Open` on time-in, `Open -> Closed` on
//! time-out. A closed record is final; the next time-in starts a new record, so
//! a subject may check in and out several times a day.
//!
//! Every failure is reported to the user through the [`Notifier`] and returned
//! to the caller as an [`AttendanceError`]; nothing is retried.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::record::{
    AttendancePatch, AttendanceRecord, NewAttendanceRecord, RecordFilter, RecordOrder,
    SessionState,
};
use super::store::{RecordStore, StoreError};
use crate::auth::SubjectId;
use crate::notify::Notifier;

const TIME_IN_TITLE: &str = "Time In";
const TIME_OUT_TITLE: &str = "Time Out";

/// How the one-open-session invariant is maintained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyMode {
    /// Client-side sequences: unchecked insert, query-then-update on close.
    /// Concurrent requests can race.
    ReadThenWrite,
    /// Conditional store operations; the store rejects a second open record.
    #[default]
    StoreEnforced,
}

/// Attendance failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttendanceError {
    /// No subject identifier could be resolved.
    #[error("no subject identifier is available to record attendance")]
    IdentityUnavailable,

    /// Looking up the open record failed.
    #[error("failed to read attendance records: {0}")]
    StoreReadFailed(String),

    /// Writing the record failed.
    #[error("failed to write attendance record: {0}")]
    StoreWriteFailed(String),

    /// Time-out without a matching time-in.
    #[error("No time-in record found")]
    NoOpenSession,

    /// Time-in while a session is already open for that day.
    #[error("a session is already open for {subject_id} on {date}")]
    SessionAlreadyOpen {
        /// Subject.
        subject_id: SubjectId,
        /// Local date of the open session.
        date: NaiveDate,
    },

    /// The store did not answer in time. The write may still land.
    #[error("record store did not respond within {0:?}; the change may still have been saved, check status before retrying")]
    StoreTimeout(Duration),

    /// Abandoned because the application is shutting down.
    #[error("attendance action cancelled")]
    Cancelled,
}

impl AttendanceError {
    fn from_read(err: StoreError) -> Self {
        match err {
            StoreError::Timeout(d) => Self::StoreTimeout(d),
            StoreError::Cancelled => Self::Cancelled,
            other => Self::StoreReadFailed(other.to_string()),
        }
    }

    fn from_write(err: StoreError) -> Self {
        match err {
            StoreError::Timeout(d) => Self::StoreTimeout(d),
            StoreError::Cancelled => Self::Cancelled,
            StoreError::Conflict { subject_id, date } => {
                Self::SessionAlreadyOpen { subject_id, date }
            }
            other => Self::StoreWriteFailed(other.to_string()),
        }
    }
}

/// Records time-in / time-out against a [`RecordStore`].
pub struct AttendanceManager {
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
    mode: ConsistencyMode,
}

impl std::fmt::Debug for AttendanceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttendanceManager")
            .field("store", &"<store>")
            .field("notifier", &"<notifier>")
            .field("mode", &self.mode)
            .finish()
    }
}

impl AttendanceManager {
    /// Create a manager in the default ([`ConsistencyMode::StoreEnforced`]) mode.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            mode: ConsistencyMode::default(),
        }
    }

    /// Select the consistency mode.
    #[must_use]
    pub fn with_mode(mut self, mode: ConsistencyMode) -> Self {
        self.mode = mode;
        self
    }

    /// The active consistency mode.
    #[must_use]
    pub fn mode(&self) -> ConsistencyMode {
        self.mode
    }

    /// Open a session for `subject_id` at `now` (time in).
    pub async fn begin_session(
        &self,
        subject_id: Option<&SubjectId>,
        now: DateTime<FixedOffset>,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let result = self.try_begin(subject_id, now).await;
        match &result {
            Ok(record) => {
                log::info!(
                    "Time in recorded for {} ({}) at {}",
                    record.subject_id,
                    record.id,
                    now.format("%Y-%m-%d %H:%M")
                );
                self.notifier.info(
                    TIME_IN_TITLE,
                    &format!("Time in recorded at {}", now.format("%H:%M")),
                );
            }
            Err(e) => self.report(TIME_IN_TITLE, e),
        }
        result
    }

    /// Close the subject's most recent open session at `now` (time out).
    pub async fn end_session(
        &self,
        subject_id: Option<&SubjectId>,
        now: DateTime<FixedOffset>,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let result = self.try_end(subject_id, now).await;
        match &result {
            Ok(record) => {
                log::info!(
                    "Time out recorded for {} ({}) at {}",
                    record.subject_id,
                    record.id,
                    now.format("%Y-%m-%d %H:%M")
                );
                self.notifier.info(
                    TIME_OUT_TITLE,
                    &format!("Time out recorded at {}", now.format("%H:%M")),
                );
            }
            Err(e) => self.report(TIME_OUT_TITLE, e),
        }
        result
    }

    /// State of `subject_id` on `date`, from the latest record of that day.
    pub async fn session_state(
        &self,
        subject_id: &SubjectId,
        date: NaiveDate,
    ) -> Result<SessionState, AttendanceError> {
        let filter = RecordFilter::subject(subject_id.clone()).on(date);
        let latest = self
            .store
            .query(&filter, RecordOrder::TimeInDesc, Some(1))
            .await
            .map_err(AttendanceError::from_read)?;
        Ok(SessionState::from_latest(latest.into_iter().next()))
    }

    /// Records of `subject_id`, optionally for one date, oldest first.
    pub async fn history(
        &self,
        subject_id: &SubjectId,
        date: Option<NaiveDate>,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        let mut filter = RecordFilter::subject(subject_id.clone());
        filter.date = date;
        self.store
            .query(&filter, RecordOrder::TimeInAsc, None)
            .await
            .map_err(AttendanceError::from_read)
    }

    async fn try_begin(
        &self,
        subject_id: Option<&SubjectId>,
        now: DateTime<FixedOffset>,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let subject_id = subject_id.ok_or(AttendanceError::IdentityUnavailable)?;
        let record = NewAttendanceRecord::open_at(subject_id.clone(), now);

        let written = match self.mode {
            ConsistencyMode::ReadThenWrite => self.store.insert(record).await,
            ConsistencyMode::StoreEnforced => self.store.insert_open(record).await,
        };
        written.map_err(AttendanceError::from_write)
    }

    async fn try_end(
        &self,
        subject_id: Option<&SubjectId>,
        now: DateTime<FixedOffset>,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let subject_id = subject_id.ok_or(AttendanceError::IdentityUnavailable)?;
        let patch = AttendancePatch::close_at(now);

        match self.mode {
            ConsistencyMode::ReadThenWrite => {
                let filter = RecordFilter::subject(subject_id.clone()).open();
                let open = self
                    .store
                    .query(&filter, RecordOrder::TimeInDesc, Some(1))
                    .await
                    .map_err(AttendanceError::from_read)?;
                let latest = open
                    .into_iter()
                    .next()
                    .ok_or(AttendanceError::NoOpenSession)?;
                self.store
                    .update(latest.id, patch)
                    .await
                    .map_err(AttendanceError::from_write)
            }
            ConsistencyMode::StoreEnforced => self
                .store
                .close_latest_open(subject_id, patch.time_out)
                .await
                .map_err(AttendanceError::from_write)?
                .ok_or(AttendanceError::NoOpenSession),
        }
    }

    fn report(&self, title: &str, err: &AttendanceError) {
        match err {
            AttendanceError::NoOpenSession | AttendanceError::SessionAlreadyOpen { .. } => {
                log::info!("{}: {}", title, err)
            }
            _ => log::warn!("{}: {}", title, err),
        }
        self.notifier.error(&format!("{} failed", title), &err.to_string());
    }
}
