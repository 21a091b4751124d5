//! Attendance record model.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::auth::SubjectId;

/// Store-assigned record identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One check-in/check-out entry.
///
/// `time_out == None` means the session is still open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: RecordId,
    pub subject_id: SubjectId,
    /// Subject's local calendar date at time-in.
    pub date: NaiveDate,
    pub time_in: DateTime<Utc>,
    pub time_out: Option<DateTime<Utc>>,
}

impl AttendanceRecord {
    /// Whether the session is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.time_out.is_none()
    }

    /// Length of a closed session.
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.time_out.map(|out| out - self.time_in)
    }
}

/// A record about to be inserted (no id yet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewAttendanceRecord {
    pub subject_id: SubjectId,
    pub date: NaiveDate,
    pub time_in: DateTime<Utc>,
}

impl NewAttendanceRecord {
    /// An open record starting at `now`, dated with `now`'s local date.
    #[must_use]
    pub fn open_at(subject_id: SubjectId, now: DateTime<FixedOffset>) -> Self {
        Self {
            subject_id,
            date: now.date_naive(),
            time_in: now.with_timezone(&Utc),
        }
    }

    /// Attach an id, producing the stored form.
    #[must_use]
    pub fn with_id(self, id: RecordId) -> AttendanceRecord {
        AttendanceRecord {
            id,
            subject_id: self.subject_id,
            date: self.date,
            time_in: self.time_in,
            time_out: None,
        }
    }
}

/// Partial update of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttendancePatch {
    pub time_out: DateTime<Utc>,
}

impl AttendancePatch {
    /// Close the record at `at`.
    #[must_use]
    pub fn close_at(at: DateTime<FixedOffset>) -> Self {
        Self {
            time_out: at.with_timezone(&Utc),
        }
    }
}

/// Query filter. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub subject_id: Option<SubjectId>,
    pub date: Option<NaiveDate>,
    /// Only records with no time-out.
    pub open_only: bool,
}

impl RecordFilter {
    /// All records of a subject.
    #[must_use]
    pub fn subject(subject_id: SubjectId) -> Self {
        Self {
            subject_id: Some(subject_id),
            ..Self::default()
        }
    }

    /// Restrict to one date.
    #[must_use]
    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Restrict to open records.
    #[must_use]
    pub fn open(mut self) -> Self {
        self.open_only = true;
        self
    }

    /// Whether `record` passes the filter.
    #[must_use]
    pub fn matches(&self, record: &AttendanceRecord) -> bool {
        self.subject_id
            .as_ref()
            .map_or(true, |s| *s == record.subject_id)
            && self.date.map_or(true, |d| d == record.date)
            && (!self.open_only || record.is_open())
    }
}

/// Result ordering by time-in (ties broken by id in the same direction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordOrder {
    #[default]
    TimeInAsc,
    TimeInDesc,
}

/// Session state of a subject on one date, derived from its latest record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "record", rename_all = "snake_case")]
pub enum SessionState {
    NoSession,
    Open(AttendanceRecord),
    Closed(AttendanceRecord),
}

impl SessionState {
    /// Derive the state from the latest record of the day.
    #[must_use]
    pub fn from_latest(latest: Option<AttendanceRecord>) -> Self {
        match latest {
            None => Self::NoSession,
            Some(record) if record.is_open() => Self::Open(record),
            Some(record) => Self::Closed(record),
        }
    }

    /// Short label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoSession => "no session",
            Self::Open(_) => "open",
            Self::Closed(_) => "closed",
        }
    }
}
