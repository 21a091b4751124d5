//! JSON output for navigation outcomes, attendance and the route table.
//!
//! Every document carries the exit code the binary will return, so scripts can
//! read a single stream.
//!
//! # Output Schema (navigation)
//!
//! ```json
//! {
//!   "requested": "/application/attendance/time-in",
//!   "screen": { "name": "TimeIn", "params": {}, "title": "Time In" },
//!   "path": "/application/attendance/time-in",
//!   "redirects": [],
//!   "intents": [ { "intent": "begin_session", "outcome": { "outcome": "allowed" } } ],
//!   "exit_code": 0,
//!   "exit_code_name": "GG000"
//! }
//! ```

use serde::Serialize;

use crate::attendance::{AttendanceRecord, SessionState};
use crate::error::ExitCode;
use crate::navigation::{IntentReport, NavigationOutcome, RedirectHop, ScreenView};
use crate::routes::RouteSummary;

/// One attendance record in JSON form.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRecord {
    pub id: i64,
    pub subject_id: String,
    pub date: String,
    pub time_in: String,
    pub time_out: Option<String>,
    pub open: bool,
    pub duration_minutes: Option<i64>,
}

impl From<&AttendanceRecord> for JsonRecord {
    fn from(record: &AttendanceRecord) -> Self {
        Self {
            id: record.id.0,
            subject_id: record.subject_id.to_string(),
            date: record.date.to_string(),
            time_in: record.time_in.to_rfc3339(),
            time_out: record.time_out.map(|t| t.to_rfc3339()),
            open: record.is_open(),
            duration_minutes: record.duration().map(|d| d.num_minutes()),
        }
    }
}

/// A committed navigation.
#[derive(Debug, Clone, Serialize)]
pub struct JsonNavigation {
    /// What was asked for (path or route name).
    pub requested: String,
    pub screen: ScreenView,
    pub path: String,
    pub redirects: Vec<RedirectHop>,
    pub intents: Vec<IntentReport>,
    pub exit_code: i32,
    pub exit_code_name: String,
}

impl JsonNavigation {
    #[must_use]
    pub fn new(requested: &str, outcome: &NavigationOutcome, exit_code: ExitCode) -> Self {
        Self {
            requested: requested.to_string(),
            screen: outcome.screen(),
            path: outcome.destination.path.clone(),
            redirects: outcome.redirects.clone(),
            intents: outcome.intents.clone(),
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }
}

/// Session state of one subject on one day.
#[derive(Debug, Clone, Serialize)]
pub struct JsonStatus {
    pub subject_id: String,
    pub date: String,
    pub state: &'static str,
    pub record: Option<JsonRecord>,
}

impl JsonStatus {
    #[must_use]
    pub fn new(subject_id: &str, date: chrono::NaiveDate, state: &SessionState) -> Self {
        let record = match state {
            SessionState::NoSession => None,
            SessionState::Open(r) | SessionState::Closed(r) => Some(JsonRecord::from(r)),
        };
        Self {
            subject_id: subject_id.to_string(),
            date: date.to_string(),
            state: state.label(),
            record,
        }
    }
}

/// Attendance listing.
#[derive(Debug, Clone, Serialize)]
pub struct JsonAttendance {
    pub subject_id: String,
    pub date: Option<String>,
    pub records: Vec<JsonRecord>,
    pub open_sessions: usize,
    pub total_minutes: i64,
}

impl JsonAttendance {
    #[must_use]
    pub fn new(
        subject_id: &str,
        date: Option<chrono::NaiveDate>,
        records: &[AttendanceRecord],
    ) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            date: date.map(|d| d.to_string()),
            records: records.iter().map(JsonRecord::from).collect(),
            open_sessions: records.iter().filter(|r| r.is_open()).count(),
            total_minutes: records
                .iter()
                .filter_map(AttendanceRecord::duration)
                .map(|d| d.num_minutes())
                .sum(),
        }
    }
}

/// The route table.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRoutes {
    pub routes: Vec<RouteSummary>,
}

/// Serialize any output document.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_json_pretty<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// Write any output document followed by a newline.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_to<T: Serialize, W: std::io::Write>(
    value: &T,
    mut writer: W,
) -> Result<(), std::io::Error> {
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)
}
