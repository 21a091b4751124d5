//! CSV export of attendance records.
//!
//! One row per record, oldest first as handed in.
//!
//! # Columns
//!
//! - `id`: Store-assigned record id
//! - `subject_id`: Subject the record belongs to
//! - `date`: Local calendar date of the time-in (`YYYY-MM-DD`)
//! - `time_in`: Time-in (RFC 3339, UTC)
//! - `time_out`: Time-out (RFC 3339, UTC), empty while the session is open
//! - `duration_minutes`: Whole minutes between the two, empty while open
//!
//! # Example
//!
//! ```no_run
//! use gymgate::output::csv::AttendanceCsv;
//!
//! let output = AttendanceCsv::new(&[]);
//! output.write_to(std::io::stdout()).unwrap();
//! ```

use std::io;

use chrono::SecondsFormat;
use serde::Serialize;
use thiserror::Error;

use crate::attendance::AttendanceRecord;

/// Errors that can occur during CSV output generation.
#[derive(Debug, Error)]
pub enum CsvOutputError {
    /// I/O error during writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error during CSV serialization.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Serialize)]
struct CsvRow {
    id: i64,
    subject_id: String,
    date: String,
    time_in: String,
    time_out: Option<String>,
    duration_minutes: Option<i64>,
}

impl From<&AttendanceRecord> for CsvRow {
    fn from(record: &AttendanceRecord) -> Self {
        Self {
            id: record.id.0,
            subject_id: record.subject_id.to_string(),
            date: record.date.format("%Y-%m-%d").to_string(),
            time_in: record.time_in.to_rfc3339_opts(SecondsFormat::Secs, true),
            time_out: record
                .time_out
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            duration_minutes: record.duration().map(|d| d.num_minutes()),
        }
    }
}

/// CSV output formatter.
pub struct AttendanceCsv<'a> {
    records: &'a [AttendanceRecord],
}

impl<'a> AttendanceCsv<'a> {
    /// Create a new CSV output formatter.
    #[must_use]
    pub fn new(records: &'a [AttendanceRecord]) -> Self {
        Self { records }
    }

    /// Write the CSV output to the given writer.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if writing or serialization fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), CsvOutputError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        if self.records.is_empty() {
            // serialize() only emits the header with the first row
            csv_writer.write_record([
                "id",
                "subject_id",
                "date",
                "time_in",
                "time_out",
                "duration_minutes",
            ])?;
        }
        for record in self.records {
            csv_writer.serialize(CsvRow::from(record))?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Generate CSV output as a string.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if serialization fails.
    pub fn to_string(&self) -> Result<String, CsvOutputError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}
