//! Plain text rendering for the terminal.

use std::fmt::Write as _;

use chrono::{DateTime, Local, Utc};
use yansi::Paint;

use crate::attendance::{AttendanceRecord, SessionState};
use crate::navigation::{IntentOutcome, NavigationOutcome};
use crate::routes::RouteSummary;

/// Text renderer; colour is optional.
#[derive(Debug, Clone, Copy)]
pub struct TextOutput {
    use_color: bool,
}

impl TextOutput {
    #[must_use]
    pub fn new(use_color: bool) -> Self {
        Self { use_color }
    }

    fn bold(&self, text: &str) -> String {
        if self.use_color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn dim(&self, text: &str) -> String {
        if self.use_color {
            text.dim().to_string()
        } else {
            text.to_string()
        }
    }

    /// The committed screen, redirects and intent results.
    #[must_use]
    pub fn navigation(&self, outcome: &NavigationOutcome) -> String {
        let mut out = String::new();
        let screen = outcome.screen();
        let _ = writeln!(
            out,
            "{} {}",
            self.bold(&screen.title),
            self.dim(&format!(
                "[{} {}]",
                screen.name.as_deref().unwrap_or("-"),
                outcome.destination.path
            ))
        );
        for (key, value) in &screen.params {
            let _ = writeln!(out, "  {} = {}", key, value);
        }
        for hop in &outcome.redirects {
            let _ = writeln!(out, "  redirected from {} to {}", hop.from, hop.to);
        }
        for report in &outcome.intents {
            let line = match &report.outcome {
                IntentOutcome::Allowed => format!("{}: ok", report.intent),
                IntentOutcome::Redirect(to) => format!("{}: redirect to {}", report.intent, to),
                IntentOutcome::Failed(reason) => {
                    format!("{}: failed ({})", report.intent, reason)
                }
            };
            let _ = writeln!(out, "  {}", line);
        }
        out
    }

    /// One subject's state on one day.
    #[must_use]
    pub fn status(&self, subject: &str, date: chrono::NaiveDate, state: &SessionState) -> String {
        let mut out = format!("{} on {}: {}\n", subject, date, self.bold(state.label()));
        match state {
            SessionState::NoSession => {}
            SessionState::Open(record) => {
                let _ = writeln!(out, "  in since {}", local_time(record.time_in));
            }
            SessionState::Closed(record) => {
                let _ = writeln!(out, "  {}", self.record_line(record));
            }
        }
        out
    }

    /// Attendance listing with a total.
    #[must_use]
    pub fn history(&self, subject: &str, records: &[AttendanceRecord]) -> String {
        if records.is_empty() {
            return format!("No attendance records for {}\n", subject);
        }
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.bold(&format!("Attendance of {}", subject)));
        for record in records {
            let _ = writeln!(out, "  {}", self.record_line(record));
        }
        let minutes: i64 = records
            .iter()
            .filter_map(AttendanceRecord::duration)
            .map(|d| d.num_minutes())
            .sum();
        let _ = writeln!(
            out,
            "{} record(s), {}h{:02}m recorded",
            records.len(),
            minutes / 60,
            minutes % 60
        );
        out
    }

    /// The route table.
    #[must_use]
    pub fn routes(&self, routes: &[RouteSummary]) -> String {
        let width = routes.iter().map(|r| r.name.len()).max().unwrap_or(0);
        let mut out = String::new();
        for route in routes {
            let access = if route.requires_auth {
                "auth"
            } else if route.requires_unauth {
                "guest"
            } else {
                "public"
            };
            let mut line = format!(
                "{:<width$}  {:<6}  {}",
                route.name,
                access,
                route.template,
                width = width
            );
            if !route.intents.is_empty() {
                let _ = write!(line, "  [{}]", route.intents.join(", "));
            }
            let _ = writeln!(out, "{}", line);
        }
        out
    }

    fn record_line(&self, record: &AttendanceRecord) -> String {
        match (record.time_out, record.duration()) {
            (Some(out), Some(duration)) => format!(
                "{} {} - {} ({}m)",
                self.dim(&record.id.to_string()),
                local_time(record.time_in),
                local_time(out),
                duration.num_minutes()
            ),
            _ => format!(
                "{} {} - open",
                self.dim(&record.id.to_string()),
                local_time(record.time_in)
            ),
        }
    }
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::{NewAttendanceRecord, RecordId};
    use crate::auth::SubjectId;

    fn record(closed_minutes: Option<i64>) -> AttendanceRecord {
        let mut record = NewAttendanceRecord::open_at(
            SubjectId::new("U1").unwrap(),
            DateTime::parse_from_rfc3339("2024-01-01T09:00:00Z").unwrap(),
        )
        .with_id(RecordId(7));
        record.time_out = closed_minutes.map(|m| record.time_in + chrono::Duration::minutes(m));
        record
    }

    #[test]
    fn test_history_totals() {
        let text = TextOutput::new(false).history("U1", &[record(Some(75)), record(None)]);
        assert!(text.contains("Attendance of U1"));
        assert!(text.contains("(75m)"));
        assert!(text.contains("- open"));
        assert!(text.contains("2 record(s), 1h15m recorded"));
    }

    #[test]
    fn test_empty_history() {
        assert_eq!(
            TextOutput::new(false).history("U2", &[]),
            "No attendance records for U2\n"
        );
    }

    #[test]
    fn test_status_labels() {
        let out = TextOutput::new(false);
        let day = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(out.status("U1", day, &SessionState::NoSession).contains("no session"));
        assert!(out
            .status("U1", day, &SessionState::Open(record(None)))
            .contains("in since"));
    }
}
