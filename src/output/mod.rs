//! Output formatters for command results.
//!
//! - text for the terminal
//! - JSON for automation and scripting
//! - CSV for spreadsheet import of attendance
//!
//! # Example
//!
//! ```
//! use gymgate::output::text::TextOutput;
//!
//! let text = TextOutput::new(false).history("U1", &[]);
//! assert_eq!(text, "No attendance records for U1\n");
//! ```

pub mod csv;
pub mod json;
pub mod text;

// Re-export main types
pub use csv::{AttendanceCsv, CsvOutputError};
pub use json::{JsonAttendance, JsonNavigation, JsonRoutes, JsonStatus};
pub use text::TextOutput;
