//! Command-line interface definitions for GymGate.
//!
//! Every navigating subcommand goes through the same dispatcher the gym client
//! uses: the access guard decides, attendance intents run, then the committed
//! screen is printed.
//!
//! # Example
//!
//! ```bash
//! # Sign in and record a time-in
//! gymgate login U1
//! gymgate time-in
//!
//! # Navigate by path or by route name
//! gymgate navigate /application/dashboard
//! gymgate open ShowUser --param id=42
//!
//! # Today's attendance as CSV
//! gymgate attendance --output csv
//! ```

use chrono::{DateTime, FixedOffset, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::attendance::ConsistencyMode;
use crate::navigation::IdentitySource;

/// Access-guarded navigation and attendance tracking for the gym client.
#[derive(Debug, Parser)]
#[command(name = "gymgate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Attendance database file
    #[arg(long, global = true, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Local session storage file
    #[arg(long, global = true, value_name = "PATH")]
    pub storage: Option<PathBuf>,

    /// Route table (TOML) replacing the built-in gym routes
    #[arg(long, global = true, value_name = "PATH")]
    pub routes: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Store a subject as the signed-in user
    Login(LoginArgs),
    /// Remove the signed-in user
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Navigate to a location
    Navigate(NavigateArgs),
    /// Navigate to a named route
    Open(OpenArgs),
    /// Record a time-in through the attendance route
    TimeIn(AttendanceActionArgs),
    /// Record a time-out through the attendance route
    TimeOut(AttendanceActionArgs),
    /// Show the attendance state of a subject for one day
    Status(StatusArgs),
    /// List attendance records
    Attendance(HistoryArgs),
    /// List the route table
    Routes(RoutesArgs),
}

/// Arguments for `login`.
#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Subject identifier
    #[arg(value_name = "ID")]
    pub id: String,

    /// Session token to store with the subject
    #[arg(long, default_value = "local")]
    pub token: String,
}

/// Arguments for `navigate`.
#[derive(Debug, Args)]
pub struct NavigateArgs {
    /// Location, e.g. /application/users/42
    #[arg(value_name = "PATH")]
    pub path: String,

    #[command(flatten)]
    pub nav: NavOptions,
}

/// Arguments for `open`.
#[derive(Debug, Args)]
pub struct OpenArgs {
    /// Route name, e.g. ShowUser
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Path parameter as key=value (repeatable)
    #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, String)>,

    #[command(flatten)]
    pub nav: NavOptions,
}

/// Arguments for `time-in` / `time-out`.
#[derive(Debug, Args)]
pub struct AttendanceActionArgs {
    /// Record for this subject through the staff route instead of the signed-in user
    #[arg(long = "for", value_name = "ID")]
    pub subject: Option<String>,

    #[command(flatten)]
    pub nav: NavOptions,
}

/// Options shared by navigating subcommands.
#[derive(Debug, Clone, Args)]
pub struct NavOptions {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Use this time instead of the system clock (RFC 3339)
    #[arg(long, value_name = "TIMESTAMP", value_parser = parse_timestamp)]
    pub at: Option<DateTime<FixedOffset>>,

    /// Where attendance intents take the subject from
    #[arg(long, value_enum)]
    pub identity_source: Option<IdentitySourceArg>,

    /// How the one-open-session rule is maintained
    #[arg(long, value_enum)]
    pub consistency: Option<ConsistencyArg>,
}

/// Arguments for `status`.
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Subject (defaults to the signed-in user)
    #[arg(long = "for", value_name = "ID")]
    pub subject: Option<String>,

    /// Day to inspect (YYYY-MM-DD, defaults to today)
    #[arg(long, value_name = "DATE", value_parser = parse_date)]
    pub date: Option<NaiveDate>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for `attendance`.
#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Subject (defaults to the signed-in user)
    #[arg(long = "for", value_name = "ID")]
    pub subject: Option<String>,

    /// Only this day (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", value_parser = parse_date)]
    pub date: Option<NaiveDate>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Write to this file instead of stdout
    #[arg(long, value_name = "PATH")]
    pub output_file: Option<PathBuf>,
}

/// Arguments for `routes`.
#[derive(Debug, Args)]
pub struct RoutesArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON document
    Json,
    /// CSV (attendance listings only)
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

/// CLI spelling of [`IdentitySource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IdentitySourceArg {
    /// The signed-in subject
    Session,
    /// The `:id` route parameter
    PathParam,
}

impl From<IdentitySourceArg> for IdentitySource {
    fn from(arg: IdentitySourceArg) -> Self {
        match arg {
            IdentitySourceArg::Session => Self::Session,
            IdentitySourceArg::PathParam => Self::PathParam,
        }
    }
}

/// CLI spelling of [`ConsistencyMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConsistencyArg {
    /// Query, then write
    ReadThenWrite,
    /// Conditional store operations
    StoreEnforced,
}

impl From<ConsistencyArg> for ConsistencyMode {
    fn from(arg: ConsistencyArg) -> Self {
        match arg {
            ConsistencyArg::ReadThenWrite => Self::ReadThenWrite,
            ConsistencyArg::StoreEnforced => Self::StoreEnforced,
        }
    }
}

/// Parse a `key=value` route parameter.
pub fn parse_param(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in '{}'", s));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// Parse an RFC 3339 timestamp.
pub fn parse_timestamp(s: &str) -> Result<DateTime<FixedOffset>, String> {
    DateTime::parse_from_rfc3339(s.trim())
        .map_err(|e| format!("invalid timestamp '{}': {} (expected e.g. 2024-01-01T09:00:00Z)", s, e))
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| format!("invalid date '{}': {} (expected YYYY-MM-DD)", s, e))
}
