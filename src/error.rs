//! Structured error handling and exit codes.

use serde::Serialize;

/// Exit codes for the GymGate binary.
///
/// - 0: Success (command completed, navigation committed where it was asked for)
/// - 1: General error (unexpected failure, unresolvable route, bad config)
/// - 2: Redirected (navigation committed somewhere other than requested)
/// - 3: Action failed (an attendance action reported a failure)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: the command completed as requested.
    Success = 0,
    /// General error: An unexpected error occurred.
    GeneralError = 1,
    /// Redirected: the guard or an intent diverted the navigation.
    Redirected = 2,
    /// Action failed: an attendance intent failed, the navigation still committed.
    ActionFailed = 3,
    /// Interrupted: the command was interrupted by user (Ctrl+C).
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "GG000",
            Self::GeneralError => "GG001",
            Self::Redirected => "GG002",
            Self::ActionFailed => "GG003",
            Self::Interrupted => "GG130",
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "GG001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Error chain, outermost context first
    pub causes: Vec<String>,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: err.to_string(),
            causes: err.chain().skip(1).map(ToString::to_string).collect(),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}

/// Pick the exit code for an error that escaped `run_app`.
#[must_use]
pub fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    let cancelled = err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<crate::attendance::StoreError>(),
            Some(crate::attendance::StoreError::Cancelled)
        ) || matches!(
            cause.downcast_ref::<crate::attendance::AttendanceError>(),
            Some(crate::attendance::AttendanceError::Cancelled)
        )
    });
    if cancelled {
        ExitCode::Interrupted
    } else {
        ExitCode::GeneralError
    }
}
