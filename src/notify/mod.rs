//! User-facing notifications.
//!
//! Notifications are fire-and-forget: [`Notifier::notify`] returns nothing and
//! implementations must not fail the caller.

pub mod console;
pub mod memory;

use serde::Serialize;
use std::fmt;

pub use console::{ConsoleNotifier, LogNotifier};
pub use memory::MemoryNotifier;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Informational / success message.
    Info,
    /// Failure message.
    Error,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A delivered notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

/// Sink for user-facing notifications.
pub trait Notifier: Send + Sync {
    /// Deliver a notification.
    fn notify(&self, kind: NotificationKind, title: &str, message: &str);

    /// Shorthand for an [`NotificationKind::Info`] notification.
    fn info(&self, title: &str, message: &str) {
        self.notify(NotificationKind::Info, title, message);
    }

    /// Shorthand for an [`NotificationKind::Error`] notification.
    fn error(&self, title: &str, message: &str) {
        self.notify(NotificationKind::Error, title, message);
    }
}
