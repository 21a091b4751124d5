//! Recording notifier.

use std::sync::Mutex;

use super::{Notification, NotificationKind, Notifier};

/// Keeps every notification in memory, in delivery order.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    delivered: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the delivered notifications.
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        match self.delivered.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// The most recent notification.
    #[must_use]
    pub fn last(&self) -> Option<Notification> {
        self.notifications().pop()
    }

    /// Number of notifications of the given kind.
    #[must_use]
    pub fn count(&self, kind: NotificationKind) -> usize {
        self.notifications()
            .iter()
            .filter(|n| n.kind == kind)
            .count()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, kind: NotificationKind, title: &str, message: &str) {
        let notification = Notification {
            kind,
            title: title.to_string(),
            message: message.to_string(),
        };
        match self.delivered.lock() {
            Ok(mut guard) => guard.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
    }
}
