//! Terminal and log notifiers.

use std::io::Write;
use yansi::Paint;

use super::{NotificationKind, Notifier};

/// Prints notifications to stderr, coloured unless disabled.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleNotifier {
    use_color: bool,
}

impl ConsoleNotifier {
    /// Create a console notifier.
    #[must_use]
    pub fn new(use_color: bool) -> Self {
        Self { use_color }
    }

    fn render(&self, kind: NotificationKind, title: &str, message: &str) -> String {
        let badge = match kind {
            NotificationKind::Info => "✔",
            NotificationKind::Error => "✘",
        };
        if !self.use_color {
            return format!("{} {}: {}", badge, title, message);
        }
        match kind {
            NotificationKind::Info => format!(
                "{} {}: {}",
                badge.green().bold(),
                title.bold(),
                message
            ),
            NotificationKind::Error => format!(
                "{} {}: {}",
                badge.red().bold(),
                title.red().bold(),
                message
            ),
        }
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, kind: NotificationKind, title: &str, message: &str) {
        let line = self.render(kind, title, message);
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{}", line);
        let _ = stderr.flush();
    }
}

/// Forwards notifications to the `log` facade only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, kind: NotificationKind, title: &str, message: &str) {
        match kind {
            NotificationKind::Info => log::info!("{}: {}", title, message),
            NotificationKind::Error => log::error!("{}: {}", title, message),
        }
    }
}
