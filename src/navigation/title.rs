//! Display title applied after each committed navigation.

use std::sync::Mutex;

use crate::routes::Destination;

/// Title used when no matched descriptor declares one.
pub const DEFAULT_TITLE: &str = "Gym Management";

/// Holds the current display title.
#[derive(Debug)]
pub struct TitleApplier {
    default_title: String,
    current: Mutex<String>,
}

impl Default for TitleApplier {
    fn default() -> Self {
        Self::new(DEFAULT_TITLE)
    }
}

impl TitleApplier {
    #[must_use]
    pub fn new(default_title: impl Into<String>) -> Self {
        let default_title = default_title.into();
        Self {
            current: Mutex::new(default_title.clone()),
            default_title,
        }
    }

    /// Set the title from `destination` and return it.
    pub fn apply(&self, destination: &Destination) -> String {
        let title = destination
            .title()
            .unwrap_or(&self.default_title)
            .to_string();
        if let Ok(mut current) = self.current.lock() {
            current.clone_from(&title);
        }
        log::debug!("Title set to '{}'", title);
        title
    }

    /// The title last applied.
    #[must_use]
    pub fn current(&self) -> String {
        self.current
            .lock()
            .map(|t| t.clone())
            .unwrap_or_else(|_| self.default_title.clone())
    }
}
