//! The authenticated subject and the per-navigation auth context.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::storage::{DurableStorage, StorageError};

/// Storage key under which the serialized current subject lives.
pub const SUBJECT_KEY: &str = "user";

/// Identifier of a subject (gym member or staff user).
///
/// Deserializing goes through [`SubjectId::new`], so a stored blank identifier
/// is rejected rather than accepted as a subject.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId(String);

impl SubjectId {
    /// Wrap a raw identifier.
    ///
    /// Returns `None` for blank identifiers, which can never name a subject.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == raw.len() {
            Some(Self(raw))
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SubjectId {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::new(raw).ok_or_else(|| "subject identifier is blank".to_string())
    }
}

impl From<SubjectId> for String {
    fn from(id: SubjectId) -> Self {
        id.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The authenticated user, as persisted in durable local storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Subject identifier.
    pub id: SubjectId,
    /// Opaque session token handed out at login.
    pub token: String,
}

impl Subject {
    /// Create a subject.
    #[must_use]
    pub fn new(id: SubjectId, token: impl Into<String>) -> Self {
        Self {
            id,
            token: token.into(),
        }
    }

    /// Persist this subject as the current one (login).
    pub fn store(&self, storage: &dyn DurableStorage) -> Result<(), StorageError> {
        let json = serde_json::to_string(self)?;
        storage.set(SUBJECT_KEY, &json)?;
        log::info!("Subject '{}' stored", self.id);
        Ok(())
    }

    /// Remove the current subject (logout).
    ///
    /// Returns `true` when a subject was present.
    pub fn clear(storage: &dyn DurableStorage) -> Result<bool, StorageError> {
        let removed = storage.remove(SUBJECT_KEY)?;
        if removed {
            log::info!("Subject cleared");
        }
        Ok(removed)
    }
}

/// Authentication state handed explicitly to the guard and intent handlers.
///
/// Presence of *any* stored value is what the guard checks. A value that fails to
/// parse still counts as an active subject, it just has no usable identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    present: bool,
    subject: Option<Subject>,
}

impl AuthContext {
    /// No subject stored.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A fully parsed subject.
    #[must_use]
    pub fn authenticated(subject: Subject) -> Self {
        Self {
            present: true,
            subject: Some(subject),
        }
    }

    /// Build the context from the raw stored value.
    #[must_use]
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            None => Self::anonymous(),
            Some(value) => {
                let subject = match serde_json::from_str::<Subject>(value) {
                    Ok(subject) => Some(subject),
                    Err(e) => {
                        log::warn!("Stored subject is unreadable, identity unavailable: {}", e);
                        None
                    }
                };
                Self {
                    present: true,
                    subject,
                }
            }
        }
    }

    /// Read the current subject from durable storage, once.
    ///
    /// A storage failure is logged and treated as "no subject", so protected
    /// destinations redirect to login rather than failing the navigation.
    #[must_use]
    pub fn load(storage: &dyn DurableStorage) -> Self {
        match storage.get(SUBJECT_KEY) {
            Ok(raw) => Self::from_raw(raw.as_deref()),
            Err(e) => {
                log::warn!("Failed to read subject from storage: {}", e);
                Self::anonymous()
            }
        }
    }

    /// Whether a subject is present at all.
    #[must_use]
    pub fn has_active_subject(&self) -> bool {
        self.present
    }

    /// The parsed subject, if any.
    #[must_use]
    pub fn subject(&self) -> Option<&Subject> {
        self.subject.as_ref()
    }

    /// Identifier of the parsed subject, if any.
    #[must_use]
    pub fn subject_id(&self) -> Option<&SubjectId> {
        self.subject.as_ref().map(|s| &s.id)
    }
}
