//! The access-control decision.

use serde::Serialize;

use crate::auth::AuthContext;
use crate::routes::gym::{LOGIN, NOT_FOUND};
use crate::routes::Destination;

/// Outcome of an access check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "target", rename_all = "snake_case")]
pub enum GuardDecision {
    /// Proceed to the destination.
    Allow,
    /// Navigate to the named route instead.
    Redirect(String),
}

impl GuardDecision {
    /// `true` for [`GuardDecision::Allow`].
    #[must_use]
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Stateless access guard.
///
/// Holds only the names of the two redirect targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGuard {
    login_route: String,
    fallback_route: String,
}

impl Default for AccessGuard {
    fn default() -> Self {
        Self::new(LOGIN, NOT_FOUND)
    }
}

impl AccessGuard {
    /// Create a guard redirecting to `login_route` and `fallback_route`.
    #[must_use]
    pub fn new(login_route: impl Into<String>, fallback_route: impl Into<String>) -> Self {
        Self {
            login_route: login_route.into(),
            fallback_route: fallback_route.into(),
        }
    }

    /// Route used when a protected destination is requested anonymously.
    #[must_use]
    pub fn login_route(&self) -> &str {
        &self.login_route
    }

    /// Route used when an unauth-only destination is requested with a subject.
    #[must_use]
    pub fn fallback_route(&self) -> &str {
        &self.fallback_route
    }

    /// Decide whether `destination` may be entered.
    ///
    /// # Rules
    ///
    /// 1. Requires auth and no active subject: redirect to login.
    /// 2. Requires unauth and an active subject: redirect to the fallback.
    /// 3. Otherwise allow.
    #[must_use]
    pub fn decide(&self, destination: &Destination, has_active_subject: bool) -> GuardDecision {
        let decision = if destination.requires_auth() && !has_active_subject {
            GuardDecision::Redirect(self.login_route.clone())
        } else if destination.requires_unauth() && has_active_subject {
            GuardDecision::Redirect(self.fallback_route.clone())
        } else {
            GuardDecision::Allow
        };

        log::debug!(
            "Guard: '{}' (subject: {}) -> {:?}",
            destination.label(),
            has_active_subject,
            decision
        );
        decision
    }

    /// [`AccessGuard::decide`] against an auth context.
    #[must_use]
    pub fn decide_for(&self, destination: &Destination, auth: &AuthContext) -> GuardDecision {
        self.decide(destination, auth.has_active_subject())
    }
}
