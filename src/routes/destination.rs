//! Resolved navigation targets.

use serde::Serialize;
use std::collections::BTreeMap;

use super::descriptor::{AccessRule, Intent};

/// One descriptor on the matched chain of a destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedRoute {
    /// Route name, if the descriptor has one.
    pub name: Option<String>,
    /// Absolute path template.
    pub template: String,
    /// Access rule declared on this descriptor.
    pub access: AccessRule,
    /// Display title declared on this descriptor.
    pub title: Option<String>,
    /// Intents declared on this descriptor.
    pub intents: Vec<Intent>,
}

/// The target of a navigation: a concrete path, its parameters and the chain of
/// descriptors (outermost first) that matched it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Destination {
    /// Concrete path.
    pub path: String,
    /// Path parameters.
    pub params: BTreeMap<String, String>,
    /// Matched descriptors, parent first. Never empty.
    pub matched: Vec<MatchedRoute>,
}

impl Destination {
    /// The innermost matched descriptor.
    #[must_use]
    pub fn leaf(&self) -> Option<&MatchedRoute> {
        self.matched.last()
    }

    /// Name of the innermost descriptor.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.leaf().and_then(|m| m.name.as_deref())
    }

    /// Whether any matched descriptor requires an active subject.
    #[must_use]
    pub fn requires_auth(&self) -> bool {
        self.matched.iter().any(|m| m.access.requires_auth())
    }

    /// Whether any matched descriptor requires the absence of a subject.
    #[must_use]
    pub fn requires_unauth(&self) -> bool {
        self.matched.iter().any(|m| m.access.requires_unauth())
    }

    /// Title of the deepest descriptor that declares one.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.matched.iter().rev().find_map(|m| m.title.as_deref())
    }

    /// Intents of the whole chain, outermost descriptor first.
    #[must_use]
    pub fn intents(&self) -> Vec<Intent> {
        self.matched
            .iter()
            .flat_map(|m| m.intents.iter().copied())
            .collect()
    }

    /// A path parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Human-readable label, the route name when present.
    #[must_use]
    pub fn label(&self) -> &str {
        self.name().unwrap_or(&self.path)
    }
}
