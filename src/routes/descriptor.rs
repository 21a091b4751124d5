//! Route descriptors: the static, declarative navigation surface.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Who may enter a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessRule {
    /// No redirect rule.
    #[default]
    Public,
    /// Only reachable with an active subject.
    RequiresAuth,
    /// Only reachable without an active subject (login, register, landing page).
    RequiresUnauth,
}

impl AccessRule {
    /// Build the rule from the two declarative flags.
    ///
    /// Returns `None` when both flags are set; callers treat such a descriptor as
    /// public.
    #[must_use]
    pub fn from_flags(requires_auth: bool, requires_unauth: bool) -> Option<Self> {
        match (requires_auth, requires_unauth) {
            (true, true) => None,
            (true, false) => Some(Self::RequiresAuth),
            (false, true) => Some(Self::RequiresUnauth),
            (false, false) => Some(Self::Public),
        }
    }

    /// `true` for [`AccessRule::RequiresAuth`].
    #[must_use]
    pub fn requires_auth(self) -> bool {
        matches!(self, Self::RequiresAuth)
    }

    /// `true` for [`AccessRule::RequiresUnauth`].
    #[must_use]
    pub fn requires_unauth(self) -> bool {
        matches!(self, Self::RequiresUnauth)
    }
}

/// A named side effect resolved while navigating to a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Open an attendance session (time in).
    BeginSession,
    /// Close the subject's open attendance session (time out).
    EndSession,
}

impl Intent {
    /// All known intents.
    pub const ALL: [Intent; 2] = [Intent::BeginSession, Intent::EndSession];

    /// Stable snake_case name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::BeginSession => "begin_session",
            Self::EndSession => "end_session",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|intent| intent.name() == s)
            .ok_or_else(|| {
                format!(
                    "unknown intent '{}', expected one of: {}",
                    s,
                    Self::ALL.map(Intent::name).join(", ")
                )
            })
    }
}

/// One entry of the route table.
///
/// Child paths are relative to the parent unless they start with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RouteDescriptor {
    /// Route name used for named navigation and redirects.
    pub name: Option<String>,
    /// Path template (`users/:id`, `/:pathMatch(.*)*`).
    pub path: String,
    /// Access rule declared on this descriptor.
    pub access: AccessRule,
    /// Display title.
    pub title: Option<String>,
    /// Intents resolved before the route commits, in order.
    pub intents: Vec<Intent>,
    /// Nested routes.
    pub children: Vec<RouteDescriptor>,
}

impl RouteDescriptor {
    /// Start a descriptor for `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Set the route name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the display title.
    #[must_use]
    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the access rule.
    #[must_use]
    pub fn with_access(mut self, access: AccessRule) -> Self {
        self.access = access;
        self
    }

    /// Shorthand for [`AccessRule::RequiresAuth`].
    #[must_use]
    pub fn requires_auth(self) -> Self {
        self.with_access(AccessRule::RequiresAuth)
    }

    /// Shorthand for [`AccessRule::RequiresUnauth`].
    #[must_use]
    pub fn requires_unauth(self) -> Self {
        self.with_access(AccessRule::RequiresUnauth)
    }

    /// Append an intent.
    #[must_use]
    pub fn with_intent(mut self, intent: Intent) -> Self {
        self.intents.push(intent);
        self
    }

    /// Replace the children.
    #[must_use]
    pub fn with_children(mut self, children: Vec<RouteDescriptor>) -> Self {
        self.children = children;
        self
    }
}

/// Serialized form of a route descriptor, as written in a routes file.
///
/// ```toml
/// [[routes]]
/// path = "/login"
/// name = "login"
/// requires_unauth = true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteSpec {
    pub path: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub requires_auth: bool,
    #[serde(default)]
    pub requires_unauth: bool,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub intents: Vec<Intent>,
    #[serde(default)]
    pub children: Vec<RouteSpec>,
}

impl RouteSpec {
    /// Convert into a descriptor.
    ///
    /// Conflicting access flags make the descriptor public (fail-open), with a warning.
    #[must_use]
    pub fn into_descriptor(self) -> RouteDescriptor {
        let access = match AccessRule::from_flags(self.requires_auth, self.requires_unauth) {
            Some(access) => access,
            None => {
                log::warn!(
                    "Route '{}' sets both requires_auth and requires_unauth; treating it as public",
                    self.name.as_deref().unwrap_or(&self.path)
                );
                AccessRule::Public
            }
        };

        RouteDescriptor {
            name: self.name,
            path: self.path,
            access,
            title: self.title,
            intents: self.intents,
            children: self
                .children
                .into_iter()
                .map(RouteSpec::into_descriptor)
                .collect(),
        }
    }
}
