//! The navigation dispatcher.
//!
//! One navigation is: resolve the request against the route table, ask the
//! guard, follow redirects (bounded), run the destination's intents in order
//! and await each, commit, then apply the title. Intent failures are recorded
//! and never stop the navigation from committing.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::intent::{IntentContext, IntentOutcome, IntentRegistry};
use super::title::TitleApplier;
use crate::auth::AuthContext;
use crate::clock::{Clock, SystemClock};
use crate::guard::{AccessGuard, GuardDecision};
use crate::routes::{Destination, Intent, RouteError, RouteTable};

/// Default bound on redirect hops per navigation.
pub const DEFAULT_MAX_REDIRECTS: usize = 8;

/// Default bound on a single intent.
pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Navigation failures. Intent failures are not among them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    /// The request (or a redirect target) could not be resolved.
    #[error(transparent)]
    Route(#[from] RouteError),

    /// Redirects did not settle within the hop limit.
    #[error("redirect loop while navigating to '{origin}': {}", .chain.join(" -> "))]
    RedirectLoop {
        /// Label of the originally requested destination.
        origin: String,
        /// Targets visited, in order.
        chain: Vec<String>,
    },
}

/// What to navigate to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationRequest {
    /// A location such as `/application/dashboard?tab=1`.
    Path(String),
    /// A named route with path parameters.
    Named {
        name: String,
        params: BTreeMap<String, String>,
    },
}

impl NavigationRequest {
    #[must_use]
    pub fn path(location: impl Into<String>) -> Self {
        Self::Path(location.into())
    }

    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a path parameter to a named request. No-op for paths.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Self::Named { params, .. } = &mut self {
            params.insert(key.into(), value.into());
        }
        self
    }
}

/// Why the navigation was diverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectCause {
    Guard,
    Intent,
}

/// One redirect hop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectHop {
    /// Label of the destination that was refused.
    pub from: String,
    /// Route redirected to.
    pub to: String,
    pub cause: RedirectCause,
}

/// Report of one intent run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntentReport {
    pub intent: Intent,
    pub outcome: IntentOutcome,
}

/// The contract consumed by the screen renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreenView {
    pub name: Option<String>,
    pub params: BTreeMap<String, String>,
    pub title: String,
}

/// A committed navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationOutcome {
    /// Where the navigation ended up.
    pub destination: Destination,
    /// Redirects taken on the way, in order.
    pub redirects: Vec<RedirectHop>,
    /// Intents run on the committed destination chain.
    pub intents: Vec<IntentReport>,
    /// Title applied after commit.
    pub title: String,
}

impl NavigationOutcome {
    /// Whether any redirect happened.
    #[must_use]
    pub fn was_redirected(&self) -> bool {
        !self.redirects.is_empty()
    }

    /// Reports of intents that failed.
    pub fn failed_intents(&self) -> impl Iterator<Item = &IntentReport> {
        self.intents
            .iter()
            .filter(|r| matches!(r.outcome, IntentOutcome::Failed(_)))
    }

    /// Whether any intent failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed_intents().next().is_some()
    }

    /// What the screen renderer should show.
    #[must_use]
    pub fn screen(&self) -> ScreenView {
        ScreenView {
            name: self.destination.name().map(str::to_string),
            params: self.destination.params.clone(),
            title: self.title.clone(),
        }
    }
}

/// Sequences guard, intents and title for every navigation.
pub struct Dispatcher {
    table: Arc<RouteTable>,
    guard: AccessGuard,
    intents: IntentRegistry,
    titles: TitleApplier,
    clock: Arc<dyn Clock>,
    max_redirects: usize,
    hook_timeout: Duration,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.table.len())
            .field("guard", &self.guard)
            .field("intents", &self.intents)
            .field("titles", &self.titles)
            .field("max_redirects", &self.max_redirects)
            .field("hook_timeout", &self.hook_timeout)
            .finish()
    }
}

impl Dispatcher {
    /// Dispatcher over `table` with no intents registered and default settings.
    #[must_use]
    pub fn new(table: Arc<RouteTable>) -> Self {
        Self {
            table,
            guard: AccessGuard::default(),
            intents: IntentRegistry::new(),
            titles: TitleApplier::default(),
            clock: Arc::new(SystemClock),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            hook_timeout: DEFAULT_HOOK_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_guard(mut self, guard: AccessGuard) -> Self {
        self.guard = guard;
        self
    }

    #[must_use]
    pub fn with_intents(mut self, intents: IntentRegistry) -> Self {
        self.intents = intents;
        self
    }

    #[must_use]
    pub fn with_titles(mut self, titles: TitleApplier) -> Self {
        self.titles = titles;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    #[must_use]
    pub fn with_hook_timeout(mut self, hook_timeout: Duration) -> Self {
        self.hook_timeout = hook_timeout;
        self
    }

    #[must_use]
    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Title currently displayed.
    #[must_use]
    pub fn current_title(&self) -> String {
        self.titles.current()
    }

    /// Perform one navigation.
    ///
    /// # Errors
    ///
    /// Resolution failures of the request or a redirect target, and redirect
    /// chains longer than the configured bound.
    pub async fn navigate(
        &self,
        request: &NavigationRequest,
        auth: &AuthContext,
    ) -> Result<NavigationOutcome, NavigationError> {
        let mut destination = self.resolve(request)?;
        let origin = destination.label().to_string();
        let mut redirects: Vec<RedirectHop> = Vec::new();
        let has_subject = auth.has_active_subject();

        loop {
            let (target, cause, reports) = match self.guard.decide(&destination, has_subject) {
                GuardDecision::Redirect(target) => (target, RedirectCause::Guard, Vec::new()),
                GuardDecision::Allow => {
                    let reports = self.run_intents(&destination, auth).await;
                    let redirect = reports.iter().find_map(|r| match &r.outcome {
                        IntentOutcome::Redirect(target) => Some(target.clone()),
                        _ => None,
                    });
                    match redirect {
                        Some(target) => (target, RedirectCause::Intent, reports),
                        None => {
                            let title = self.titles.apply(&destination);
                            log::info!("Navigated to {} ({})", destination.label(), destination.path);
                            return Ok(NavigationOutcome {
                                destination,
                                redirects,
                                intents: reports,
                                title,
                            });
                        }
                    }
                }
            };

            if !reports.is_empty() {
                log::debug!("Intents ran before redirect: {:?}", reports);
            }
            log::debug!("Redirecting {} -> {} ({:?})", destination.label(), target, cause);
            redirects.push(RedirectHop {
                from: destination.label().to_string(),
                to: target.clone(),
                cause,
            });
            if redirects.len() > self.max_redirects {
                log::warn!("Redirect loop detected starting at '{}'", origin);
                return Err(NavigationError::RedirectLoop {
                    origin,
                    chain: redirects.into_iter().map(|hop| hop.to).collect(),
                });
            }
            destination = self.table.resolve_redirect(&target, &destination.path)?;
        }
    }

    fn resolve(&self, request: &NavigationRequest) -> Result<Destination, RouteError> {
        match request {
            NavigationRequest::Path(location) => self.table.resolve(location),
            NavigationRequest::Named { name, params } => self.table.resolve_named(name, params),
        }
    }

    /// Run every intent of the chain in order, stopping at the first redirect.
    async fn run_intents(&self, destination: &Destination, auth: &AuthContext) -> Vec<IntentReport> {
        let ctx = IntentContext {
            destination,
            auth,
            now: self.clock.now(),
        };
        let mut reports = Vec::new();
        for intent in destination.intents() {
            let outcome =
                match tokio::time::timeout(self.hook_timeout, self.intents.run(intent, &ctx)).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        // The handler was dropped mid-call, so it never notified
                        log::error!(
                            "Intent '{}' abandoned after {:?}; hook timeout must exceed the store timeout",
                            intent,
                            self.hook_timeout
                        );
                        IntentOutcome::Failed(format!(
                            "intent '{}' timed out after {:?}",
                            intent, self.hook_timeout
                        ))
                    }
                };
            let redirected = matches!(outcome, IntentOutcome::Redirect(_));
            reports.push(IntentReport { intent, outcome });
            if redirected {
                break;
            }
        }
        reports
    }
}
