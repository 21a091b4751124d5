//! Named navigation intents and their handlers.
//!
//! A route declares intents by name; the dispatcher looks each one up in an
//! [`IntentRegistry`] and awaits the handler before committing the navigation.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::attendance::AttendanceManager;
use crate::auth::{AuthContext, SubjectId};
use crate::routes::{Destination, Intent};

/// Where the attendance intents take the subject identifier from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    /// The authenticated subject records its own attendance.
    #[default]
    Session,
    /// The `:id` parameter of the destination names the subject.
    PathParam,
}

/// Result of running one intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum IntentOutcome {
    /// Navigation may continue.
    Allowed,
    /// Navigation should continue to the named route instead.
    Redirect(String),
    /// The intent failed; navigation continues regardless.
    Failed(String),
}

/// What a handler gets to see.
#[derive(Debug, Clone, Copy)]
pub struct IntentContext<'a> {
    pub destination: &'a Destination,
    pub auth: &'a AuthContext,
    pub now: DateTime<FixedOffset>,
}

/// Async handler bound to one [`Intent`].
#[async_trait]
pub trait IntentHandler: Send + Sync {
    /// Run the intent. Failures are reported as [`IntentOutcome::Failed`].
    async fn handle(&self, ctx: &IntentContext<'_>) -> IntentOutcome;
}

/// Intent name to handler mapping.
#[derive(Default, Clone)]
pub struct IntentRegistry {
    handlers: HashMap<Intent, Arc<dyn IntentHandler>>,
}

impl std::fmt::Debug for IntentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut registered: Vec<&str> = self.handlers.keys().map(|i| i.name()).collect();
        registered.sort_unstable();
        f.debug_struct("IntentRegistry")
            .field("handlers", &registered)
            .finish()
    }
}

impl IntentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register both attendance intents against `manager`.
    #[must_use]
    pub fn attendance(manager: Arc<AttendanceManager>, source: IdentitySource) -> Self {
        let mut registry = Self::new();
        for intent in Intent::ALL {
            registry.register(
                intent,
                Arc::new(AttendanceIntentHandler::new(manager.clone(), intent, source)),
            );
        }
        registry
    }

    /// Bind `handler` to `intent`, replacing any previous binding.
    pub fn register(&mut self, intent: Intent, handler: Arc<dyn IntentHandler>) {
        self.handlers.insert(intent, handler);
    }

    #[must_use]
    pub fn get(&self, intent: Intent) -> Option<&Arc<dyn IntentHandler>> {
        self.handlers.get(&intent)
    }

    /// Run `intent`; an unregistered intent fails without side effects.
    pub async fn run(&self, intent: Intent, ctx: &IntentContext<'_>) -> IntentOutcome {
        match self.handlers.get(&intent) {
            Some(handler) => handler.handle(ctx).await,
            None => {
                log::warn!("No handler registered for intent '{}'", intent);
                IntentOutcome::Failed(format!("no handler registered for intent '{}'", intent))
            }
        }
    }
}

/// Records time-in or time-out for the subject of the navigation.
pub struct AttendanceIntentHandler {
    manager: Arc<AttendanceManager>,
    intent: Intent,
    source: IdentitySource,
}

impl AttendanceIntentHandler {
    #[must_use]
    pub fn new(manager: Arc<AttendanceManager>, intent: Intent, source: IdentitySource) -> Self {
        Self {
            manager,
            intent,
            source,
        }
    }

    fn subject_id(&self, ctx: &IntentContext<'_>) -> Option<SubjectId> {
        match self.source {
            IdentitySource::Session => ctx.auth.subject_id().cloned(),
            // Routes without an :id fall back to the session subject
            IdentitySource::PathParam => match ctx.destination.param("id") {
                Some(id) => SubjectId::new(id),
                None => ctx.auth.subject_id().cloned(),
            },
        }
    }
}

#[async_trait]
impl IntentHandler for AttendanceIntentHandler {
    async fn handle(&self, ctx: &IntentContext<'_>) -> IntentOutcome {
        let subject_id = self.subject_id(ctx);
        let result = match self.intent {
            Intent::BeginSession => {
                self.manager
                    .begin_session(subject_id.as_ref(), ctx.now)
                    .await
            }
            Intent::EndSession => self.manager.end_session(subject_id.as_ref(), ctx.now).await,
        };
        match result {
            Ok(_) => IntentOutcome::Allowed,
            Err(e) => IntentOutcome::Failed(e.to_string()),
        }
    }
}
