//! Navigation: the dispatcher and the hooks it sequences.
//!
//! # Architecture
//!
//! * [`dispatcher`]: Resolve, guard, redirect, run intents, commit, apply title.
//! * [`intent`]: Named intents, their async handlers and the registry.
//! * [`title`]: The post-commit title applier.

pub mod dispatcher;
pub mod intent;
pub mod title;

pub use dispatcher::{
    Dispatcher, IntentReport, NavigationError, NavigationOutcome, NavigationRequest,
    RedirectCause, RedirectHop, ScreenView, DEFAULT_HOOK_TIMEOUT, DEFAULT_MAX_REDIRECTS,
};
pub use intent::{
    AttendanceIntentHandler, IdentitySource, IntentContext, IntentHandler, IntentOutcome,
    IntentRegistry,
};
pub use title::{TitleApplier, DEFAULT_TITLE};
