//! Route descriptors, path matching and the compiled route table.
//!
//! # Architecture
//!
//! * [`descriptor`]: Declarative route entries, access rules and intents.
//! * [`matcher`]: Path template compilation, matching and building.
//! * [`destination`]: The resolved target handed to the guard and dispatcher.
//! * [`table`]: The compiled, ranked table with path and named resolution.
//! * [`gym`]: The built-in gym client table.

pub mod descriptor;
pub mod destination;
pub mod gym;
pub mod matcher;
pub mod table;

use thiserror::Error;

pub use descriptor::{AccessRule, Intent, RouteDescriptor, RouteSpec};
pub use destination::{Destination, MatchedRoute};
pub use gym::gym_routes;
pub use matcher::PathTemplate;
pub use table::{RouteSummary, RouteTable};

/// Errors raised while building or resolving routes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// A path template could not be compiled.
    #[error("invalid route template '{template}': {reason}")]
    InvalidTemplate {
        /// Offending template.
        template: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Two descriptors share a name.
    #[error("duplicate route name '{0}'")]
    DuplicateName(String),

    /// No template matches the location.
    #[error("no route matches '{0}'")]
    NoMatch(String),

    /// Named navigation to a route that does not exist.
    #[error("unknown route '{name}'{}", did_you_mean(.suggestion))]
    UnknownName {
        /// Requested name.
        name: String,
        /// Closest existing name.
        suggestion: Option<String>,
    },

    /// A required path parameter was not supplied.
    #[error("route '{template}' requires parameter '{param}'")]
    MissingParam {
        /// Template of the route.
        template: String,
        /// Missing parameter.
        param: String,
    },

    /// Supplied parameters produce a path the template does not accept.
    #[error("parameters for '{template}' produce invalid path '{path}'")]
    InvalidParam {
        /// Template of the route.
        template: String,
        /// Path that was built.
        path: String,
    },

    /// A routes file could not be read or parsed.
    #[error("failed to load routes: {0}")]
    Load(String),
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!(" (did you mean '{}'?)", s))
        .unwrap_or_default()
}
