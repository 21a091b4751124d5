//! Application configuration management.
//!
//! Configuration is layered with `figment`, later layers winning:
//!
//! 1. Built-in defaults
//! 2. TOML file (`--config PATH`, or `config.toml` in the platform config dir)
//! 3. `GYMGATE_*` environment variables (`__` separates nested keys)
//! 4. CLI flags, applied with [`Config::merge_cli`] and friends
//!
//! A broken file or environment value is reported with a warning and the
//! defaults are used; unknown keys get a "did you mean" hint.

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::attendance::ConsistencyMode;
use crate::cli::{Cli, NavOptions};
use crate::navigation::{IdentitySource, DEFAULT_MAX_REDIRECTS, DEFAULT_TITLE};
use crate::routes::gym::{LOGIN, NOT_FOUND};
use crate::routes::RouteTable;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "GYMGATE_";

const KNOWN_KEYS: &[&str] = &[
    "database",
    "storage",
    "routes_file",
    "store_timeout_ms",
    "hook_timeout_ms",
    "default_title",
    "login_route",
    "fallback_route",
    "max_redirects",
    "identity_source",
    "consistency",
    "use_color",
];

/// Configuration problems found by [`Config::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A timeout or limit is zero.
    #[error("'{key}' must be greater than zero")]
    Zero {
        /// Offending key.
        key: &'static str,
    },

    /// A redirect target is not a route name.
    #[error("'{key}' names unknown route '{route}'{}", hint(.suggestion))]
    UnknownRoute {
        /// Offending key.
        key: &'static str,
        /// Configured value.
        route: String,
        /// Closest route name.
        suggestion: Option<String>,
    },

    /// The intent deadline would cut a store call short.
    #[error(
        "'hook_timeout_ms' ({hook_ms}) must be greater than 'store_timeout_ms' ({store_ms})"
    )]
    HookNotAfterStore {
        /// Configured intent deadline.
        hook_ms: u64,
        /// Configured store call deadline.
        store_ms: u64,
    },

    /// The default title is blank.
    #[error("'default_title' must not be empty")]
    EmptyTitle,
}

fn hint(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!(" (did you mean '{}'?)", s))
        .unwrap_or_default()
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite attendance database.
    pub database: PathBuf,
    /// Local session storage (the signed-in subject).
    pub storage: PathBuf,
    /// Optional TOML route table replacing the built-in one.
    pub routes_file: Option<PathBuf>,
    /// Deadline for a single record store call.
    pub store_timeout_ms: u64,
    /// Deadline for a single navigation intent.
    pub hook_timeout_ms: u64,
    /// Title shown when a route declares none.
    pub default_title: String,
    /// Redirect target for anonymous access to protected routes.
    pub login_route: String,
    /// Redirect target for signed-in access to unauth-only routes.
    pub fallback_route: String,
    /// Redirect hop limit per navigation.
    pub max_redirects: usize,
    /// Where attendance intents take the subject from.
    pub identity_source: IdentitySource,
    /// How the one-open-session rule is maintained.
    pub consistency: ConsistencyMode,
    /// Colored notifications.
    pub use_color: bool,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = Self::data_dir();
        Self {
            database: data_dir.join("attendance.db"),
            storage: data_dir.join("session.json"),
            routes_file: None,
            store_timeout_ms: 5_000,
            hook_timeout_ms: 10_000,
            default_title: DEFAULT_TITLE.to_string(),
            login_route: LOGIN.to_string(),
            fallback_route: NOT_FOUND.to_string(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            identity_source: IdentitySource::default(),
            consistency: ConsistencyMode::default(),
            use_color: true,
        }
    }
}

impl Config {
    /// Load from the default config file location plus environment.
    #[must_use]
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from_path(path),
            None => Self::load_figment(Self::figment_base().merge(Self::env())),
        }
    }

    /// Load from `path` (missing files are fine) plus environment.
    #[must_use]
    pub fn load_from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if path.exists() {
            Self::warn_unknown_keys(path);
        } else {
            log::debug!("No config file at {}, using defaults", path.display());
        }
        Self::load_figment(Self::figment_base().merge(Toml::file(path)).merge(Self::env()))
    }

    /// Build the figment layers without the environment, for callers that
    /// want to add their own providers.
    #[must_use]
    pub fn figment_base() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
    }

    /// Environment provider (`GYMGATE_*`, nested with `__`).
    #[must_use]
    pub fn env() -> Env {
        Env::prefixed(ENV_PREFIX).split("__")
    }

    fn load_figment(figment: Figment) -> Self {
        match figment.extract::<Self>() {
            Ok(config) => config,
            Err(e) => {
                for error in e {
                    log::warn!("Invalid configuration, using defaults: {}", error);
                }
                Self::default()
            }
        }
    }

    fn warn_unknown_keys(path: &Path) {
        let Ok(content) = std::fs::read_to_string(path) else {
            return;
        };
        let Ok(table) = content.parse::<toml::Table>() else {
            return;
        };
        for key in table.keys() {
            if KNOWN_KEYS.contains(&key.as_str()) {
                continue;
            }
            match suggest_key(key) {
                Some(s) => log::warn!("Unknown config key '{}' (did you mean '{}'?)", key, s),
                None => log::warn!("Unknown config key '{}'", key),
            }
        }
    }

    /// Apply global CLI flags.
    pub fn merge_cli(&mut self, cli: &Cli) {
        if let Some(database) = &cli.database {
            self.database = database.clone();
        }
        if let Some(storage) = &cli.storage {
            self.storage = storage.clone();
        }
        if let Some(routes) = &cli.routes {
            self.routes_file = Some(routes.clone());
        }
        if cli.no_color {
            self.use_color = false;
        }
    }

    /// Apply per-navigation CLI flags.
    pub fn merge_nav_options(&mut self, nav: &NavOptions) {
        if let Some(source) = nav.identity_source {
            self.identity_source = source.into();
        }
        if let Some(mode) = nav.consistency {
            self.consistency = mode.into();
        }
    }

    /// Check values that serde cannot, including redirect targets against `table`.
    ///
    /// # Errors
    ///
    /// The first problem found.
    pub fn validate(&self, table: &RouteTable) -> Result<(), ConfigError> {
        if self.store_timeout_ms == 0 {
            return Err(ConfigError::Zero {
                key: "store_timeout_ms",
            });
        }
        if self.hook_timeout_ms == 0 {
            return Err(ConfigError::Zero {
                key: "hook_timeout_ms",
            });
        }
        if self.max_redirects == 0 {
            return Err(ConfigError::Zero {
                key: "max_redirects",
            });
        }
        // A store call must settle, and be notified, before its intent is dropped
        if self.hook_timeout_ms <= self.store_timeout_ms {
            return Err(ConfigError::HookNotAfterStore {
                hook_ms: self.hook_timeout_ms,
                store_ms: self.store_timeout_ms,
            });
        }
        if self.default_title.trim().is_empty() {
            return Err(ConfigError::EmptyTitle);
        }
        for (key, route) in [
            ("login_route", &self.login_route),
            ("fallback_route", &self.fallback_route),
        ] {
            if !table.contains(route) {
                return Err(ConfigError::UnknownRoute {
                    key,
                    route: route.clone(),
                    suggestion: table.suggest(route),
                });
            }
        }
        Ok(())
    }

    /// Store call deadline.
    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Intent deadline.
    #[must_use]
    pub fn hook_timeout(&self) -> Duration {
        Duration::from_millis(self.hook_timeout_ms)
    }

    /// Default platform-specific configuration file.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    fn data_dir() -> PathBuf {
        Self::project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".gymgate"))
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("com", "gymgate", "gymgate")
    }
}

fn suggest_key(key: &str) -> Option<&'static str> {
    KNOWN_KEYS
        .iter()
        .map(|known| (strsim::jaro_winkler(key, known), *known))
        .filter(|(score, _)| *score > 0.8)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, known)| known)
}
