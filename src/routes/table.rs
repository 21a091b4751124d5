//! The compiled route table.

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use super::descriptor::{RouteDescriptor, RouteSpec};
use super::destination::{Destination, MatchedRoute};
use super::matcher::{join_paths, normalize_path, PathTemplate};
use super::RouteError;

/// A matchable entry: one descriptor plus its ancestors.
#[derive(Debug, Clone)]
struct CompiledRoute {
    template: PathTemplate,
    chain: Vec<MatchedRoute>,
    order: usize,
}

impl CompiledRoute {
    fn name(&self) -> Option<&str> {
        self.chain.last().and_then(|m| m.name.as_deref())
    }

    fn destination(&self, params: &BTreeMap<String, String>) -> Result<Destination, RouteError> {
        let path = self.template.build(params)?;
        let params = self.template.matches(&path).unwrap_or_default();
        Ok(Destination {
            path,
            params,
            matched: self.chain.clone(),
        })
    }

    /// Static-heavy templates first, catch-alls last, then declaration order.
    fn rank(&self) -> (bool, std::cmp::Reverse<usize>, usize) {
        (
            self.template.is_catch_all(),
            std::cmp::Reverse(self.template.static_segments()),
            self.order,
        )
    }
}

/// Summary of one named route, for listings.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RouteSummary {
    pub name: String,
    pub template: String,
    pub required_params: Vec<String>,
    pub requires_auth: bool,
    pub requires_unauth: bool,
    pub title: Option<String>,
    pub intents: Vec<String>,
}

/// Route table file layout.
#[derive(Debug, Deserialize)]
struct RoutesFile {
    routes: Vec<RouteSpec>,
}

/// Compiled, immutable route table.
#[derive(Debug, Clone)]
pub struct RouteTable {
    // Sorted by match rank
    routes: Vec<CompiledRoute>,
}

impl RouteTable {
    /// Compile a table from descriptors.
    ///
    /// # Errors
    ///
    /// Fails on invalid templates and duplicate route names.
    pub fn new(descriptors: &[RouteDescriptor]) -> Result<Self, RouteError> {
        let mut routes = Vec::new();
        for descriptor in descriptors {
            flatten(descriptor, "/", &[], &mut routes)?;
        }

        let mut seen = HashSet::new();
        for route in &routes {
            if let Some(name) = route.name() {
                if !seen.insert(name.to_string()) {
                    return Err(RouteError::DuplicateName(name.to_string()));
                }
            }
        }

        routes.sort_by_key(CompiledRoute::rank);
        log::debug!("Route table compiled with {} entries", routes.len());
        Ok(Self { routes })
    }

    /// Parse a TOML routes file (`[[routes]]` array with nested `children`).
    pub fn from_toml_str(content: &str) -> Result<Self, RouteError> {
        let file: RoutesFile =
            toml::from_str(content).map_err(|e| RouteError::Load(e.to_string()))?;
        let descriptors: Vec<RouteDescriptor> = file
            .routes
            .into_iter()
            .map(RouteSpec::into_descriptor)
            .collect();
        Self::new(&descriptors)
    }

    /// Load a TOML routes file from disk.
    pub fn load(path: &Path) -> Result<Self, RouteError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RouteError::Load(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Resolve a location (path, optionally with query/fragment).
    ///
    /// # Errors
    ///
    /// [`RouteError::NoMatch`] when no template matches.
    pub fn resolve(&self, location: &str) -> Result<Destination, RouteError> {
        let path = normalize_path(location);
        for route in &self.routes {
            if let Some(params) = route.template.matches(&path) {
                log::trace!("'{}' matched template '{}'", path, route.template.source());
                return Ok(Destination {
                    path,
                    params,
                    matched: route.chain.clone(),
                });
            }
        }
        Err(RouteError::NoMatch(path))
    }

    /// Resolve a named route with parameters.
    ///
    /// # Errors
    ///
    /// Unknown names (with a suggestion when one is close) and missing parameters.
    pub fn resolve_named(
        &self,
        name: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<Destination, RouteError> {
        self.named(name)?.destination(params)
    }

    /// Resolve the target of a redirect away from `from_path`.
    ///
    /// A catch-all target keeps `from_path` in its catch-all parameter, so a
    /// not-found screen still shows the location that was asked for.
    ///
    /// # Errors
    ///
    /// Unknown names and targets with required parameters.
    pub fn resolve_redirect(&self, name: &str, from_path: &str) -> Result<Destination, RouteError> {
        let route = self.named(name)?;
        let kept = from_path.trim_matches('/');
        if let Some(param) = route.template.catch_all_param() {
            if !kept.is_empty() {
                let params = BTreeMap::from([(param.to_string(), kept.to_string())]);
                match route.destination(&params) {
                    Ok(destination) => return Ok(destination),
                    Err(e) => log::debug!("'{}' cannot keep '{}': {}", name, from_path, e),
                }
            }
        }
        route.destination(&BTreeMap::new())
    }

    fn named(&self, name: &str) -> Result<&CompiledRoute, RouteError> {
        self.routes
            .iter()
            .find(|r| r.name() == Some(name))
            .ok_or_else(|| RouteError::UnknownName {
                name: name.to_string(),
                suggestion: self.suggest(name),
            })
    }

    /// Whether a route with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.routes.iter().any(|r| r.name() == Some(name))
    }

    /// The closest route name to `name`, if reasonably close.
    #[must_use]
    pub fn suggest(&self, name: &str) -> Option<String> {
        let lowered = name.to_lowercase();
        self.routes
            .iter()
            .filter_map(CompiledRoute::name)
            .map(|candidate| {
                (
                    strsim::levenshtein(&lowered, &candidate.to_lowercase()),
                    candidate,
                )
            })
            .filter(|(distance, _)| *distance <= 3)
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, candidate)| candidate.to_string())
    }

    /// Named routes, in match order.
    #[must_use]
    pub fn summaries(&self) -> Vec<RouteSummary> {
        self.routes
            .iter()
            .filter_map(|route| {
                let name = route.name()?.to_string();
                Some(RouteSummary {
                    name,
                    template: route.template.source().to_string(),
                    required_params: route
                        .template
                        .required_params()
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                    requires_auth: route.chain.iter().any(|m| m.access.requires_auth()),
                    requires_unauth: route.chain.iter().any(|m| m.access.requires_unauth()),
                    title: route.chain.iter().rev().find_map(|m| m.title.clone()),
                    intents: route
                        .chain
                        .iter()
                        .flat_map(|m| m.intents.iter().map(|i| i.to_string()))
                        .collect(),
                })
            })
            .collect()
    }

    /// Number of matchable entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn flatten(
    descriptor: &RouteDescriptor,
    parent_path: &str,
    ancestors: &[MatchedRoute],
    out: &mut Vec<CompiledRoute>,
) -> Result<(), RouteError> {
    let full = join_paths(parent_path, &descriptor.path);
    let node = MatchedRoute {
        name: descriptor.name.clone(),
        template: full.clone(),
        access: descriptor.access,
        title: descriptor.title.clone(),
        intents: descriptor.intents.clone(),
    };

    let mut chain = ancestors.to_vec();
    chain.push(node);

    out.push(CompiledRoute {
        template: PathTemplate::compile(&full)?,
        chain: chain.clone(),
        order: out.len(),
    });

    for child in &descriptor.children {
        flatten(child, &full, &chain, out)?;
    }
    Ok(())
}
