//! Path template compilation and matching.
//!
//! Templates use the familiar router syntax:
//!
//! * `users` - static segment
//! * `:id` - named parameter matching one segment
//! * `:id(\\d+)` - parameter with a custom pattern
//! * `:slug?` - optional parameter
//! * `:pathMatch(.*)*` - repeatable parameter, used for catch-all routes
//!
//! A compiled template knows its required parameters, can extract parameter
//! values from a concrete path and can build a concrete path from parameters.

use regex::Regex;
use std::collections::BTreeMap;

use super::RouteError;

const DEFAULT_PARAM_PATTERN: &str = "[^/]+";

/// How many times a parameter segment may occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    /// Exactly once.
    One,
    /// Zero or one time (`?`).
    Optional,
    /// Zero or more times (`*`).
    ZeroOrMore,
    /// One or more times (`+`).
    OneOrMore,
}

impl Repeat {
    fn is_required(self) -> bool {
        matches!(self, Self::One | Self::OneOrMore)
    }

    fn is_repeatable(self) -> bool {
        matches!(self, Self::ZeroOrMore | Self::OneOrMore)
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Static(String),
    Param {
        name: String,
        pattern: Option<String>,
        repeat: Repeat,
    },
}

/// A compiled path template.
#[derive(Debug, Clone)]
pub struct PathTemplate {
    source: String,
    segments: Vec<Segment>,
    regex: Regex,
}

impl PathTemplate {
    /// Compile an absolute template such as `/application/users/:id`.
    pub fn compile(source: &str) -> Result<Self, RouteError> {
        let mut segments = Vec::new();
        let mut pattern = String::from("^");

        for raw in source.split('/').filter(|s| !s.is_empty()) {
            let segment = parse_segment(source, raw)?;
            match &segment {
                Segment::Static(text) => {
                    pattern.push('/');
                    pattern.push_str(&regex::escape(text));
                }
                Segment::Param {
                    name,
                    pattern: custom,
                    repeat,
                } => {
                    let unit = custom.as_deref().unwrap_or(DEFAULT_PARAM_PATTERN);
                    let body = if repeat.is_repeatable() {
                        format!("(?:{unit})(?:/(?:{unit}))*")
                    } else {
                        format!("(?:{unit})")
                    };
                    if repeat.is_required() {
                        pattern.push_str(&format!("/(?P<{name}>{body})"));
                    } else {
                        pattern.push_str(&format!("(?:/(?P<{name}>{body}))?"));
                    }
                }
            }
            segments.push(segment);
        }
        pattern.push_str("/?$");

        let regex = Regex::new(&pattern).map_err(|e| RouteError::InvalidTemplate {
            template: source.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            source: source.to_string(),
            segments,
            regex,
        })
    }

    /// The template text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Names of the parameters that must be supplied, in path order.
    #[must_use]
    pub fn required_params(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param { name, repeat, .. } if repeat.is_required() => {
                    Some(name.as_str())
                }
                _ => None,
            })
            .collect()
    }

    /// Number of static segments, used to rank overlapping templates.
    #[must_use]
    pub fn static_segments(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Static(_)))
            .count()
    }

    /// Whether a parameter can swallow several segments.
    #[must_use]
    pub fn is_catch_all(&self) -> bool {
        self.catch_all_param().is_some()
    }

    /// Name of the parameter that swallows the rest of the path, if any.
    #[must_use]
    pub fn catch_all_param(&self) -> Option<&str> {
        self.segments.iter().find_map(|s| match s {
            Segment::Param {
                name,
                pattern,
                repeat,
            } if repeat.is_repeatable() || pattern.as_deref().is_some_and(|p| p.contains(".*")) => {
                Some(name.as_str())
            }
            _ => None,
        })
    }

    /// Match a normalized path, returning the captured parameters.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let captures = self.regex.captures(path)?;
        let mut params = BTreeMap::new();
        for segment in &self.segments {
            if let Segment::Param { name, .. } = segment {
                if let Some(value) = captures.name(name) {
                    params.insert(name.clone(), value.as_str().to_string());
                }
            }
        }
        Some(params)
    }

    /// Build a concrete path from parameter values.
    pub fn build(&self, params: &BTreeMap<String, String>) -> Result<String, RouteError> {
        let mut path = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Static(text) => {
                    path.push('/');
                    path.push_str(text);
                }
                Segment::Param { name, repeat, .. } => match params.get(name) {
                    Some(value) if !value.is_empty() => {
                        path.push('/');
                        path.push_str(value.trim_matches('/'));
                    }
                    _ if repeat.is_required() => {
                        return Err(RouteError::MissingParam {
                            template: self.source.clone(),
                            param: name.clone(),
                        })
                    }
                    _ => {}
                },
            }
        }
        if path.is_empty() {
            path.push('/');
        }

        if self.regex.is_match(&path) {
            Ok(path)
        } else {
            Err(RouteError::InvalidParam {
                template: self.source.clone(),
                path,
            })
        }
    }
}

fn parse_segment(template: &str, raw: &str) -> Result<Segment, RouteError> {
    let Some(rest) = raw.strip_prefix(':') else {
        return Ok(Segment::Static(raw.to_string()));
    };

    let invalid = |reason: &str| RouteError::InvalidTemplate {
        template: template.to_string(),
        reason: format!("segment '{}': {}", raw, reason),
    };

    let name_len = rest
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map_or(rest.len(), |(i, _)| i);
    if name_len == 0 || rest.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(invalid("parameter name must start with a letter or '_'"));
    }
    let name = rest[..name_len].to_string();
    let mut tail = &rest[name_len..];

    let mut pattern = None;
    if let Some(inner) = tail.strip_prefix('(') {
        let close = inner
            .rfind(')')
            .ok_or_else(|| invalid("unclosed parameter pattern"))?;
        let custom = &inner[..close];
        if custom.is_empty() {
            return Err(invalid("empty parameter pattern"));
        }
        pattern = Some(custom.to_string());
        tail = &inner[close + 1..];
    }

    let repeat = match tail {
        "" => Repeat::One,
        "?" => Repeat::Optional,
        "*" => Repeat::ZeroOrMore,
        "+" => Repeat::OneOrMore,
        _ => return Err(invalid("unexpected characters after parameter")),
    };

    Ok(Segment::Param {
        name,
        pattern,
        repeat,
    })
}

/// Normalize a requested location for matching.
///
/// Drops the query string and fragment and guarantees a leading `/`.
#[must_use]
pub fn normalize_path(location: &str) -> String {
    let end = location.find(['?', '#']).unwrap_or(location.len());
    let path = location[..end].trim();
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// Join a parent template with a child template.
///
/// Children starting with `/` are absolute.
#[must_use]
pub fn join_paths(parent: &str, child: &str) -> String {
    if child.starts_with('/') {
        return child.to_string();
    }
    let parent = parent.trim_end_matches('/');
    if child.is_empty() {
        if parent.is_empty() {
            "/".to_string()
        } else {
            parent.to_string()
        }
    } else {
        format!("{}/{}", parent, child)
    }
}
