//! Endpoint matching
//!
//! Resolves the auth metadata for a request domain and path. Patterns are
//! shell-style globs where `*` matches any run of characters, `/` included.
//! Among all matching patterns of a domain the longest pattern string wins.

use crate::filter::plugin_config::{EndpointAuthEntry, EndpointRoute, FilterConfig};
use regex::Regex;

/// A compiled glob pattern for request paths
#[derive(Clone, Debug)]
pub struct PathPattern {
    raw: String,
    regex: Regex,
}

impl PathPattern {
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        let body = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let regex = Regex::new(&format!("^{body}$"))?;
        Ok(Self {
            raw: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Length of the pattern string, used to rank competing matches
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

impl FilterConfig {
    /// Finds the entry that governs a request, `None` when the filter should
    /// leave the request alone.
    ///
    /// With endpoint matching disabled every request maps to one catch-all
    /// entry using the default auth type and the global cache slot.
    pub fn match_endpoint(&self, domain: &str, path: &str) -> Option<EndpointAuthEntry> {
        if !self.plugin.enable_endpoint_matching {
            return Some(EndpointAuthEntry::catch_all(
                &self.plugin.default_auth_type,
                domain,
                path,
            ));
        }
        if domain.is_empty() || path.is_empty() {
            return None;
        }

        let routes = self.endpoints.routes_for(domain)?;
        let mut best: Option<&EndpointRoute> = None;
        for route in routes.values() {
            let best_len = best.map_or(0, |b| b.pattern.len());
            if route.pattern.len() > best_len && route.pattern.matches(path) {
                best = Some(route);
            }
        }
        best.map(|route| route.entry.clone())
    }
}
