//! Plugin configuration loading
//!
//! The plugin configuration arrives as a JSON blob:
//!
//! ```json
//! {
//!   "general": {
//!     "authProviderName": "ext-authz",
//!     "authRequestTimeout": 5000,
//!     "enableEndpointMatching": true,
//!     "authType": "ISHARE"
//!   },
//!   "endpoints": {
//!     "ISHARE": { "domain.org": ["/sub-path", "/other/"] }
//!   }
//! }
//! ```
//!
//! Loading never fails. The blob is first read into raw structs whose fields
//! are all optional (a field of the wrong type reads as absent), then
//! [`PluginConfiguration::merge_with_defaults`] and
//! [`EndpointAuthConfiguration::compile`] turn them into the immutable
//! snapshot used while processing requests.

use crate::filter::matcher::PathPattern;
use crate::filter::types::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, info, warn};

/// `authType -> domain -> [pathPattern]` as written in the configuration
pub type RawEndpoints = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Plugin-wide settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PluginConfiguration {
    /// Cluster the auth provider calls are dispatched to
    pub auth_provider_name: String,
    pub auth_request_timeout_ms: u32,
    /// When disabled every request shares one cache slot and the default auth type
    pub enable_endpoint_matching: bool,
    pub default_auth_type: String,
}

impl Default for PluginConfiguration {
    fn default() -> Self {
        Self {
            auth_provider_name: DEFAULT_AUTH_PROVIDER_NAME.to_string(),
            auth_request_timeout_ms: DEFAULT_AUTH_REQUEST_TIMEOUT_MS,
            enable_endpoint_matching: false,
            default_auth_type: DEFAULT_AUTH_TYPE.to_string(),
        }
    }
}

impl PluginConfiguration {
    /// Fills every field missing from `raw` with its default
    pub fn merge_with_defaults(raw: RawGeneralConfig) -> Self {
        let defaults = Self::default();
        Self {
            auth_provider_name: raw
                .auth_provider_name
                .unwrap_or(defaults.auth_provider_name),
            auth_request_timeout_ms: raw
                .auth_request_timeout
                .unwrap_or(defaults.auth_request_timeout_ms),
            enable_endpoint_matching: raw
                .enable_endpoint_matching
                .unwrap_or(defaults.enable_endpoint_matching),
            default_auth_type: raw.auth_type.unwrap_or(defaults.default_auth_type),
        }
    }

    pub fn auth_request_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.auth_request_timeout_ms))
    }
}

/// Auth metadata for one configured `(authType, domain, path)` triple
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointAuthEntry {
    pub cache_id: CacheId,
    pub auth_type: String,
    pub domain: String,
    /// Path as configured, before the sub-path pattern is derived
    pub path: String,
}

impl EndpointAuthEntry {
    /// Entry covering every request while endpoint matching is disabled
    pub fn catch_all(auth_type: &str, domain: &str, path: &str) -> Self {
        Self {
            cache_id: CacheId::global(),
            auth_type: auth_type.to_string(),
            domain: domain.to_string(),
            path: path.to_string(),
        }
    }
}

/// A compiled path pattern and the entry it resolves to
#[derive(Clone, Debug)]
pub struct EndpointRoute {
    pub pattern: PathPattern,
    pub entry: EndpointAuthEntry,
}

/// Per-domain map of path pattern to auth metadata
#[derive(Clone, Debug, Default)]
pub struct EndpointAuthConfiguration {
    domains: HashMap<String, BTreeMap<String, EndpointRoute>>,
}

impl EndpointAuthConfiguration {
    /// Builds the lookup map from the raw endpoint section.
    ///
    /// A path ending in `/` registers `path*`, any other path registers both
    /// `path` and `path/*`. Both derived patterns share one cache slot.
    pub fn compile(raw: &RawEndpoints) -> Self {
        let mut config = Self::default();
        for (auth_type, domains) in raw {
            for (domain, paths) in domains {
                for path in paths {
                    config.register(auth_type, domain, path);
                }
            }
        }
        config.domains.retain(|domain, routes| {
            if routes.is_empty() {
                warn!(domain = %domain, "Dropping domain without usable endpoints");
            }
            !routes.is_empty()
        });
        config
    }

    fn register(&mut self, auth_type: &str, domain: &str, path: &str) {
        let domain = domain.to_ascii_lowercase();
        let routes = self.domains.entry(domain.clone()).or_default();
        if path.is_empty() {
            warn!(auth_type, domain = %domain, "Ignoring empty path pattern");
            return;
        }

        let entry = EndpointAuthEntry {
            cache_id: CacheId::for_endpoint(&domain, path),
            auth_type: auth_type.to_string(),
            domain: domain.clone(),
            path: path.to_string(),
        };
        let patterns = if path.ends_with('/') {
            vec![format!("{path}*")]
        } else {
            vec![path.to_string(), format!("{path}/*")]
        };

        for pattern in patterns {
            match PathPattern::compile(&pattern) {
                Ok(compiled) => {
                    debug!(auth_type, domain = %domain, pattern = %pattern, "Registered endpoint");
                    routes.insert(
                        pattern,
                        EndpointRoute {
                            pattern: compiled,
                            entry: entry.clone(),
                        },
                    );
                }
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "Ignoring uncompilable path pattern");
                }
            }
        }
    }

    /// Routes registered for a domain, `None` when the domain is unknown
    pub fn routes_for(&self, domain: &str) -> Option<&BTreeMap<String, EndpointRoute>> {
        self.domains.get(&domain.to_ascii_lowercase())
    }

    pub fn domain_count(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

/// Immutable configuration snapshot used by the request interceptor
#[derive(Clone, Debug, Default)]
pub struct FilterConfig {
    pub plugin: PluginConfiguration,
    pub endpoints: EndpointAuthConfiguration,
}

impl FilterConfig {
    pub fn new(plugin: PluginConfiguration, endpoints: EndpointAuthConfiguration) -> Self {
        Self { plugin, endpoints }
    }

    /// Parses raw plugin configuration, falling back to defaults on any problem
    pub fn load(raw: Option<&[u8]>) -> Self {
        let raw = match raw {
            Some(bytes) if !bytes.iter().all(u8::is_ascii_whitespace) => {
                match serde_json::from_slice::<RawPluginConfig>(bytes) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        warn!(error = %e, "Invalid plugin configuration, using defaults");
                        RawPluginConfig::default()
                    }
                }
            }
            _ => {
                info!("No plugin configuration provided, using defaults");
                RawPluginConfig::default()
            }
        };

        let plugin = PluginConfiguration::merge_with_defaults(raw.general.unwrap_or_default());
        let endpoints = EndpointAuthConfiguration::compile(&raw.endpoints.unwrap_or_default());

        if plugin.enable_endpoint_matching && endpoints.is_empty() {
            warn!("Endpoint matching is enabled but no endpoints are configured");
        }
        info!(
            auth_provider = %plugin.auth_provider_name,
            timeout_ms = plugin.auth_request_timeout_ms,
            endpoint_matching = plugin.enable_endpoint_matching,
            default_auth_type = %plugin.default_auth_type,
            domains = endpoints.domain_count(),
            "Loaded plugin configuration"
        );

        Self { plugin, endpoints }
    }
}

/// Top-level shape of the configuration blob
#[derive(Debug, Default, Deserialize)]
pub struct RawPluginConfig {
    #[serde(default, deserialize_with = "lenient")]
    pub general: Option<RawGeneralConfig>,
    #[serde(default, deserialize_with = "lenient_endpoints")]
    pub endpoints: Option<RawEndpoints>,
}

/// The `general` section with every field optional
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGeneralConfig {
    #[serde(default, deserialize_with = "lenient")]
    pub auth_provider_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub auth_request_timeout: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub enable_endpoint_matching: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub auth_type: Option<String>,
}

/// Reads a field as `None` instead of failing when it has the wrong shape
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match T::deserialize(value) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => {
            warn!(error = %e, "Ignoring malformed configuration field");
            Ok(None)
        }
    }
}

/// Reads the endpoint section, skipping every malformed level on its own
fn lenient_endpoints<'de, D>(deserializer: D) -> Result<Option<RawEndpoints>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let Some(auth_types) = value.as_object() else {
        if !value.is_null() {
            warn!("Ignoring endpoints section that is not an object");
        }
        return Ok(None);
    };

    let mut endpoints = RawEndpoints::new();
    for (auth_type, domains) in auth_types {
        let Some(domains) = domains.as_object() else {
            warn!(auth_type = %auth_type, "Ignoring auth type whose domains are not an object");
            continue;
        };
        let by_domain = endpoints.entry(auth_type.clone()).or_default();
        for (domain, paths) in domains {
            let Some(paths) = paths.as_array() else {
                warn!(auth_type = %auth_type, domain = %domain, "Ignoring domain whose paths are not a list");
                continue;
            };
            let paths = paths
                .iter()
                .filter_map(|path| {
                    let path = path.as_str();
                    if path.is_none() {
                        warn!(auth_type = %auth_type, domain = %domain, "Ignoring non-string path");
                    }
                    path.map(str::to_string)
                })
                .collect();
            by_domain.insert(domain.clone(), paths);
        }
    }
    Ok(Some(endpoints))
}
