use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of environment variables overriding settings, e.g. `AUTH_FILTER__SERVER__PORT`
pub const ENV_PREFIX: &str = "AUTH_FILTER";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub upstream: UpstreamSettings,
    #[serde(default)]
    pub filter: FilterSettings,
    /// Cluster name to base URL, the targets of auth provider calls
    #[serde(default = "default_clusters")]
    pub clusters: HashMap<String, String>,
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamSettings {
    pub url: String,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FilterSettings {
    /// JSON plugin configuration; defaults apply when unset
    pub plugin_config_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

fn default_clusters() -> HashMap<String, String> {
    HashMap::from([(
        "ext-authz".to_string(),
        "http://127.0.0.1:7080".to_string(),
    )])
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        Self::defaults()?
            // Add configuration file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{environment}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Settings from a single file on top of the built-in defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::defaults()?
            .add_source(File::from(path))
            .build()?
            .try_deserialize()
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 15001)?
            .set_default("upstream.url", "http://127.0.0.1:8080")?
            .set_default("upstream.request_timeout_ms", 30_000)?
            .set_default("logging.level", "info")
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream.request_timeout_ms)
    }
}
