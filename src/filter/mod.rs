//! Cached auth-header injection
//!
//! For every inbound request the filter decides which auth scheme applies,
//! serves the matching auth headers from the shared cache when possible, and
//! otherwise pauses the request while the auth provider is asked for fresh
//! headers. Provider responses are cached according to their
//! `cache-control` header.
//!
//! The filter is written against the host primitives in [`host`] so the same
//! decision engine runs inside any proxy that can provide them.

pub mod cache;
pub mod cache_control;
pub mod host;
pub mod interceptor;
pub mod matcher;
pub mod plugin_config;
pub mod root;
pub mod types;

#[cfg(test)]
mod test_utils;

pub use cache::{CacheError, CacheLookup, CacheStore, CachedAuthInformation};
pub use cache_control::CacheDirective;
pub use host::{
    Clock, HostError, HttpDispatcher, HttpRequestHost, ProviderResponse, SharedData, SystemClock,
};
pub use interceptor::{AuthInterceptor, Intercept, PendingAuth, RequestContext};
pub use matcher::PathPattern;
pub use plugin_config::{
    EndpointAuthConfiguration, EndpointAuthEntry, FilterConfig, PluginConfiguration,
};
pub use root::AuthFilter;
pub use types::{Action, CacheId, Header, HeaderList};
