//! Type definitions shared by the auth filter components

use nutype::nutype;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ========== Pseudo-header names ==========

/// Request authority pseudo-header (`host[:port]`)
pub const AUTHORITY_HEADER: &str = ":authority";

/// Request path pseudo-header (path and query)
pub const PATH_HEADER: &str = ":path";

/// Request method pseudo-header
pub const METHOD_HEADER: &str = ":method";

/// Response header carrying the provider's cacheability intent
pub const CACHE_CONTROL_HEADER: &str = "cache-control";

/// Method used for every auth provider call
pub const AUTH_REQUEST_METHOD: &str = "GET";

// ========== Defaults ==========

/// Cluster name of the auth provider when none is configured
pub const DEFAULT_AUTH_PROVIDER_NAME: &str = "ext-authz";

/// Auth provider call timeout in milliseconds when none is configured
pub const DEFAULT_AUTH_REQUEST_TIMEOUT_MS: u32 = 5000;

/// Auth type used when endpoint matching is disabled
pub const DEFAULT_AUTH_TYPE: &str = "ISHARE";

// ========== Cache identifiers ==========

/// Key of one logical slot in the shared cache
#[nutype(
    derive(
        Clone, Copy, Debug, Display, PartialEq, Eq, Hash, PartialOrd, Ord, From, AsRef, Serialize,
        Deserialize
    )
)]
pub struct CacheId(u32);

impl CacheId {
    /// Slot shared by every request while endpoint matching is disabled
    pub fn global() -> Self {
        Self::new(0)
    }

    /// Stable identifier for a configured domain and path pattern.
    ///
    /// The value only depends on the two strings, so every filter instance
    /// (and every reload of the same configuration) derives the same slot.
    pub fn for_endpoint(domain: &str, path: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain.as_bytes());
        hasher.update(path.as_bytes());
        let digest = hasher.finalize();
        Self::new(u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]))
    }

    /// Key used against the host's shared key-value store
    pub fn shared_data_key(&self) -> String {
        self.to_string()
    }
}

// ========== Headers ==========

/// A header issued by the auth provider and replayed onto requests
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Ordered list of headers, exactly as returned by the provider
pub type HeaderList = Vec<Header>;

/// Decision returned to the host after request-header processing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Hand the request on to the next filter
    Continue,
    /// Hold the request until the filter resumes it
    Pause,
}
