//! Type definitions for the proxy module

use nutype::nutype;
use std::time::Duration;
use thiserror::Error;

/// Default timeout for forwarding a request upstream
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Base URL of an upstream service or auth cluster
#[nutype(
    derive(Clone, Debug, Display, PartialEq, Eq, Deserialize, Serialize, TryFrom, AsRef),
    validate(predicate = |s: &str| s.starts_with("http://") || s.starts_with("https://")),
)]
pub struct TargetUrl(String);

impl TargetUrl {
    /// URL without trailing slashes, ready for a path to be appended
    pub fn base(&self) -> &str {
        self.as_ref().trim_end_matches('/')
    }
}

/// Proxy configuration
#[derive(Clone, Debug)]
pub struct ProxyConfig {
    /// Service every filtered request is forwarded to
    pub upstream_url: TargetUrl,
    /// Request timeout
    pub request_timeout: Duration,
}

impl ProxyConfig {
    pub fn new(upstream_url: TargetUrl) -> Self {
        Self {
            upstream_url,
            request_timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

/// Errors that can occur while forwarding a request upstream
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Request timeout after {0:?}")]
    RequestTimeout(Duration),

    #[error("Invalid target URL: {0}")]
    InvalidTargetUrl(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] http::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for proxy operations
pub type ProxyResult<T> = Result<T, ProxyError>;
