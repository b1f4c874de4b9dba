//! HTTP header constants used by the sidecar runtime

use ::http::header;

/// Header name for request ID used for tracing and correlation
pub const X_REQUEST_ID: &str = "x-request-id";

/// Pseudo-header carrying the scheme
pub const SCHEME_HEADER: &str = ":scheme";

/// Pseudo-header the runtime reports for the upstream response status
pub const STATUS_HEADER: &str = ":status";

/// Headers never copied onto a dispatched auth provider call
pub const NOT_FORWARDED: [&str; 3] = ["content-length", "transfer-encoding", "host"];

pub use header::HOST;

/// Well-known paths
pub mod paths {
    /// Default path when none is specified
    pub const DEFAULT: &str = "/";

    /// Health check endpoint path
    pub const HEALTH: &str = "/health";
}

/// Whether a header name is a pseudo-header such as `:path`
pub fn is_pseudo_header(name: &str) -> bool {
    name.starts_with(':')
}
