//! Host primitives the filter relies on
//!
//! The decision engine never touches sockets, clocks or storage directly. The
//! proxy runtime hosting the filter implements these traits; the sidecar
//! binary wires them to tokio/hyper (see [`crate::proxy`]) and the tests wire
//! them to in-memory fakes.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Status of a failed host call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Compare-and-swap mismatch for key {0}")]
    CasMismatch(String),

    #[error("Bad argument: {0}")]
    BadArgument(String),

    #[error("Call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Internal failure: {0}")]
    InternalFailure(String),
}

/// Header access and flow control for the request being processed
pub trait HttpRequestHost {
    fn get_http_request_header(&self, name: &str) -> Option<String>;

    /// All request headers, pseudo-headers included, in arrival order
    fn get_http_request_headers(&self) -> Vec<(String, String)>;

    /// Appends a header; existing values with the same name are kept
    fn add_http_request_header(&mut self, name: &str, value: &str);

    /// Releases a request that was paused by returning [`Action::Pause`]
    ///
    /// [`Action::Pause`]: crate::filter::Action::Pause
    fn resume_http_request(&mut self);
}

/// Shared key-value store with compare-and-swap writes
pub trait SharedData: Send + Sync {
    /// Returns the stored bytes and their version, `(None, None)` for a missing key
    fn get_shared_data(&self, key: &str) -> Result<(Option<Bytes>, Option<u32>), HostError>;

    /// Stores `value` if `cas` still matches the stored version.
    ///
    /// `None` writes unconditionally. Writing a missing key always succeeds.
    fn set_shared_data(&self, key: &str, value: &[u8], cas: Option<u32>) -> Result<(), HostError>;
}

impl<T: SharedData + ?Sized> SharedData for Arc<T> {
    fn get_shared_data(&self, key: &str) -> Result<(Option<Bytes>, Option<u32>), HostError> {
        (**self).get_shared_data(key)
    }

    fn set_shared_data(&self, key: &str, value: &[u8], cas: Option<u32>) -> Result<(), HostError> {
        (**self).set_shared_data(key, value, cas)
    }
}

/// Asynchronous outbound calls to named upstream clusters
pub trait HttpDispatcher: Send + Sync {
    /// Handle the host hands back for an in-flight call
    type Call;

    /// Starts a call without waiting for it; fails synchronously when the
    /// call cannot even be started (e.g. unknown cluster)
    fn dispatch_http_call(
        &self,
        upstream: &str,
        headers: Vec<(String, String)>,
        body: Option<Bytes>,
        timeout: Duration,
    ) -> Result<Self::Call, HostError>;
}

/// Response of a completed dispatch
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderResponse {
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl ProviderResponse {
    pub fn new(headers: Vec<(String, String)>, body: Option<Bytes>) -> Self {
        Self { headers, body }
    }

    /// First value of a response header, compared case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Wall clock in unix seconds
pub trait Clock: Send + Sync {
    fn now_unix(&self) -> i64;
}

/// Clock backed by the system time
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}
