//! Native sidecar runtime for the auth filter
//!
//! Implements the filter's host primitives on tokio and hyper and puts the
//! filter in front of an upstream service:
//! - Shared data: process-wide compare-and-swap store
//! - Dispatcher: outbound calls to named clusters
//! - Middleware: the filter as an axum layer, plus request ID and logging

pub mod dispatcher;
pub mod error_response;
pub mod headers;
pub mod hot_path;
pub mod middleware;
pub mod middleware_stack;
pub mod request_host;
pub mod service;
pub mod shared_data;
pub mod types;


pub use dispatcher::{ClusterDispatcher, PendingCall};
pub use middleware::FilterState;
pub use request_host::RequestHeaders;
pub use service::ProxyService;
pub use shared_data::InMemorySharedData;
pub use types::{ProxyConfig, ProxyError, ProxyResult, TargetUrl};

use crate::filter::AuthFilter;

/// The auth filter wired to the native runtime
pub type SidecarFilter = AuthFilter<InMemorySharedData, ClusterDispatcher>;
