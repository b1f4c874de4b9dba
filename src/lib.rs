//! Cached auth filter - attaches auth headers to outbound sidecar traffic
//!
//! Requests leaving a service pass the filter, which looks up the auth scheme
//! for the target endpoint, serves the matching auth headers from a shared
//! cache or fetches them from an auth provider, and then lets the request
//! continue. The filter never rejects a request: any failure forwards it
//! without auth headers.

pub mod application;
pub mod config;
pub mod error;
pub mod filter;
pub mod proxy;

pub use application::Application;
pub use error::{Error, Result};
