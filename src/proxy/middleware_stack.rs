//! Middleware stack builder for clean composition

use crate::proxy::middleware::*;
use crate::proxy::SidecarFilter;
use axum::{
    middleware::{from_fn, from_fn_with_state},
    Router,
};
use std::sync::Arc;

/// Builder for composing the sidecar middleware stack
pub struct ProxyMiddlewareStack {
    filter_state: Arc<FilterState>,
}

impl ProxyMiddlewareStack {
    pub fn new(filter: Arc<SidecarFilter>) -> Self {
        Self::with_state(FilterState::new(filter))
    }

    pub fn with_state(filter_state: FilterState) -> Self {
        Self {
            filter_state: Arc::new(filter_state),
        }
    }

    /// Apply the complete middleware stack to a router
    ///
    /// The middleware are applied in the following order (outer to inner):
    /// 1. Request ID generation/propagation
    /// 2. Logging (with request ID)
    /// 3. Auth filter
    pub fn apply_to_router<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router
            // Innermost first
            .layer(from_fn_with_state(
                self.filter_state.clone(),
                auth_filter_middleware,
            ))
            .layer(from_fn(logging_middleware))
            .layer(from_fn(request_id_middleware))
    }
}
