//! Sidecar proxy service
//!
//! ```rust,ignore
//! use cached_auth_filter::proxy::{ProxyConfig, ProxyService};
//!
//! let service = ProxyService::new(config);
//! let router = service.into_router(filter);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:15001").await?;
//! axum::serve(listener, router).await?;
//! ```
//!
//! Every request except the health check passes the auth filter and is then
//! forwarded to the upstream with whatever auth headers the filter attached.

use crate::proxy::error_response::{extract_request_id, ErrorResponseExt};
use crate::proxy::headers::paths;
use crate::proxy::hot_path::HotPathService;
use crate::proxy::middleware_stack::ProxyMiddlewareStack;
use crate::proxy::types::*;
use crate::proxy::SidecarFilter;
use axum::{
    body::Body,
    extract::{Request, State},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::warn;

/// Main proxy service
pub struct ProxyService {
    hot_path: HotPathService,
}

impl ProxyService {
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            hot_path: HotPathService::new(config),
        }
    }

    /// Create an Axum router for the proxy service with middleware
    pub fn into_router(self, filter: Arc<SidecarFilter>) -> axum::Router {
        let router = axum::Router::new()
            .route(paths::HEALTH, axum::routing::get(health_handler))
            .fallback(proxy_handler)
            .with_state(Arc::new(self));

        ProxyMiddlewareStack::new(filter).apply_to_router(router)
    }
}

/// Axum handler for proxying requests
async fn proxy_handler(State(proxy): State<Arc<ProxyService>>, request: Request<Body>) -> Response {
    let request_id = extract_request_id(request.headers());

    match proxy.hot_path.forward_request(request).await {
        Ok(response) => response.into_response(),
        Err(error) => {
            warn!(
                request_id = request_id.as_deref().unwrap_or("unknown"),
                error = %error,
                "Forwarding to upstream failed"
            );
            let mut body = error.to_error_response();
            if let Some(id) = request_id {
                body = body.with_request_id(id);
            }
            body.into_response_with_status(error.status_code())
        }
    }
}

/// Error conversion for Axum responses using standardized format
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        self.to_error_response().into_response_with_status(status)
    }
}

/// Health check handler
async fn health_handler() -> &'static str {
    "OK"
}
