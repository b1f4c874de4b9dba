//! Middleware implementations for the sidecar

use crate::filter::interceptor::{Intercept, PendingAuth};
use crate::proxy::headers::{paths, X_REQUEST_ID};
use crate::proxy::request_host::RequestHeaders;
use crate::proxy::SidecarFilter;
use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// State of the auth filter middleware
pub struct FilterState {
    pub filter: Arc<SidecarFilter>,
    /// Paths served without running the filter
    pub bypass_paths: HashSet<String>,
}

impl FilterState {
    pub fn new(filter: Arc<SidecarFilter>) -> Self {
        Self {
            filter,
            bypass_paths: HashSet::from([paths::HEALTH.to_string()]),
        }
    }

    pub fn with_bypass_path(mut self, path: impl Into<String>) -> Self {
        self.bypass_paths.insert(path.into());
        self
    }
}

/// Request ID middleware - ensures every request has a unique ID for tracing
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::now_v7);
    let header_value = HeaderValue::from_str(&request_id.to_string()).ok();

    if let Some(value) = &header_value {
        request.headers_mut().insert(X_REQUEST_ID, value.clone());
    }

    let mut response = next.run(request).await;

    if let Some(value) = header_value {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}

/// Logging middleware - logs request/response details with timing
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    info!(
        request_id = request_id,
        method = %method,
        path = %uri.path(),
        "Incoming request"
    );

    let response = next.run(request).await;
    let duration = start.elapsed();

    info!(
        request_id = request_id,
        method = %method,
        path = %uri.path(),
        status = response.status().as_u16(),
        duration_ms = duration.as_millis(),
        "Request completed"
    );

    response
}

/// Auth filter middleware - attaches auth headers before the request moves on.
///
/// A paused request stays in this task until the auth provider answers; other
/// requests keep being served meanwhile. The filter never rejects a request.
pub async fn auth_filter_middleware(
    State(state): State<Arc<FilterState>>,
    request: Request,
    next: Next,
) -> Response {
    if state.bypass_paths.contains(request.uri().path()) {
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    let interceptor = state.filter.http_context();

    let outcome = interceptor.on_http_request_headers(&mut RequestHeaders::new(&mut parts));
    if let Intercept::Paused(PendingAuth { call, context }) = outcome {
        let call_id = call.id();
        debug!(call_id, domain = %context.domain, "Request paused for auth provider");

        let result = call.response().await;
        let mut host = RequestHeaders::new(&mut parts);
        interceptor.on_http_call_response(context, result, &mut host);
        debug!(call_id, resumed = host.is_resumed(), "Auth provider call finished");
    }

    next.run(Request::from_parts(parts, body)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::middleware::from_fn;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_request_id_generation() {
        let handler = tower::service_fn(|req: Request| async move {
            let request_id = req
                .headers()
                .get(X_REQUEST_ID)
                .and_then(|h| h.to_str().ok())
                .unwrap_or("missing")
                .to_string();

            Ok::<_, std::convert::Infallible>(
                Response::builder()
                    .status(StatusCode::OK)
                    .body(Body::from(request_id))
                    .unwrap(),
            )
        });

        let service = tower::ServiceBuilder::new()
            .layer(from_fn(request_id_middleware))
            .service(handler);

        let request = Request::builder()
            .method("GET")
            .uri("/test")
            .body(Body::empty())
            .unwrap();

        let response = service.oneshot(request).await.unwrap();
        let request_id = response.headers().get(X_REQUEST_ID).unwrap();
        let uuid = Uuid::parse_str(request_id.to_str().unwrap()).unwrap();
        assert_eq!(uuid.get_version_num(), 7);
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let handler = tower::service_fn(|_req: Request| async move {
            Ok::<_, std::convert::Infallible>(Response::new(Body::empty()))
        });
        let service = tower::ServiceBuilder::new()
            .layer(from_fn(request_id_middleware))
            .service(handler);

        let existing = Uuid::now_v7().to_string();
        let request = Request::builder()
            .uri("/test")
            .header(X_REQUEST_ID, &existing)
            .body(Body::empty())
            .unwrap();

        let response = service.oneshot(request).await.unwrap();
        assert_eq!(response.headers().get(X_REQUEST_ID).unwrap(), &existing);
    }

    #[tokio::test]
    async fn test_invalid_request_id_is_replaced() {
        let handler = tower::service_fn(|_req: Request| async move {
            Ok::<_, std::convert::Infallible>(Response::new(Body::empty()))
        });
        let service = tower::ServiceBuilder::new()
            .layer(from_fn(request_id_middleware))
            .service(handler);

        let request = Request::builder()
            .uri("/test")
            .header(X_REQUEST_ID, "not-a-uuid")
            .body(Body::empty())
            .unwrap();

        let response = service.oneshot(request).await.unwrap();
        let request_id = response.headers().get(X_REQUEST_ID).unwrap();
        assert!(Uuid::parse_str(request_id.to_str().unwrap()).is_ok());
    }
}
