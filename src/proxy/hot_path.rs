//! Forwarding of filtered requests to the upstream service

use crate::proxy::headers::paths;
use crate::proxy::types::*;
use axum::body::Body;
use hyper::{Request, Response, Uri};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Streams requests to the configured upstream
#[derive(Clone)]
pub struct HotPathService {
    config: Arc<ProxyConfig>,
    client: Client<HttpConnector, Body>,
}

impl HotPathService {
    pub fn new(config: ProxyConfig) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .http1_title_case_headers(true)
            .http1_preserve_header_case(true)
            .build_http();

        Self {
            config: Arc::new(config),
            client,
        }
    }

    /// Final upstream URI: the upstream base with the original path and query appended
    pub fn resolve_upstream_uri(upstream: &TargetUrl, original_uri: &Uri) -> ProxyResult<Uri> {
        let path_and_query = original_uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or(paths::DEFAULT);
        let uri = format!("{}{}", upstream.base(), path_and_query);

        uri.parse().map_err(|_| ProxyError::InvalidTargetUrl(uri))
    }

    /// Forward a request upstream, response body streamed back as-is
    pub async fn forward_request(&self, request: Request<Body>) -> ProxyResult<Response<Body>> {
        let start_time = Instant::now();
        let (mut parts, body) = request.into_parts();
        parts.uri = Self::resolve_upstream_uri(&self.config.upstream_url, &parts.uri)?;
        let target = parts.uri.clone();

        let response_future = self.client.request(Request::from_parts(parts, body));
        let timeout_duration = self.config.request_timeout;

        let response = tokio::time::timeout(timeout_duration, response_future)
            .await
            .map_err(|_| ProxyError::RequestTimeout(timeout_duration))?
            .map_err(|e| ProxyError::Connection(e.to_string()))?;

        debug!(
            target = %target,
            status = response.status().as_u16(),
            duration_ms = start_time.elapsed().as_millis(),
            "Upstream responded"
        );

        let (response_parts, response_body) = response.into_parts();
        Ok(Response::from_parts(
            response_parts,
            Body::new(response_body),
        ))
    }
}
