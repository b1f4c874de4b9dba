//! Outbound calls to named clusters
//!
//! [`ClusterDispatcher`] turns the header list handed over by the filter into
//! a real HTTP request against the cluster's base URL and runs it on the tokio
//! runtime. The filter gets a [`PendingCall`] back right away; whoever paused
//! the request awaits it and feeds the outcome into the completion handler.

use crate::filter::host::{HostError, HttpDispatcher, ProviderResponse};
use crate::filter::types::{METHOD_HEADER, PATH_HEADER};
use crate::proxy::headers::{is_pseudo_header, paths, NOT_FORWARDED, STATUS_HEADER};
use crate::proxy::types::TargetUrl;
use bytes::Bytes;
use http::{HeaderName, HeaderValue, Method, Request};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

type CallOutcome = Result<ProviderResponse, HostError>;

/// Handle for a call started by [`ClusterDispatcher`]
#[derive(Debug)]
pub struct PendingCall {
    id: u32,
    receiver: oneshot::Receiver<CallOutcome>,
}

impl PendingCall {
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Waits for the call to finish
    pub async fn response(self) -> CallOutcome {
        let Self { id, receiver } = self;
        receiver.await.map_err(|_| {
            HostError::InternalFailure(format!("call {id} was dropped before completing"))
        })?
    }
}

/// [`HttpDispatcher`] backed by a hyper client and a static cluster table
#[derive(Clone)]
pub struct ClusterDispatcher {
    clusters: HashMap<String, TargetUrl>,
    client: Client<HttpConnector, Full<Bytes>>,
    next_call_id: Arc<AtomicU32>,
}

impl ClusterDispatcher {
    pub fn new(clusters: HashMap<String, TargetUrl>) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .http1_title_case_headers(true)
            .http1_preserve_header_case(true)
            .build_http();

        Self {
            clusters,
            client,
            next_call_id: Arc::new(AtomicU32::new(1)),
        }
    }

    /// Builds the outgoing request from a pseudo-header list
    fn build_request(
        base: &TargetUrl,
        headers: &[(String, String)],
        body: Option<Bytes>,
    ) -> Result<Request<Full<Bytes>>, HostError> {
        let mut method = Method::GET;
        let mut path = paths::DEFAULT.to_string();
        let mut builder = Request::builder();

        for (name, value) in headers {
            if name == METHOD_HEADER {
                method = Method::from_bytes(value.as_bytes())
                    .map_err(|e| HostError::BadArgument(format!("method {value}: {e}")))?;
            } else if name == PATH_HEADER {
                path.clone_from(value);
            } else if is_pseudo_header(name) {
                continue;
            } else {
                let (Ok(header_name), Ok(header_value)) = (
                    HeaderName::from_bytes(name.as_bytes()),
                    HeaderValue::from_str(value),
                ) else {
                    debug!(header = %name, "Skipping header that cannot be sent");
                    continue;
                };
                if NOT_FORWARDED.contains(&header_name.as_str()) {
                    continue;
                }
                builder = builder.header(header_name, header_value);
            }
        }

        builder
            .method(method)
            .uri(format!("{}{}", base.base(), path))
            .body(Full::new(body.unwrap_or_default()))
            .map_err(|e| HostError::BadArgument(e.to_string()))
    }

    async fn execute(
        client: Client<HttpConnector, Full<Bytes>>,
        request: Request<Full<Bytes>>,
    ) -> CallOutcome {
        let response = client
            .request(request)
            .await
            .map_err(|e| HostError::InternalFailure(format!("Connection error: {e}")))?;

        let (parts, body) = response.into_parts();
        let mut headers = vec![(STATUS_HEADER.to_string(), parts.status.as_str().to_string())];
        headers.extend(parts.headers.iter().filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        }));

        let body = body
            .collect()
            .await
            .map_err(|e| HostError::InternalFailure(format!("Body collection error: {e}")))?
            .to_bytes();

        Ok(ProviderResponse::new(
            headers,
            (!body.is_empty()).then_some(body),
        ))
    }
}

impl HttpDispatcher for ClusterDispatcher {
    type Call = PendingCall;

    fn dispatch_http_call(
        &self,
        upstream: &str,
        headers: Vec<(String, String)>,
        body: Option<Bytes>,
        timeout: Duration,
    ) -> Result<PendingCall, HostError> {
        let base = self
            .clusters
            .get(upstream)
            .ok_or_else(|| HostError::NotFound(format!("cluster {upstream}")))?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| HostError::InternalFailure(e.to_string()))?;
        let request = Self::build_request(base, &headers, body)?;

        let id = self.next_call_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();
        let client = self.client.clone();
        let cluster = upstream.to_string();

        runtime.spawn(async move {
            let outcome = tokio::time::timeout(timeout, Self::execute(client, request))
                .await
                .unwrap_or(Err(HostError::Timeout(timeout)));
            if let Err(e) = &outcome {
                warn!(call_id = id, cluster = %cluster, error = %e, "Dispatched call failed");
            }
            if sender.send(outcome).is_err() {
                debug!(call_id = id, "Caller stopped waiting for dispatched call");
            }
        });

        Ok(PendingCall { id, receiver })
    }
}
