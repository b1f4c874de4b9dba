//! Request interception state machine
//!
//! Each request moves through `Idle -> Matching -> {Served | AwaitingProvider} -> Done`:
//!
//! - **Matching**: domain and path are read from the pseudo-headers and
//!   resolved to an endpoint entry. No domain, no path or no match ends the
//!   request's involvement with the filter right away.
//! - **Served**: a decodable, unexpired cache entry exists; its headers are
//!   appended and the request continues.
//! - **AwaitingProvider**: the auth provider is called asynchronously and the
//!   request is paused. Everything the completion needs travels in a
//!   [`RequestContext`], never in filter-wide state, so any number of requests
//!   may be awaiting the provider at once.
//!
//! Every failure degrades to letting the request through, with or without
//! headers; the filter never fails a request.

use crate::filter::cache::{CacheError, CacheStore, CachedAuthInformation};
use crate::filter::cache_control::CacheDirective;
use crate::filter::host::{
    Clock, HostError, HttpDispatcher, HttpRequestHost, ProviderResponse, SharedData,
};
use crate::filter::plugin_config::{EndpointAuthEntry, FilterConfig};
use crate::filter::types::*;
use http::uri::Authority;
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-request state carried from dispatch to completion
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    pub domain: String,
    pub path: String,
    pub entry: EndpointAuthEntry,
    /// Cache version observed during lookup, used for the write-back
    pub cache_version: Option<u32>,
}

/// A paused request waiting for the auth provider
#[derive(Debug)]
pub struct PendingAuth<C> {
    pub call: C,
    pub context: RequestContext,
}

/// Outcome of request-header processing
#[derive(Debug)]
pub enum Intercept<C> {
    Continue,
    Paused(PendingAuth<C>),
}

impl<C> Intercept<C> {
    pub fn action(&self) -> Action {
        match self {
            Self::Continue => Action::Continue,
            Self::Paused(_) => Action::Pause,
        }
    }
}

/// Request-scoped view of the filter, bound to one configuration snapshot
pub struct AuthInterceptor<S, D> {
    config: Arc<FilterConfig>,
    cache: CacheStore<Arc<S>>,
    dispatcher: Arc<D>,
    clock: Arc<dyn Clock>,
}

impl<S, D> AuthInterceptor<S, D>
where
    S: SharedData,
    D: HttpDispatcher,
{
    pub fn new(
        config: Arc<FilterConfig>,
        store: Arc<S>,
        dispatcher: Arc<D>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            cache: CacheStore::new(store),
            dispatcher,
            clock,
        }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Entry point for inbound request headers
    pub fn on_http_request_headers<H: HttpRequestHost>(
        &self,
        request: &mut H,
    ) -> Intercept<D::Call> {
        let Some(domain) = request_domain(request) else {
            warn!("Request without authority, skipping auth");
            return Intercept::Continue;
        };
        let Some(path) = request_path(request) else {
            warn!(domain = %domain, "Request without path, skipping auth");
            return Intercept::Continue;
        };
        let Some(entry) = self.config.match_endpoint(&domain, &path) else {
            debug!(domain = %domain, path = %path, "No endpoint matched, skipping auth");
            return Intercept::Continue;
        };

        let mut cache_version = None;
        if let Some(lookup) = self.cache.read(entry.cache_id) {
            cache_version = lookup.version;
            match CachedAuthInformation::decode(&lookup.data) {
                Ok(info) if info.is_valid_at(self.clock.now_unix()) => {
                    debug!(
                        domain = %domain,
                        path = %path,
                        cache_id = %entry.cache_id,
                        "Serving auth headers from cache"
                    );
                    apply_headers(request, &info.cached_headers);
                    return Intercept::Continue;
                }
                Ok(info) => {
                    debug!(
                        cache_id = %entry.cache_id,
                        expiration = info.expiration_time,
                        "Cached auth headers expired"
                    );
                }
                Err(e) => {
                    warn!(cache_id = %entry.cache_id, error = %e, "Discarding unreadable cache entry");
                }
            }
        }

        let context = RequestContext {
            domain,
            path,
            entry,
            cache_version,
        };
        self.request_auth_provider(request, context)
    }

    fn request_auth_provider<H: HttpRequestHost>(
        &self,
        request: &H,
        context: RequestContext,
    ) -> Intercept<D::Call> {
        let plugin = &self.config.plugin;
        let headers = provider_request_headers(request.get_http_request_headers(), &context);

        match self.dispatcher.dispatch_http_call(
            &plugin.auth_provider_name,
            headers,
            None,
            plugin.auth_request_timeout(),
        ) {
            Ok(call) => {
                debug!(
                    domain = %context.domain,
                    path = %context.path,
                    auth_type = %context.entry.auth_type,
                    provider = %plugin.auth_provider_name,
                    "Requesting auth headers"
                );
                Intercept::Paused(PendingAuth { call, context })
            }
            Err(e) => {
                warn!(
                    domain = %context.domain,
                    path = %context.path,
                    auth_type = %context.entry.auth_type,
                    provider = %plugin.auth_provider_name,
                    error = %e,
                    "Call to auth provider failed, continuing without auth"
                );
                Intercept::Continue
            }
        }
    }

    /// Completion of a dispatched provider call.
    ///
    /// The request is resumed as soon as the headers are applied; caching
    /// happens afterwards and cannot affect the request any more.
    pub fn on_http_call_response<H: HttpRequestHost>(
        &self,
        context: RequestContext,
        outcome: Result<ProviderResponse, HostError>,
        request: &mut H,
    ) {
        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                warn!(domain = %context.domain, path = %context.path, error = %e, "Auth provider call did not complete");
                request.resume_http_request();
                return;
            }
        };

        let headers = match decode_provider_headers(&response) {
            Ok(headers) => headers,
            Err(reason) => {
                warn!(domain = %context.domain, path = %context.path, reason = %reason, "Unusable auth provider response");
                request.resume_http_request();
                return;
            }
        };

        apply_headers(request, &headers);
        request.resume_http_request();

        self.cache_provider_headers(&context, &response, headers);
    }

    fn cache_provider_headers(
        &self,
        context: &RequestContext,
        response: &ProviderResponse,
        headers: HeaderList,
    ) {
        let cache_id = context.entry.cache_id;
        let Some(cache_control) = response.header(CACHE_CONTROL_HEADER) else {
            debug!(cache_id = %cache_id, "No cache-control from provider, not caching");
            return;
        };
        let CacheDirective::ExpiresAt(expiration) =
            CacheDirective::parse(cache_control, self.clock.now_unix())
        else {
            debug!(cache_id = %cache_id, cache_control, "Provider response is not cacheable");
            return;
        };

        let encoded = match CachedAuthInformation::new(expiration, headers).encode() {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(cache_id = %cache_id, error = %e, "Failed to encode auth headers for caching");
                return;
            }
        };

        match self
            .cache
            .write(cache_id, &encoded, context.cache_version)
        {
            Ok(()) => debug!(
                cache_id = %cache_id,
                domain = %context.domain,
                path = %context.path,
                expiration,
                "Cached auth headers"
            ),
            Err(CacheError::StaleVersion { .. }) => debug!(
                cache_id = %cache_id,
                "Cache slot was refreshed concurrently, keeping the other write"
            ),
            Err(e) => warn!(cache_id = %cache_id, error = %e, "Failed to cache auth headers"),
        }
    }
}

/// Host part of the authority, port stripped
fn request_domain<H: HttpRequestHost>(request: &H) -> Option<String> {
    let raw = request.get_http_request_header(AUTHORITY_HEADER)?;
    let host = match raw.parse::<Authority>() {
        Ok(authority) => authority.host().to_string(),
        Err(_) => raw.split(':').next().unwrap_or_default().to_string(),
    };
    (!host.is_empty()).then_some(host)
}

/// Request path without query string or fragment
fn request_path<H: HttpRequestHost>(request: &H) -> Option<String> {
    let raw = request.get_http_request_header(PATH_HEADER)?;
    let path = raw.split(['?', '#']).next().unwrap_or_default();
    (!path.is_empty()).then(|| path.to_string())
}

/// Original headers with method and path rewritten for the provider call
fn provider_request_headers(
    mut headers: Vec<(String, String)>,
    context: &RequestContext,
) -> Vec<(String, String)> {
    let auth_path = format!(
        "/{}/auth?domain={}&path={}",
        context.entry.auth_type,
        urlencoding::encode(&context.domain),
        urlencoding::encode(&context.path)
    );

    let mut has_method = false;
    let mut has_path = false;
    for (name, value) in headers.iter_mut() {
        if name == METHOD_HEADER {
            *value = AUTH_REQUEST_METHOD.to_string();
            has_method = true;
        } else if name == PATH_HEADER {
            value.clone_from(&auth_path);
            has_path = true;
        }
    }
    if !has_method {
        headers.push((METHOD_HEADER.to_string(), AUTH_REQUEST_METHOD.to_string()));
    }
    if !has_path {
        headers.push((PATH_HEADER.to_string(), auth_path));
    }
    headers
}

fn decode_provider_headers(response: &ProviderResponse) -> Result<HeaderList, String> {
    let body = response
        .body
        .as_ref()
        .ok_or_else(|| "response has no body".to_string())?;
    serde_json::from_slice::<HeaderList>(body).map_err(|e| e.to_string())
}

fn apply_headers<H: HttpRequestHost>(request: &mut H, headers: &[Header]) {
    for header in headers {
        debug!(header = %header.name, "Adding auth header");
        request.add_http_request_header(&header.name, &header.value);
    }
}
