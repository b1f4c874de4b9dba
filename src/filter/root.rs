//! Filter root: owns the configuration snapshot and the host handles

use crate::filter::host::{Clock, HttpDispatcher, SharedData, SystemClock};
use crate::filter::interceptor::AuthInterceptor;
use crate::filter::plugin_config::FilterConfig;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

/// Long-lived filter state shared by all requests.
///
/// The configuration is replaced wholesale on reconfiguration. Requests
/// already in flight keep the snapshot they started with.
pub struct AuthFilter<S, D> {
    config: RwLock<Arc<FilterConfig>>,
    store: Arc<S>,
    dispatcher: Arc<D>,
    clock: Arc<dyn Clock>,
}

impl<S, D> AuthFilter<S, D>
where
    S: SharedData,
    D: HttpDispatcher,
{
    pub fn new(config: FilterConfig, store: Arc<S>, dispatcher: Arc<D>) -> Self {
        Self {
            config: RwLock::new(Arc::new(config)),
            store,
            dispatcher,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Loads a new plugin configuration and makes it current
    pub fn on_configure(&self, raw: Option<&[u8]>) {
        if let Some(raw) = raw {
            info!(config = %String::from_utf8_lossy(raw), "Plugin configuration received");
        }
        let config = Arc::new(FilterConfig::load(raw));
        *self.config.write() = config;
    }

    /// Current configuration snapshot
    pub fn config(&self) -> Arc<FilterConfig> {
        Arc::clone(&self.config.read())
    }

    /// Interceptor for one request, pinned to the current snapshot
    pub fn http_context(&self) -> AuthInterceptor<S, D> {
        AuthInterceptor::new(
            self.config(),
            Arc::clone(&self.store),
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.clock),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::test_utils::{FakeDispatcher, FakeSharedData};

    #[test]
    fn test_reconfiguration_keeps_running_snapshots() {
        let filter = AuthFilter::new(
            FilterConfig::default(),
            Arc::new(FakeSharedData::default()),
            Arc::new(FakeDispatcher::default()),
        );
        let before = filter.http_context();
        assert!(!before.config().plugin.enable_endpoint_matching);

        filter.on_configure(Some(br#"{"general": {"enableEndpointMatching": true}}"#));

        assert!(!before.config().plugin.enable_endpoint_matching);
        assert!(filter.http_context().config().plugin.enable_endpoint_matching);
    }

    #[test]
    fn test_reconfiguration_without_payload_resets_to_defaults() {
        let filter = AuthFilter::new(
            FilterConfig::load(Some(br#"{"general": {"authProviderName": "custom"}}"#)),
            Arc::new(FakeSharedData::default()),
            Arc::new(FakeDispatcher::default()),
        );
        assert_eq!(filter.config().plugin.auth_provider_name, "custom");

        filter.on_configure(None);
        assert_eq!(filter.config().plugin.auth_provider_name, "ext-authz");
    }
}
