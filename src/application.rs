use crate::config::Settings;
use crate::error::Error;
use crate::filter::FilterConfig;
use crate::proxy::{
    ClusterDispatcher, InMemorySharedData, ProxyConfig, ProxyService, SidecarFilter, TargetUrl,
};
use crate::Result;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

/// Main application struct that wires the filter, its runtime and the server
pub struct Application {
    settings: Settings,
    filter: Arc<SidecarFilter>,
    listener: TcpListener,
}

impl Application {
    pub async fn new() -> Result<Self> {
        Self::build(Settings::new()?).await
    }

    #[instrument(skip(settings))]
    pub async fn build(settings: Settings) -> Result<Self> {
        let dispatcher = ClusterDispatcher::new(cluster_table(&settings.clusters)?);
        let filter = Arc::new(SidecarFilter::new(
            FilterConfig::default(),
            Arc::new(InMemorySharedData::new()),
            Arc::new(dispatcher),
        ));
        reload_plugin_config(&filter, settings.filter.plugin_config_path.as_deref()).await;

        let listener =
            TcpListener::bind((settings.server.host.as_str(), settings.server.port)).await?;

        Ok(Self {
            settings,
            filter,
            listener,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn filter(&self) -> &Arc<SidecarFilter> {
        &self.filter
    }

    /// Serves until ctrl-c
    #[instrument(skip(self))]
    pub async fn run(self) -> Result<()> {
        let upstream = TargetUrl::try_new(self.settings.upstream.url.clone())
            .map_err(|_| Error::invalid_url("upstream", &self.settings.upstream.url))?;
        let config = ProxyConfig::new(upstream).with_request_timeout(self.settings.upstream_timeout());

        #[cfg(unix)]
        spawn_reload_on_hangup(
            Arc::clone(&self.filter),
            self.settings.filter.plugin_config_path.clone(),
        )?;

        let router = ProxyService::new(config).into_router(Arc::clone(&self.filter));
        info!(
            address = %self.local_addr()?,
            upstream = %self.settings.upstream.url,
            "Auth filter sidecar listening"
        );

        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Auth filter sidecar stopped");
        Ok(())
    }
}

/// Validated cluster table for the dispatcher
pub fn cluster_table(clusters: &HashMap<String, String>) -> Result<HashMap<String, TargetUrl>> {
    clusters
        .iter()
        .map(|(name, url)| {
            TargetUrl::try_new(url.clone())
                .map(|url| (name.clone(), url))
                .map_err(|_| Error::invalid_url(format!("cluster {name}"), url))
        })
        .collect()
}

/// Reads the plugin configuration file and hands it to the filter.
///
/// A missing path or an unreadable file reconfigures the filter with defaults.
pub async fn reload_plugin_config(filter: &SidecarFilter, path: Option<&Path>) {
    let raw = match path {
        Some(path) => match tokio::fs::read(path).await {
            Ok(raw) => Some(raw),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read plugin configuration");
                None
            }
        },
        None => None,
    };
    filter.on_configure(raw.as_deref());
}

#[cfg(unix)]
fn spawn_reload_on_hangup(filter: Arc<SidecarFilter>, path: Option<PathBuf>) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("SIGHUP received, reloading plugin configuration");
            reload_plugin_config(&filter, path.as_deref()).await;
        }
    });
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for ctrl-c, shutting down");
    }
}
