use anyhow::Result;
use cached_auth_filter::config::Settings;
use cached_auth_filter::Application;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::new()?;

    // RUST_LOG wins over the configured level
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!("Starting cached auth filter sidecar");

    let app = Application::build(settings).await?;
    app.run().await?;

    Ok(())
}
