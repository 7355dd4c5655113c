use pgsurge_core::AppConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "failed to load config, using defaults");
        AppConfig::default()
    });

    tracing::info!(port = config.http_port, "starting pgsurge");

    if let Err(err) = pgsurge_api::run_server(config).await {
        tracing::error!(error = %err, "server terminated with error");
        std::process::exit(1);
    }
}
