use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use four_eyes::config::Config;
use four_eyes::github::InstallationConnector;
use four_eyes::server::{AppState, build_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "four_eyes=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("loading configuration")?;
    let connector = InstallationConnector::new(
        config.app_id,
        config.installation_id,
        &config.private_key_pem,
    )
    .context("building GitHub App client")?;

    let shutdown = CancellationToken::new();
    let app = build_router(AppState::from_config(&config, connector, shutdown.clone()));

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(
        addr = %config.listen_addr,
        protected_refs = ?config.protected_refs.iter().collect::<Vec<_>>(),
        "listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("server error")?;

    tracing::info!("shut down");
    Ok(())
}

/// Resolves on ctrl-c, cancelling in-flight evaluations first.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
    shutdown.cancel();
}
