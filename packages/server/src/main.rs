use std::net::SocketAddr;

use anyhow::Context;
use server::config::AppConfig;
use server::database::init_db;
use server::reconcile::run_reconciler;
use server::state::AppState;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    let db = init_db(&config.database)
        .await
        .context("failed to connect to database")?;
    let state = AppState::build(config, db).await?;

    if state.config.reconcile.enabled {
        tokio::spawn(run_reconciler(
            state.engines.reconciler.clone(),
            state.config.reconcile.interval_secs,
        ));
    }

    let addr: SocketAddr = format!("{}:{}", state.config.server.host, state.config.server.port)
        .parse()
        .context("invalid server.host/server.port")?;
    let app = server::build_router(state);

    info!("Server running at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
