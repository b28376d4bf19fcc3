use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use careplan_api::{app, AppState};
use careplan_store::app_config::Config;
use careplan_store::{DbClient, LazyCarePlanDrafter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "careplan_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting care plan API on port {}", config.server.port);

    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let drafter = LazyCarePlanDrafter::new(config.drafting.clone());
    if !drafter.is_configured() {
        tracing::warn!("No drafting API key configured; care plan generation will fail until one is set");
    }

    let state = AppState::new(Arc::new(db.entity_store()), Arc::new(drafter));
    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}
