//! Retail Portal - retailer ordering service

use anyhow::Result;
use retail_portal::config::PortalConfig;
use retail_portal::routes::router;
use retail_portal::services::{EventPublisher, RefreshOutcome};
use retail_portal::state::AppState;
use retail_portal::store::{MemoryStore, PgStore, PortalStore};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let config = PortalConfig::from_env()?;
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let store: Arc<dyn PortalStore> = match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url, config.database_max_connections).await?;
            store.migrate().await?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            Arc::new(MemoryStore::with_last_reference(1000))
        }
    };

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => { tracing::warn!(error = %e, "NATS unavailable, events stay in-process"); None }
        },
        None => None,
    };

    let state = AppState::new(store, EventPublisher::new(nats), &config);
    if let RefreshOutcome::Failed(reason) = state.catalog.refresh().await.outcome {
        tracing::warn!(%reason, "initial catalog load failed, starting with an empty catalog");
    }

    let app = router(state).layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive());
    let addr = config.socket_addr();
    tracing::info!("Retail portal listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
