//! Wholesale Portal - partner ordering service

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wholesale_portal::api::{self, AppState, Sessions};
use wholesale_portal::config::Config;
use wholesale_portal::data::{DataClient, DataService, MemoryDataService, PgDataService};
use wholesale_portal::publisher::EventPublisher;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;

    let backend: Arc<dyn DataService> = match &config.database_url {
        Some(url) => Arc::new(PgDataService::connect(url, config.max_connections).await?),
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory data service");
            Arc::new(MemoryDataService::new())
        }
    };
    let events = match &config.nats_url {
        Some(url) => EventPublisher::connect(url).await,
        None => EventPublisher::disabled(),
    };

    let state = AppState::new(DataClient::new(backend), events, Sessions::files(config.cart_dir.clone()));
    let app = api::router(state);

    tracing::info!("Wholesale portal listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}
