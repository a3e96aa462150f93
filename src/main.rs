//! LogCell Commerce - cart pricing and refund service

use anyhow::Result;
use logcell_commerce::{config::Config, http::{create_router, AppState}, store::{MemoryCartStore, MemoryCatalog}};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let config = Config::from_env()?;
    let catalog = match &config.catalog_path {
        Some(path) => {
            let catalog = MemoryCatalog::from_json_file(path)?;
            tracing::info!(products = catalog.len(), path = %path.display(), "catalog loaded");
            catalog
        }
        None => {
            tracing::warn!("CATALOG_PATH not set, starting with an empty catalog");
            MemoryCatalog::new()
        }
    };
    let state = AppState::new(Arc::new(MemoryCartStore::new()), Arc::new(catalog), config.refund_basis);
    let app = create_router(state);

    tracing::info!(refund_basis = %config.refund_basis, "LogCell Commerce listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?, app).await?;
    Ok(())
}
