use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use common::storage::filesystem::FilesystemStorage;
use server::config::AppConfig;
use server::dedup::DedupStore;
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

    let config = AppConfig::load().context("Failed to load config")?;

    let db = server::database::init_db(&config.database.url)
        .await
        .context("Failed to connect to database")?;
    server::database::ensure_indexes(&db).await?;

    let storage = FilesystemStorage::new(config.storage.root.clone())
        .await
        .with_context(|| {
            format!(
                "Failed to prepare storage root {}",
                config.storage.root.display()
            )
        })?;
    info!("Storing files under {}", storage.root().display());

    let store = DedupStore::new(
        db,
        Arc::new(storage),
        config.storage.max_upload_size,
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    let app = server::build_router(AppState {
        config,
        store,
    });

    info!("Server running at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
