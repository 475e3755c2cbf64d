use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stormdash::{
    api,
    config::Config,
    error::StormResult,
    state::AppState,
    store::{MemoryStore, StormStore},
};

#[tokio::main]
async fn main() -> StormResult<()> {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stormdash=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting stormdash...");

    let config = Config::from_env();
    let store: Arc<dyn StormStore> = match &config.state_file {
        Some(path) => Arc::new(MemoryStore::open(path.clone()).await.inspect_err(|e| {
            tracing::error!("Failed to load snapshot {}: {}", path.display(), e);
        })?),
        None => Arc::new(MemoryStore::new()),
    };

    let addr = config.bind_addr;
    let state = Arc::new(AppState::new(store, config));
    let app = api::router(state);

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
