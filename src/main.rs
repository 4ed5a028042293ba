use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

mod analysis;
mod config;
mod db;
mod handlers;
mod llm;
mod state;
mod utils;

use analysis::{AnalysisEngine, AnalysisService};
use config::{Config, StorageBackend, CONFIG};
use db::database::Database;
use db::memory::MemoryStore;
use db::RecordStore;
use llm::{GeminiClient, GeminiSettings, VisionModel};
use state::AppState;
use utils::logging::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    // Surface configuration problems as errors before the lazy CONFIG is touched.
    Config::load()?;
    let _guards = init_logging();

    info!(
        "Starting InverseLens (env={}, storage={}, model={})",
        CONFIG.app_env,
        CONFIG.storage_backend.label(),
        CONFIG.gemini_model
    );

    let model = GeminiClient::new(GeminiSettings {
        api_key: CONFIG.gemini_api_key.clone(),
        model: CONFIG.gemini_model.clone(),
        base_url: CONFIG.gemini_base_url.clone(),
        timeout: CONFIG.gemini_timeout(),
    })?;

    match CONFIG.storage_backend {
        StorageBackend::Memory => {
            warn!("Using in-memory storage; analyses are lost on restart");
            serve(Arc::new(MemoryStore::new()), model).await
        }
        StorageBackend::Sqlite => {
            let db = Database::init(&CONFIG.database_url, CONFIG.database_create_if_missing)
                .await
                .with_context(|| format!("Failed to open database {}", CONFIG.database_url))?;
            serve(Arc::new(db), model).await
        }
    }
}

async fn serve<S: RecordStore, M: VisionModel>(store: Arc<S>, model: M) -> anyhow::Result<()> {
    let service = AnalysisService::new(store, AnalysisEngine::new(model))
        .with_default_limit(CONFIG.recent_analyses_limit);
    let state = AppState::new(service, CONFIG.max_upload_bytes);
    let app = handlers::build_router(state);

    let address = format!("{}:{}", CONFIG.host, CONFIG.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
