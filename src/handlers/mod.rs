pub mod api;
pub mod responses;
pub mod upload;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::db::RecordStore;
use crate::llm::VisionModel;
use crate::state::AppState;

/// Headroom over the image limit for multipart boundaries and headers.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router<S: RecordStore, M: VisionModel>(state: AppState<S, M>) -> Router {
    let body_limit = state
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/api/health", get(api::health::<S, M>))
        .route("/api/analyze-image", post(api::analyze_image::<S, M>))
        .route("/api/analysis/:id", get(api::get_analysis::<S, M>))
        .route("/api/analysis/:id/image", get(api::get_analysis_image::<S, M>))
        .route("/api/analysis/:id/export", get(api::export_analysis::<S, M>))
        .route("/api/recent-analyses", get(api::recent_analyses::<S, M>))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
