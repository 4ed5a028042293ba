use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::db::models::ImageAnalysisRecord;
use crate::db::RecordStore;
use crate::handlers::responses::{
    AnalysisDetail, AnalysisExport, AnalyzeResponse, ApiError, HealthResponse, RecentAnalysis,
    FETCH_FAILED_MESSAGE, RECENT_FAILED_MESSAGE, SAVE_FAILED_MESSAGE,
};
use crate::handlers::upload::read_image_upload;
use crate::llm::media::detect_mime_type;
use crate::llm::VisionModel;
use crate::state::AppState;

pub const EXPORT_FILENAME: &str = "mirror-vision-analysis.json";

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    limit: Option<String>,
}

/// Reads the leading digits, so `5abc` and `3.7` mean 5 and 3.
fn parse_limit(raw: Option<&str>) -> Option<usize> {
    let value = raw?.trim_start();
    let value = value.strip_prefix('+').unwrap_or(value);
    let digits_end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    value[..digits_end].parse::<usize>().ok()
}

async fn load_record<S: RecordStore, M: VisionModel>(
    state: &AppState<S, M>,
    id: &str,
) -> Result<ImageAnalysisRecord, ApiError> {
    state
        .service
        .get(id)
        .await
        .map_err(|err| ApiError::from_service(err, FETCH_FAILED_MESSAGE))?
        .ok_or(ApiError::NotFound)
}

pub async fn health<S: RecordStore, M: VisionModel>(
    State(state): State<AppState<S, M>>,
) -> Json<HealthResponse> {
    let status = match state.service.store().health_check().await {
        Ok(()) => "ok",
        Err(err) => {
            warn!("Store health check failed: {}", err);
            "degraded"
        }
    };
    Json(HealthResponse {
        status,
        timestamp: Utc::now().to_rfc3339(),
        uptime: state.started_at.elapsed().as_secs_f64(),
    })
}

pub async fn analyze_image<S: RecordStore, M: VisionModel>(
    State(state): State<AppState<S, M>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let upload = read_image_upload(multipart, state.max_upload_bytes).await?;
    debug!(
        "Received upload {:?} ({}, {} bytes)",
        upload.filename,
        upload.content_type,
        upload.bytes.len()
    );

    let record = state
        .service
        .submit(&upload.bytes, &upload.filename)
        .await
        .map_err(|err| ApiError::from_service(err, SAVE_FAILED_MESSAGE))?;
    Ok(Json(AnalyzeResponse::from(record)))
}

pub async fn get_analysis<S: RecordStore, M: VisionModel>(
    State(state): State<AppState<S, M>>,
    Path(id): Path<String>,
) -> Result<Json<AnalysisDetail>, ApiError> {
    let record = load_record(&state, &id).await?;
    Ok(Json(AnalysisDetail::from(record)))
}

pub async fn get_analysis_image<S: RecordStore, M: VisionModel>(
    State(state): State<AppState<S, M>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let record = load_record(&state, &id).await?;
    let bytes = general_purpose::STANDARD
        .decode(record.image_data.as_bytes())
        .map_err(|err| {
            error!("Stored image for analysis {} is not valid base64: {}", id, err);
            ApiError::Internal(FETCH_FAILED_MESSAGE.to_string())
        })?;
    let mime_type =
        detect_mime_type(&bytes).unwrap_or_else(|| "application/octet-stream".to_string());
    Ok(([(header::CONTENT_TYPE, mime_type)], bytes).into_response())
}

pub async fn export_analysis<S: RecordStore, M: VisionModel>(
    State(state): State<AppState<S, M>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let record = load_record(&state, &id).await?;
    let export = AnalysisExport {
        original: record.original,
        mirror: record.mirror,
        timestamp: Utc::now(),
    };
    let body = serde_json::to_string_pretty(&export).map_err(|err| {
        error!("Failed to serialize export for analysis {}: {}", id, err);
        ApiError::Internal(FETCH_FAILED_MESSAGE.to_string())
    })?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{EXPORT_FILENAME}\""),
            ),
        ],
        body,
    )
        .into_response())
}

pub async fn recent_analyses<S: RecordStore, M: VisionModel>(
    State(state): State<AppState<S, M>>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<RecentAnalysis>>, ApiError> {
    let records = state
        .service
        .list_recent(parse_limit(query.limit.as_deref()))
        .await
        .map_err(|err| ApiError::from_service(err, RECENT_FAILED_MESSAGE))?;
    Ok(Json(records.into_iter().map(RecentAnalysis::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::parse_limit;

    #[test]
    fn limit_parsing_reads_leading_digits() {
        assert_eq!(parse_limit(Some("5")), Some(5));
        assert_eq!(parse_limit(Some(" 7 ")), Some(7));
        assert_eq!(parse_limit(Some("5abc")), Some(5));
        assert_eq!(parse_limit(Some("3.7")), Some(3));
        assert_eq!(parse_limit(Some("+4")), Some(4));
        assert_eq!(parse_limit(Some("-1")), None);
        assert_eq!(parse_limit(Some("")), None);
        assert_eq!(parse_limit(Some("ten")), None);
        assert_eq!(parse_limit(None), None);
    }
}
