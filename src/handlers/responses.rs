use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::analysis::ServiceError;
use crate::db::models::{AnalysisPerspective, ImageAnalysisRecord};

pub const NO_IMAGE_MESSAGE: &str = "No image file provided";
pub const NOT_IMAGE_MESSAGE: &str = "Only image files are allowed";
pub const TOO_LARGE_MESSAGE: &str = "Image exceeds the upload size limit";
pub const NOT_FOUND_MESSAGE: &str = "Analysis not found";
pub const SAVE_FAILED_MESSAGE: &str = "Failed to save analysis";
pub const FETCH_FAILED_MESSAGE: &str = "Failed to fetch analysis";
pub const RECENT_FAILED_MESSAGE: &str = "Failed to fetch recent analyses";

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub id: String,
    pub original: AnalysisPerspective,
    pub mirror: AnalysisPerspective,
}

impl From<ImageAnalysisRecord> for AnalyzeResponse {
    fn from(record: ImageAnalysisRecord) -> Self {
        AnalyzeResponse {
            id: record.id,
            original: record.original,
            mirror: record.mirror,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisDetail {
    pub id: String,
    pub original_filename: String,
    pub original: AnalysisPerspective,
    pub mirror: AnalysisPerspective,
    pub created_at: DateTime<Utc>,
}

impl From<ImageAnalysisRecord> for AnalysisDetail {
    fn from(record: ImageAnalysisRecord) -> Self {
        AnalysisDetail {
            id: record.id,
            original_filename: record.original_filename,
            original: record.original,
            mirror: record.mirror,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentAnalysis {
    pub id: String,
    pub original_filename: String,
    pub created_at: DateTime<Utc>,
}

impl From<ImageAnalysisRecord> for RecentAnalysis {
    fn from(record: ImageAnalysisRecord) -> Self {
        RecentAnalysis {
            id: record.id,
            original_filename: record.original_filename,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalysisExport {
    pub original: AnalysisPerspective,
    pub mirror: AnalysisPerspective,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub uptime: f64,
}

/// Client-facing error. Messages here are always safe to show to users.
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    NotFound,
    Internal(String),
}

impl ApiError {
    pub fn validation(message: &str) -> Self {
        ApiError::Validation(message.to_string())
    }

    /// Maps a service failure; persistence errors get `persistence_message`
    /// since the underlying store error must not leak.
    pub fn from_service(err: ServiceError, persistence_message: &str) -> Self {
        match err {
            ServiceError::Validation(message) => ApiError::Validation(message),
            ServiceError::Analysis(err) => ApiError::Internal(err.to_string()),
            ServiceError::Persistence(_) => ApiError::Internal(persistence_message.to_string()),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::Validation(message) | ApiError::Internal(message) => message,
            ApiError::NotFound => NOT_FOUND_MESSAGE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "message": self.message() }))).into_response()
    }
}
