use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisPerspective {
    pub description: String,
    pub elements: Vec<String>,
    pub mood: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysisRecord {
    pub id: String,
    pub original_filename: String,
    /// Base64 of the uploaded bytes, stored verbatim.
    pub image_data: String,
    pub original: AnalysisPerspective,
    pub mirror: AnalysisPerspective,
    pub created_at: DateTime<Utc>,
}

/// Flat column layout of the `image_analyses` table.
#[derive(Debug, Clone, FromRow)]
pub struct ImageAnalysisRow {
    pub id: String,
    pub original_filename: String,
    pub image_data: String,
    pub original_description: String,
    pub original_elements: String,
    pub original_mood: String,
    pub mirror_description: String,
    pub mirror_elements: String,
    pub mirror_mood: String,
    pub created_at: String,
}
