pub mod database;
pub mod memory;
pub mod models;

use std::future::Future;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::db::models::ImageAnalysisRecord;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("record {0} already exists")]
    Duplicate(String),
    #[error("stored record {id} is corrupt: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Keyed storage for analysis records.
///
/// Implementations must tolerate concurrent calls from in-flight requests.
/// `list_recent` orders by `created_at` descending; records sharing a
/// timestamp come back most recently inserted first.
pub trait RecordStore: Send + Sync + 'static {
    fn backend_name(&self) -> &'static str;

    fn put(
        &self,
        record: ImageAnalysisRecord,
    ) -> impl Future<Output = Result<ImageAnalysisRecord, StoreError>> + Send;

    fn get_by_id(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<ImageAnalysisRecord>, StoreError>> + Send;

    fn list_recent(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ImageAnalysisRecord>, StoreError>> + Send;

    fn health_check(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}

pub fn encode_elements(elements: &[String]) -> String {
    serde_json::to_string(elements).unwrap_or_else(|_| "[]".to_string())
}

pub fn decode_elements(id: &str, raw: &str) -> Result<Vec<String>, StoreError> {
    serde_json::from_str::<Vec<String>>(raw).map_err(|err| StoreError::Corrupt {
        id: id.to_string(),
        reason: format!("elements column is not a JSON string array: {err}"),
    })
}

/// Fixed-width millisecond RFC 3339, so stored timestamps sort lexically.
pub fn encode_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn decode_timestamp(id: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| StoreError::Corrupt {
            id: id.to_string(),
            reason: format!("created_at '{raw}' is not RFC 3339: {err}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn elements_survive_storage_encoding() {
        let cases: Vec<Vec<String>> = vec![
            vec![],
            vec!["red".to_string(), "circle".to_string()],
            vec![
                "quote \" inside".to_string(),
                "ünïcode ✨".to_string(),
                "comma, separated".to_string(),
                "".to_string(),
            ],
        ];
        for elements in cases {
            let encoded = encode_elements(&elements);
            assert_eq!(decode_elements("id", &encoded).unwrap(), elements);
        }
        assert_eq!(encode_elements(&[]), "[]");
    }

    #[test]
    fn rejects_non_array_elements() {
        let err = decode_elements("abc", "{\"not\":\"an array\"}").unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { ref id, .. } if id == "abc"));
    }

    #[test]
    fn timestamps_use_fixed_width_millis() {
        let value = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 5).unwrap();
        let encoded = encode_timestamp(&value);
        assert_eq!(encoded, "2024-03-01T12:00:05.000Z");
        assert_eq!(decode_timestamp("id", &encoded).unwrap(), value);
    }
}
