use std::collections::HashMap;

use parking_lot::RwLock;

use crate::db::models::ImageAnalysisRecord;
use crate::db::{RecordStore, StoreError};

#[derive(Debug)]
struct StoredRecord {
    sequence: u64,
    record: ImageAnalysisRecord,
}

#[derive(Debug, Default)]
struct MemoryInner {
    next_sequence: u64,
    records: HashMap<String, StoredRecord>,
}

/// Process-local store. Everything is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }
}

impl RecordStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, record: ImageAnalysisRecord) -> Result<ImageAnalysisRecord, StoreError> {
        let mut inner = self.inner.write();
        if inner.records.contains_key(&record.id) {
            return Err(StoreError::Duplicate(record.id));
        }
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.records.insert(
            record.id.clone(),
            StoredRecord {
                sequence,
                record: record.clone(),
            },
        );
        Ok(record)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<ImageAnalysisRecord>, StoreError> {
        Ok(self
            .inner
            .read()
            .records
            .get(id)
            .map(|stored| stored.record.clone()))
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<ImageAnalysisRecord>, StoreError> {
        let inner = self.inner.read();
        let mut stored: Vec<&StoredRecord> = inner.records.values().collect();
        stored.sort_by(|a, b| {
            b.record
                .created_at
                .cmp(&a.record.created_at)
                .then_with(|| b.sequence.cmp(&a.sequence))
        });
        Ok(stored
            .into_iter()
            .take(limit)
            .map(|stored| stored.record.clone())
            .collect())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::models::AnalysisPerspective;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    pub(crate) fn sample_record(id: &str, created_at: DateTime<Utc>) -> ImageAnalysisRecord {
        ImageAnalysisRecord {
            id: id.to_string(),
            original_filename: format!("{id}.png"),
            image_data: "AQID".to_string(),
            original: AnalysisPerspective {
                description: "a red circle".to_string(),
                elements: vec!["red".to_string(), "circle".to_string()],
                mood: "calm".to_string(),
            },
            mirror: AnalysisPerspective {
                description: "a blue square".to_string(),
                elements: vec!["blue".to_string(), "square".to_string()],
                mood: "chaotic".to_string(),
            },
            created_at,
        }
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn unknown_id_is_absent() {
        let store = MemoryStore::new();
        assert!(store.get_by_id("nonexistent-id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_then_get_returns_equal_record() {
        let store = MemoryStore::new();
        let record = sample_record("a", base_time());
        let stored = store.put(record.clone()).await.unwrap();
        assert_eq!(stored, record);
        assert_eq!(store.get_by_id("a").await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let store = MemoryStore::new();
        store.put(sample_record("a", base_time())).await.unwrap();
        let err = store.put(sample_record("a", base_time())).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(id) if id == "a"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn recent_is_newest_first_and_limited() {
        let store = MemoryStore::new();
        for (index, id) in ["first", "second", "third"].iter().enumerate() {
            let created_at = base_time() + Duration::seconds(index as i64);
            store.put(sample_record(id, created_at)).await.unwrap();
        }

        let recent = store.list_recent(2).await.unwrap();
        let ids: Vec<&str> = recent.iter().map(|record| record.id.as_str()).collect();
        assert_eq!(ids, vec!["third", "second"]);
    }

    #[tokio::test]
    async fn equal_timestamps_fall_back_to_insertion_order() {
        let store = MemoryStore::new();
        for id in ["x", "y", "z"] {
            store.put(sample_record(id, base_time())).await.unwrap();
        }

        let recent = store.list_recent(10).await.unwrap();
        let ids: Vec<&str> = recent.iter().map(|record| record.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "y", "x"]);
    }
}
