use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{SubsecRound, Utc};
use tracing::{error, info};
use uuid::Uuid;

use crate::analysis::engine::{AnalysisEngine, AnalysisError};
use crate::db::models::ImageAnalysisRecord;
use crate::db::{RecordStore, StoreError};
use crate::llm::VisionModel;
use crate::utils::timing::AnalysisTimer;

pub const DEFAULT_RECENT_LIMIT: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

/// Validates uploads, runs the engine and persists the result.
pub struct AnalysisService<S, M> {
    store: Arc<S>,
    engine: AnalysisEngine<M>,
    default_limit: usize,
}

impl<S: RecordStore, M: VisionModel> AnalysisService<S, M> {
    pub fn new(store: Arc<S>, engine: AnalysisEngine<M>) -> Self {
        Self {
            store,
            engine,
            default_limit: DEFAULT_RECENT_LIMIT,
        }
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = if limit == 0 { DEFAULT_RECENT_LIMIT } else { limit };
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn submit(
        &self,
        image: &[u8],
        original_filename: &str,
    ) -> Result<ImageAnalysisRecord, ServiceError> {
        if image.is_empty() {
            return Err(ServiceError::Validation(
                "No image file provided".to_string(),
            ));
        }

        let mut timer = AnalysisTimer::start(original_filename, image.len());
        let analysis = match self.engine.analyze(image).await {
            Ok(analysis) => analysis,
            Err(err) => {
                error!(
                    "Image analysis failed during {} phase for {:?}: {}",
                    err.phase().label(),
                    original_filename,
                    err.detail()
                );
                timer.complete("analysis_error", None);
                return Err(err.into());
            }
        };

        let record = ImageAnalysisRecord {
            id: Uuid::new_v4().to_string(),
            original_filename: original_filename.to_string(),
            image_data: general_purpose::STANDARD.encode(image),
            original: analysis.original,
            mirror: analysis.mirror,
            created_at: Utc::now().trunc_subsecs(3),
        };

        match self.store.put(record).await {
            Ok(stored) => {
                info!(
                    "Stored analysis {} for {:?} in {} store",
                    stored.id,
                    stored.original_filename,
                    self.store.backend_name()
                );
                timer.complete("success", Some(&stored.id));
                Ok(stored)
            }
            Err(err) => {
                error!(
                    "Failed to persist analysis for {:?}: {}",
                    original_filename, err
                );
                timer.complete("persistence_error", None);
                Err(err.into())
            }
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<ImageAnalysisRecord>, ServiceError> {
        self.store.get_by_id(id).await.map_err(|err| {
            error!("Failed to load analysis {}: {}", id, err);
            ServiceError::from(err)
        })
    }

    /// `None` and `Some(0)` both mean the default page size.
    pub async fn list_recent(
        &self,
        limit: Option<usize>,
    ) -> Result<Vec<ImageAnalysisRecord>, ServiceError> {
        let limit = match limit {
            Some(limit) if limit > 0 => limit,
            _ => self.default_limit,
        };
        self.store.list_recent(limit).await.map_err(|err| {
            error!("Failed to list recent analyses: {}", err);
            ServiceError::from(err)
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::analysis::engine::tests::ScriptedModel;
    use crate::db::memory::tests::sample_record;
    use crate::db::memory::MemoryStore;
    use crate::db::models::AnalysisPerspective;
    use anyhow::anyhow;
    use chrono::{Duration, TimeZone};

    /// Store whose every operation fails, for persistence-error paths.
    pub(crate) struct BrokenStore;

    impl RecordStore for BrokenStore {
        fn backend_name(&self) -> &'static str {
            "broken"
        }

        async fn put(&self, _record: ImageAnalysisRecord) -> Result<ImageAnalysisRecord, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }

        async fn get_by_id(&self, _id: &str) -> Result<Option<ImageAnalysisRecord>, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }

        async fn list_recent(&self, _limit: usize) -> Result<Vec<ImageAnalysisRecord>, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }

        async fn health_check(&self) -> Result<(), StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }
    }

    fn service_with(
        model: ScriptedModel,
    ) -> AnalysisService<MemoryStore, ScriptedModel> {
        AnalysisService::new(Arc::new(MemoryStore::new()), AnalysisEngine::new(model))
    }

    #[tokio::test]
    async fn submit_stores_both_perspectives() {
        let service = service_with(ScriptedModel::red_circle_blue_square());
        let record = service.submit(&[1, 2, 3], "fake.png").await.unwrap();

        assert!(Uuid::parse_str(&record.id).is_ok());
        assert_eq!(record.original_filename, "fake.png");
        assert_eq!(record.image_data, "AQID");
        assert_eq!(
            record.original,
            AnalysisPerspective {
                description: "a red circle".to_string(),
                elements: vec!["red".to_string(), "circle".to_string()],
                mood: "calm".to_string(),
            }
        );
        assert_eq!(
            record.mirror,
            AnalysisPerspective {
                description: "a blue square".to_string(),
                elements: vec!["blue".to_string(), "square".to_string()],
                mood: "chaotic".to_string(),
            }
        );

        let fetched = service.get(&record.id).await.unwrap();
        assert_eq!(fetched, Some(record));
    }

    #[tokio::test]
    async fn submit_against_sqlite_round_trips_exactly() {
        let db = crate::db::database::Database::init("sqlite::memory:", true)
            .await
            .unwrap();
        let service = AnalysisService::new(
            Arc::new(db),
            AnalysisEngine::new(ScriptedModel::red_circle_blue_square()),
        );
        let record = service.submit(&[1, 2, 3], "fake.png").await.unwrap();
        assert_eq!(service.get(&record.id).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn empty_upload_never_reaches_the_model() {
        let service = service_with(ScriptedModel::red_circle_blue_square());
        let err = service.submit(&[], "empty.png").await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(service.engine_calls(), 0);
    }

    #[tokio::test]
    async fn analysis_failure_persists_nothing() {
        let service = service_with(ScriptedModel::new(vec![Err(anyhow!("boom"))]));
        let err = service.submit(&[1], "x.png").await.unwrap_err();
        assert!(matches!(err, ServiceError::Analysis(_)));
        assert!(service.list_recent(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mirror_failure_persists_nothing() {
        let service = service_with(ScriptedModel::new(vec![
            Ok(r#"{"description":"d","elements":[],"mood":"m"}"#.to_string()),
            Err(anyhow!("boom")),
        ]));
        assert!(service.submit(&[1], "x.png").await.is_err());
        assert!(service.list_recent(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn store_failure_is_a_persistence_error() {
        let service = AnalysisService::new(
            Arc::new(BrokenStore),
            AnalysisEngine::new(ScriptedModel::red_circle_blue_square()),
        );
        let err = service.submit(&[1, 2, 3], "x.png").await.unwrap_err();
        assert!(matches!(err, ServiceError::Persistence(_)));
        assert!(matches!(
            service.get("any").await.unwrap_err(),
            ServiceError::Persistence(_)
        ));
    }

    #[tokio::test]
    async fn unknown_id_is_absent_not_an_error() {
        let service = service_with(ScriptedModel::default());
        assert!(service.get("nonexistent-id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_recent_returns_newest_first() {
        let store = Arc::new(MemoryStore::new());
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for (offset, id) in ["one", "two", "three"].iter().enumerate() {
            store
                .put(sample_record(id, base + Duration::minutes(offset as i64)))
                .await
                .unwrap();
        }
        let service = AnalysisService::new(store, AnalysisEngine::new(ScriptedModel::default()));

        let recent = service.list_recent(Some(2)).await.unwrap();
        let ids: Vec<&str> = recent.iter().map(|record| record.id.as_str()).collect();
        assert_eq!(ids, vec!["three", "two"]);
    }

    #[tokio::test]
    async fn zero_or_missing_limit_uses_default_page() {
        let store = Arc::new(MemoryStore::new());
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for index in 0..12 {
            store
                .put(sample_record(&format!("r{index}"), base + Duration::seconds(index)))
                .await
                .unwrap();
        }
        let service = AnalysisService::new(store, AnalysisEngine::new(ScriptedModel::default()));

        assert_eq!(service.list_recent(None).await.unwrap().len(), 10);
        assert_eq!(service.list_recent(Some(0)).await.unwrap().len(), 10);
        assert_eq!(service.list_recent(Some(50)).await.unwrap().len(), 12);

        let service = service.with_default_limit(3);
        assert_eq!(service.list_recent(None).await.unwrap().len(), 3);
    }

    impl<S: RecordStore> AnalysisService<S, ScriptedModel> {
        fn engine_calls(&self) -> usize {
            self.engine.model().call_count()
        }
    }
}
