use std::sync::Arc;
use std::time::Instant;

use crate::analysis::AnalysisService;

pub struct AppState<S, M> {
    pub service: Arc<AnalysisService<S, M>>,
    pub started_at: Instant,
    pub max_upload_bytes: usize,
}

impl<S, M> AppState<S, M> {
    pub fn new(service: AnalysisService<S, M>, max_upload_bytes: usize) -> Self {
        AppState {
            service: Arc::new(service),
            started_at: Instant::now(),
            max_upload_bytes,
        }
    }
}

// Manual impl: a derive would demand `S: Clone` and `M: Clone`.
impl<S, M> Clone for AppState<S, M> {
    fn clone(&self) -> Self {
        AppState {
            service: Arc::clone(&self.service),
            started_at: self.started_at,
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}
