use std::time::Instant;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::info;

pub const TIMING_TARGET: &str = "inverse_lens.timing";

pub async fn log_llm_timing<T, F, Fut>(
    provider: &str,
    model: &str,
    operation: &str,
    metadata: Option<JsonValue>,
    call: F,
) -> Result<T, anyhow::Error>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let started_at = Utc::now();
    let started_perf = Instant::now();
    let metadata_text = metadata
        .as_ref()
        .map(|value| value.to_string())
        .unwrap_or_else(|| "{}".to_string());
    info!(
        target: TIMING_TARGET,
        "event=llm_request provider={} model={} operation={} started_at={} metadata={}",
        provider,
        model,
        operation,
        started_at.to_rfc3339(),
        metadata_text
    );

    let result = call().await;
    let status = if result.is_ok() { "success" } else { "error" };

    let completed_at = Utc::now();
    let duration = started_perf.elapsed().as_secs_f64();
    info!(
        target: TIMING_TARGET,
        "event=llm_response provider={} model={} operation={} completed_at={} duration_s={:.3} status={} metadata={}",
        provider,
        model,
        operation,
        completed_at.to_rfc3339(),
        duration,
        status,
        metadata_text
    );

    result
}

/// Wall-clock timing for one analysis request, written to the timing log.
#[derive(Debug)]
pub struct AnalysisTimer {
    filename: String,
    size_bytes: usize,
    started_perf: Instant,
    completed: bool,
}

impl AnalysisTimer {
    pub fn start(filename: &str, size_bytes: usize) -> Self {
        info!(
            target: TIMING_TARGET,
            "event=analysis_received filename={:?} size_bytes={} received_at={}",
            filename,
            size_bytes,
            Utc::now().to_rfc3339()
        );
        AnalysisTimer {
            filename: filename.to_string(),
            size_bytes,
            started_perf: Instant::now(),
            completed: false,
        }
    }

    pub fn complete(&mut self, status: &str, record_id: Option<&str>) {
        if self.completed {
            return;
        }
        self.completed = true;
        info!(
            target: TIMING_TARGET,
            "event=analysis_completed filename={:?} size_bytes={} record_id={} duration_s={:.3} status={}",
            self.filename,
            self.size_bytes,
            record_id.unwrap_or("-"),
            self.started_perf.elapsed().as_secs_f64(),
            status
        );
    }
}

impl Drop for AnalysisTimer {
    fn drop(&mut self) {
        self.complete("dropped", None);
    }
}
