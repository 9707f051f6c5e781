use crate::domain::{
    edits::Edits,
    field::FieldDescriptor,
    ports::FeatureService,
    query::{FeatureQuery, QueryResponse},
    value_objects::LayerRef,
};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, instrument};

// ─── PerfReport ──────────────────────────────────────────────────────────────

/// A single timed remote call.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OpTiming {
    /// Operation name: "query", "layer_fields" or "apply_edits".
    pub operation: &'static str,
    /// Layer the call was made against.
    pub layer: String,
    /// Elapsed wall time in milliseconds.
    pub duration_ms: u128,
    /// Rows returned (queries) or records submitted (edits).
    pub rows: usize,
}

/// Accumulated timings for one sync run.
///
/// Shared across decorator instances via `Arc<Mutex<_>>`.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct PerfReport {
    pub timings: Vec<OpTiming>,
    pub total_rows_fetched: usize,
    pub total_records_written: usize,
    pub total_ms: u128,
}

impl PerfReport {
    pub fn new() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::default()))
    }

    fn record(report: &Arc<Mutex<Self>>, timing: OpTiming) {
        if let Ok(mut r) = report.lock() {
            r.total_ms += timing.duration_ms;
            match timing.operation {
                "query" => r.total_rows_fetched += timing.rows,
                "apply_edits" => r.total_records_written += timing.rows,
                _ => {}
            }
            r.timings.push(timing);
        }
    }

    /// Copy of the report accumulated so far.
    pub fn snapshot(report: &Arc<Mutex<Self>>) -> Self {
        report.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

// ─── MonitoringFeatureService ────────────────────────────────────────────────

/// Decorator: wraps any `FeatureService`, measures wall time per remote call,
/// and appends the result to the shared `PerfReport`.
pub struct MonitoringFeatureService {
    inner: Arc<dyn FeatureService>,
    report: Arc<Mutex<PerfReport>>,
}

impl MonitoringFeatureService {
    pub fn new(inner: Arc<dyn FeatureService>, report: Arc<Mutex<PerfReport>>) -> Self {
        Self { inner, report }
    }

    fn record(&self, operation: &'static str, layer: &LayerRef, start: Instant, rows: usize) {
        let duration_ms = start.elapsed().as_millis();
        info!(layer = %layer, rows, duration_ms, "{} completed", operation);
        PerfReport::record(
            &self.report,
            OpTiming {
                operation,
                layer: layer.to_string(),
                duration_ms,
                rows,
            },
        );
    }
}

#[async_trait]
impl FeatureService for MonitoringFeatureService {
    #[instrument(
        name = "query",
        skip(self, layer, query),
        fields(layer = %layer, where_clause = %query.where_clause),
        level = "info"
    )]
    async fn query(&self, layer: &LayerRef, query: &FeatureQuery) -> Result<QueryResponse> {
        let start = Instant::now();
        let response = self.inner.query(layer, query).await?;
        self.record("query", layer, start, response.features.len());
        Ok(response)
    }

    #[instrument(name = "layer_fields", skip(self, layer), fields(layer = %layer), level = "info")]
    async fn layer_fields(&self, layer: &LayerRef) -> Result<Vec<FieldDescriptor>> {
        let start = Instant::now();
        let fields = self.inner.layer_fields(layer).await?;
        self.record("layer_fields", layer, start, 0);
        Ok(fields)
    }

    #[instrument(
        name = "apply_edits",
        skip(self, layer, edits),
        fields(
            layer = %layer,
            adds = edits.adds.len(),
            updates = edits.updates.len(),
            deletes = edits.deletes.len(),
        ),
        level = "info"
    )]
    async fn apply_edits(&self, layer: &LayerRef, edits: &Edits) -> Result<Value> {
        let start = Instant::now();
        let response = self.inner.apply_edits(layer, edits).await?;
        let records = edits.adds.len() + edits.updates.len() + edits.deletes.len();
        self.record("apply_edits", layer, start, records);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::field::FieldType;
    use crate::domain::table::{Feature, RowMap};
    use crate::infrastructure::memory::InMemoryFeatureService;
    use serde_json::json;

    #[tokio::test]
    async fn records_each_call() {
        let layer = LayerRef::new("memory://t", 0);
        let rows: Vec<RowMap> = serde_json::from_value(json!([{"A": 1}, {"A": 2}])).unwrap();
        let inner = Arc::new(InMemoryFeatureService::new().with_layer(
            layer.clone(),
            vec![FieldDescriptor::new("OBJECTID", FieldType::Oid)],
            rows,
        ));
        let report = PerfReport::new();
        let svc = MonitoringFeatureService::new(inner, Arc::clone(&report));

        svc.query(&layer, &FeatureQuery::all()).await.unwrap();
        svc.apply_edits(&layer, &Edits::adds(vec![Feature::default()]))
            .await
            .unwrap();

        let perf = PerfReport::snapshot(&report);
        assert_eq!(perf.timings.len(), 2);
        assert_eq!(perf.total_rows_fetched, 2);
        assert_eq!(perf.total_records_written, 1);
        assert_eq!(perf.timings[1].operation, "apply_edits");
    }
}
