//! Pipeline metrics
//!
//! Thin wrappers over the `metrics` facade so call sites stay one line.
//! Without an installed recorder every call is a no-op; an exporter can be
//! wired in at the binary edge without touching the pipeline.

use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// Metric name constants
pub mod names {
    /// Pipeline runs, labeled by final status
    pub const PIPELINE_RUNS_TOTAL: &str = "medical_warehouse_pipeline_runs_total";
    /// Wall-clock duration of a full pipeline run
    pub const PIPELINE_DURATION: &str = "medical_warehouse_pipeline_duration_seconds";
    /// Per-stage duration, labeled by stage
    pub const STAGE_DURATION: &str = "medical_warehouse_stage_duration_seconds";
    /// Raw rows ingested, labeled by source
    pub const ROWS_INGESTED_TOTAL: &str = "medical_warehouse_rows_ingested_total";
    /// Raw rows dropped during staging
    pub const ROWS_DROPPED_TOTAL: &str = "medical_warehouse_rows_dropped_total";
    /// Message facts written by the incremental upsert
    pub const FACTS_UPSERTED_TOTAL: &str = "medical_warehouse_facts_upserted_total";
    /// Current channel dimension size
    pub const CHANNEL_COUNT: &str = "medical_warehouse_channel_count";
    /// Quality check failures, labeled by check
    pub const QUALITY_FAILURES_TOTAL: &str = "medical_warehouse_quality_failures_total";
}

/// Record the outcome and duration of a full pipeline run
pub fn record_pipeline_run(success: bool, duration: Duration) {
    let status = if success { "success" } else { "error" };
    counter!(names::PIPELINE_RUNS_TOTAL, "status" => status).increment(1);
    histogram!(names::PIPELINE_DURATION).record(duration.as_secs_f64());
}

/// Record the duration of a single pipeline stage
pub fn record_stage(stage: &'static str, duration: Duration) {
    histogram!(names::STAGE_DURATION, "stage" => stage).record(duration.as_secs_f64());
}

/// Record raw rows ingested from a loader
pub fn record_rows_ingested(count: usize, source: &'static str) {
    counter!(names::ROWS_INGESTED_TOTAL, "source" => source).increment(count as u64);
}

/// Record raw rows dropped during staging
pub fn record_rows_dropped(count: usize) {
    counter!(names::ROWS_DROPPED_TOTAL).increment(count as u64);
}

/// Record message facts written by an upsert
pub fn record_facts_upserted(count: usize) {
    counter!(names::FACTS_UPSERTED_TOTAL).increment(count as u64);
}

/// Record the current channel dimension size
pub fn record_channel_count(count: usize) {
    gauge!(names::CHANNEL_COUNT).set(count as f64);
}

/// Record a failed quality check
pub fn record_quality_failure(check: &'static str, failures: usize) {
    counter!(names::QUALITY_FAILURES_TOTAL, "check" => check).increment(failures as u64);
}
