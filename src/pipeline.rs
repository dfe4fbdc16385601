//! Pipeline orchestration
//!
//! Runs the full transform as one fail-fast batch: connectivity probe,
//! writer lock, staging, dimensions, fact upsert, detection facts, then the
//! quality suite. A stage error aborts the run and records it as failed in
//! the run registry; tables committed by earlier stages stay intact, and the
//! raw layer is never touched here, so a failed run can simply be retried.
//! Quality check failures are reported, not fatal.

use std::time::Instant;

use chrono::Utc;
use tracing::{error, info};

use crate::db::Warehouse;
use crate::dimensions::{build_channel_dimension, build_date_dimension, observed_date_range};
use crate::error::{Result, WarehouseError};
use crate::facts::{build_image_detection_facts, build_message_facts};
use crate::logging::OperationTimer;
use crate::metrics;
use crate::quality::{run_quality_checks, QualityReport, DEFAULT_FUTURE_GRACE_HOURS};
use crate::staging::stage_messages;

/// Summary of a completed pipeline run
#[derive(Debug)]
pub struct PipelineReport {
    /// Raw rows that survived staging
    pub staged: usize,
    /// Raw rows dropped during staging
    pub dropped: usize,
    /// Channel dimension size after the rebuild
    pub channels: usize,
    /// Date dimension rows generated this run
    pub dates: usize,
    /// Message facts inserted by the incremental upsert
    pub facts_inserted: usize,
    /// Message facts replaced (same message_id re-loaded)
    pub facts_replaced: usize,
    /// Image detection facts written
    pub detection_facts: usize,
    /// Quality suite outcome
    pub quality: QualityReport,
}

/// Pipeline orchestrator over a warehouse
pub struct PipelineRunner<'a> {
    warehouse: &'a Warehouse,
    future_grace_hours: i64,
}

impl<'a> PipelineRunner<'a> {
    pub fn new(warehouse: &'a Warehouse) -> Self {
        Self {
            warehouse,
            future_grace_hours: DEFAULT_FUTURE_GRACE_HOURS,
        }
    }

    /// Override the grace window for the future-date quality check
    #[must_use]
    pub fn with_future_grace_hours(mut self, hours: i64) -> Self {
        self.future_grace_hours = hours;
        self
    }

    /// Run the full pipeline.
    ///
    /// Holds the writer lock for the duration; a concurrent run fails with
    /// [`WarehouseError::LockHeld`] instead of corrupting the fact upsert.
    pub fn run(&self) -> Result<PipelineReport> {
        let run_start = Instant::now();

        self.warehouse.connectivity_check()?;
        let handle = self.warehouse.acquire_run_lock()?;
        info!("Pipeline run started");

        let result = self.run_stages();

        let succeeded = result.is_ok();
        self.warehouse.release_run_lock(handle, succeeded)?;
        metrics::record_pipeline_run(succeeded, run_start.elapsed());

        match &result {
            Ok(report) => info!(
                staged = report.staged,
                facts_inserted = report.facts_inserted,
                detection_facts = report.detection_facts,
                "Pipeline run succeeded"
            ),
            Err(err) => error!(error = %err, "Pipeline run failed"),
        }
        result
    }

    fn run_stages(&self) -> Result<PipelineReport> {
        let loaded_at = Utc::now().naive_utc();

        // Staging: read the raw snapshot and normalize it in memory.
        let stage_start = Instant::now();
        let timer = OperationTimer::new("stage_messages");
        let raw = self.warehouse.fetch_raw_messages()?;
        let outcome = stage_messages(&raw);
        timer.finish();
        metrics::record_stage("staging", stage_start.elapsed());
        metrics::record_rows_dropped(outcome.dropped);
        if outcome.staged.is_empty() {
            return Err(WarehouseError::StageFailed {
                stage: "staging",
                message: "no valid messages to process".to_string(),
            });
        }
        info!(
            staged = outcome.staged.len(),
            dropped = outcome.dropped,
            "Staged raw messages"
        );

        // Dimensions: channels are rebuilt wholesale, dates are extended.
        let dim_start = Instant::now();
        let channels = build_channel_dimension(&outcome.staged);
        self.warehouse.replace_channel_dimensions(&channels)?;
        metrics::record_channel_count(channels.len());

        let (min_date, max_date) = observed_date_range(&outcome.staged).ok_or_else(|| {
            WarehouseError::StageFailed {
                stage: "dimensions",
                message: "no observable date range".to_string(),
            }
        })?;
        let new_dates = build_date_dimension(min_date, max_date);
        self.warehouse.extend_date_dimensions(&new_dates)?;
        metrics::record_stage("dimensions", dim_start.elapsed());

        // Facts: incremental upsert keyed on message_id, gated by the
        // high-water mark read before this run's writes.
        let fact_start = Instant::now();
        let high_water_mark = self.warehouse.message_fact_high_water_mark()?;
        let all_dates = self.warehouse.fetch_date_dimensions()?;
        let candidates = build_message_facts(
            &outcome.staged,
            &channels,
            &all_dates,
            high_water_mark,
            loaded_at,
        );
        let (replaced, inserted) = self.warehouse.upsert_message_facts(&candidates)?;
        metrics::record_facts_upserted(inserted);
        metrics::record_stage("message_facts", fact_start.elapsed());

        // Detection facts: joined against the full persisted fact table so
        // detections for previously loaded messages still resolve.
        let detection_start = Instant::now();
        let detections = self.warehouse.fetch_detection_results()?;
        let all_facts = self.warehouse.fetch_message_facts()?;
        let detection_facts =
            build_image_detection_facts(&detections, &all_facts, &channels, loaded_at);
        self.warehouse
            .replace_image_detection_facts(&detection_facts)?;
        metrics::record_stage("detection_facts", detection_start.elapsed());

        // Quality suite: a monitoring signal, not a gate. Failures are
        // logged and carried in the report; committed tables stay intact.
        let quality_start = Instant::now();
        let quality = run_quality_checks(
            self.warehouse,
            &all_facts,
            &channels,
            &all_dates,
            self.future_grace_hours,
        )?;
        metrics::record_stage("quality_checks", quality_start.elapsed());
        for check in &quality.checks {
            if !check.passed() {
                metrics::record_quality_failure(check.name, check.failures);
            }
        }

        Ok(PipelineReport {
            staged: outcome.staged.len(),
            dropped: outcome.dropped,
            channels: channels.len(),
            dates: new_dates.len(),
            facts_inserted: inserted,
            facts_replaced: replaced,
            detection_facts: detection_facts.len(),
            quality,
        })
    }
}
