//! End-to-end pipeline tests over a temporary warehouse

use chrono::{NaiveDate, NaiveDateTime, Utc};
use tempfile::tempdir;

use medical_warehouse_rust::db::Warehouse;
use medical_warehouse_rust::models::{DetectionResult, NewRawMessage};
use medical_warehouse_rust::{PipelineRunner, WarehouseError};

fn test_warehouse() -> (tempfile::TempDir, Warehouse) {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");
    let warehouse =
        Warehouse::new(&format!("sqlite:{}", db_path.display())).expect("Failed to open warehouse");
    (temp_dir, warehouse)
}

fn timestamp(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 1, day)
        .and_then(|d| d.and_hms_opt(hour, 0, 0))
        .expect("valid timestamp")
}

fn raw_message(
    message_id: i64,
    channel: &str,
    text: &str,
    views: i64,
    date: NaiveDateTime,
) -> NewRawMessage {
    NewRawMessage {
        message_id: Some(message_id),
        channel_name: Some(channel.to_string()),
        channel_title: Some(format!("{channel} official")),
        message_date: Some(date),
        message_text: Some(text.to_string()),
        has_media: Some(true),
        image_path: Some(format!("photos/{channel}_{message_id}.jpg")),
        views: Some(views),
        forwards: Some(2),
        extracted_at: None,
        raw_data: None,
    }
}

fn detection(message_id: i64, channel: &str) -> DetectionResult {
    DetectionResult {
        message_id: Some(message_id),
        channel_name: Some(channel.to_string()),
        image_path: format!("photos/{channel}_{message_id}.jpg"),
        detection_count: 2,
        image_category: Some("product_display".to_string()),
        confidence_score: 0.85,
        business_tags: "product_display,high_confidence".to_string(),
        top_objects: "bottle,person".to_string(),
        processed_at: Some(timestamp(17, 1)),
        error: None,
    }
}

fn seed_messages(warehouse: &Warehouse) {
    let rows = vec![
        raw_message(1, "tikvahpharma", "Amoxicillin in stock", 150, timestamp(14, 9)),
        raw_message(2, "tikvahpharma", "Paracetamol 500mg", 1200, timestamp(15, 20)),
        raw_message(3, "lobelia4cosmetics", "New skincare line", 80, timestamp(16, 11)),
    ];
    for row in rows {
        warehouse.insert_raw_message(&row).expect("seed failed");
    }
}

#[test]
fn test_full_pipeline_run() {
    let (_dir, warehouse) = test_warehouse();
    seed_messages(&warehouse);
    warehouse
        .insert_detection_result(&detection(3, "lobelia4cosmetics"))
        .expect("seed detection failed");

    let report = PipelineRunner::new(&warehouse).run().expect("run failed");

    assert_eq!(report.staged, 3);
    assert_eq!(report.dropped, 0);
    assert_eq!(report.channels, 2);
    assert_eq!(report.facts_inserted, 3);
    assert_eq!(report.detection_facts, 1);
    assert!(report.quality.passed());

    let facts = warehouse.fetch_message_facts().expect("fetch failed");
    assert_eq!(facts.len(), 3);

    let channels = warehouse.fetch_channel_dimensions().expect("fetch failed");
    assert_eq!(channels.len(), 2);
    // Dimension rows ordered by name: lobelia first.
    assert_eq!(channels[0].channel_name, "lobelia4cosmetics");
    assert_eq!(channels[0].total_posts, 1);
    assert_eq!(channels[1].total_posts, 2);

    // Date dimension spans the observed range contiguously.
    let dates = warehouse.fetch_date_dimensions().expect("fetch failed");
    assert_eq!(dates.len(), 3);
    assert_eq!(dates[0].date_key, 20260114);
    assert_eq!(dates[2].date_key, 20260116);

    let detections = warehouse
        .fetch_image_detection_facts()
        .expect("fetch failed");
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].channel_name, "lobelia4cosmetics");
    assert!(detections[0].is_product_display);
}

#[test]
fn test_rerun_is_idempotent() {
    let (_dir, warehouse) = test_warehouse();
    seed_messages(&warehouse);

    let first = PipelineRunner::new(&warehouse).run().expect("first run failed");
    assert_eq!(first.facts_inserted, 3);

    // Nothing newer than the high-water mark: no candidates, no duplicates.
    let second = PipelineRunner::new(&warehouse)
        .run()
        .expect("second run failed");
    assert_eq!(second.facts_inserted, 0);
    assert_eq!(second.facts_replaced, 0);
    assert!(second.quality.passed());

    let facts = warehouse.fetch_message_facts().expect("fetch failed");
    assert_eq!(facts.len(), 3);
}

#[test]
fn test_incremental_load_picks_up_new_messages() {
    let (_dir, warehouse) = test_warehouse();
    seed_messages(&warehouse);
    PipelineRunner::new(&warehouse).run().expect("first run failed");

    // A later scrape adds one newer message.
    warehouse
        .insert_raw_message(&raw_message(
            4,
            "tikvahpharma",
            "Ibuprofen restocked",
            60,
            timestamp(18, 10),
        ))
        .expect("insert failed");

    let report = PipelineRunner::new(&warehouse).run().expect("second run failed");
    assert_eq!(report.facts_inserted, 1);

    let facts = warehouse.fetch_message_facts().expect("fetch failed");
    assert_eq!(facts.len(), 4);
    // The date dimension grew to cover the new day.
    let dates = warehouse.fetch_date_dimensions().expect("fetch failed");
    assert_eq!(dates.last().expect("rows").date_key, 20260118);
}

#[test]
fn test_empty_raw_layer_fails_staging() {
    let (_dir, warehouse) = test_warehouse();

    match PipelineRunner::new(&warehouse).run() {
        Err(WarehouseError::StageFailed { stage, .. }) => assert_eq!(stage, "staging"),
        other => panic!("expected staging failure, got {other:?}"),
    }
}

#[test]
fn test_failed_run_releases_lock() {
    let (_dir, warehouse) = test_warehouse();

    // First run fails at staging (empty raw layer) but must release the
    // writer lock so a later run can proceed.
    assert!(PipelineRunner::new(&warehouse).run().is_err());

    seed_messages(&warehouse);
    assert!(PipelineRunner::new(&warehouse).run().is_ok());
}

#[test]
fn test_held_lock_blocks_run() {
    let (_dir, warehouse) = test_warehouse();
    seed_messages(&warehouse);

    let handle = warehouse.acquire_run_lock().expect("acquire failed");
    match PipelineRunner::new(&warehouse).run() {
        Err(WarehouseError::LockHeld) => {}
        other => panic!("expected LockHeld, got {other:?}"),
    }
    warehouse.release_run_lock(handle, true).expect("release failed");
}

#[test]
fn test_future_dated_message_is_reported_not_fatal() {
    let (_dir, warehouse) = test_warehouse();
    seed_messages(&warehouse);

    // A message two days in the future exceeds the default grace window.
    let future = Utc::now().naive_utc() + chrono::Duration::hours(48);
    warehouse
        .insert_raw_message(&raw_message(99, "tikvahpharma", "from the future", 10, future))
        .expect("insert failed");

    // Quality violations are a monitoring signal; the run still commits.
    let report = PipelineRunner::new(&warehouse).run().expect("run failed");
    assert!(!report.quality.passed());
    assert_eq!(report.quality.failed_checks(), vec!["no_future_messages"]);
    assert_eq!(report.facts_inserted, 4);

    // A wider grace window accepts the same data. No facts newer than the
    // high-water mark remain, so nothing is inserted.
    let report = PipelineRunner::new(&warehouse)
        .with_future_grace_hours(72)
        .run()
        .expect("run with wide grace failed");
    assert!(report.quality.passed());
    assert_eq!(report.facts_inserted, 0);
}
