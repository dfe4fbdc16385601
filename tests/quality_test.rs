//! Integration tests for the data quality suite against a real warehouse

use chrono::{NaiveDate, NaiveDateTime};
use tempfile::tempdir;

use medical_warehouse_rust::db::Warehouse;
use medical_warehouse_rust::models::{
    surrogate_key, MessageFact, MessageLengthCategory, NewRawMessage, PopularityLevel,
    PostingTimeCategory,
};
use medical_warehouse_rust::quality::run_quality_checks;

fn test_warehouse() -> (tempfile::TempDir, Warehouse) {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");
    let warehouse =
        Warehouse::new(&format!("sqlite:{}", db_path.display())).expect("Failed to open warehouse");
    (temp_dir, warehouse)
}

fn timestamp(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 1, day)
        .and_then(|d| d.and_hms_opt(10, 0, 0))
        .expect("valid timestamp")
}

fn fact(message_id: i64, channel_key: &str, date_key: i32) -> MessageFact {
    MessageFact {
        message_key: surrogate_key(&[&message_id.to_string(), "tikvahpharma"]),
        message_id,
        channel_name: "tikvahpharma".to_string(),
        channel_key: channel_key.to_string(),
        date_key,
        message_date: timestamp(16),
        message_text: "Paracetamol 500mg".to_string(),
        message_length: 17,
        length_category: MessageLengthCategory::Short,
        has_media: false,
        views: 100,
        forwards: 2,
        engagement_score: 110.0,
        views_per_forward: Some(50.0),
        posting_time_category: PostingTimeCategory::BusinessHours,
        popularity_level: PopularityLevel::Regular,
        loaded_at: timestamp(17),
    }
}

#[test]
fn test_empty_warehouse_passes_all_checks() {
    let (_dir, warehouse) = test_warehouse();

    let report =
        run_quality_checks(&warehouse, &[], &[], &[], 24).expect("quality run failed");
    assert!(report.passed());
    assert_eq!(report.checks.len(), 7);
    assert!(report.failed_checks().is_empty());
}

#[test]
fn test_duplicate_raw_load_is_absorbed_by_constraint() {
    let (_dir, warehouse) = test_warehouse();

    let row = NewRawMessage {
        message_id: Some(1),
        channel_name: Some("tikvahpharma".to_string()),
        channel_title: None,
        message_date: Some(timestamp(16)),
        message_text: Some("hello".to_string()),
        has_media: Some(false),
        image_path: None,
        views: Some(10),
        forwards: Some(0),
        extracted_at: None,
        raw_data: None,
    };
    warehouse.insert_raw_message(&row).expect("insert failed");
    warehouse.insert_raw_message(&row).expect("insert failed");

    // The UNIQUE constraint absorbs the duplicate, so the check passes.
    let report =
        run_quality_checks(&warehouse, &[], &[], &[], 24).expect("quality run failed");
    assert!(report.passed());
    assert_eq!(
        warehouse.fetch_raw_messages().expect("fetch failed").len(),
        1
    );
}

#[test]
fn test_dangling_keys_fail_referential_check() {
    let (_dir, warehouse) = test_warehouse();

    // In-memory facts reference a channel and a date that were never stored.
    let facts = vec![fact(1, "no-such-channel-key", 20260116)];
    let report =
        run_quality_checks(&warehouse, &facts, &[], &[], 24).expect("quality run failed");

    assert!(!report.passed());
    assert_eq!(report.failed_checks(), vec!["referential_integrity"]);
}

#[test]
fn test_upsert_collapses_colliding_message_ids_in_one_batch() {
    let (_dir, warehouse) = test_warehouse();

    // Two candidates share a message_id but carry different surrogate keys.
    // The delete-then-insert runs per candidate, so the second one replaces
    // the first even within a single batch and uniqueness holds.
    let mut first = fact(1, "key-a", 20260116);
    first.message_key = "key-one".to_string();
    let mut second = fact(1, "key-a", 20260116);
    second.message_key = "key-two".to_string();

    let (replaced, inserted) = warehouse
        .upsert_message_facts(&[first, second])
        .expect("upsert failed");
    // The second candidate replaced the first within the same batch.
    assert_eq!(replaced, 1);
    assert_eq!(inserted, 2);

    // The table therefore holds one row and the check passes.
    let persisted = warehouse.fetch_message_facts().expect("fetch failed");
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].message_key, "key-two");
}

#[test]
fn test_failed_checks_are_named() {
    let (_dir, warehouse) = test_warehouse();

    let mut negative = fact(5, "key-a", 20260116);
    negative.views = -10;
    let report =
        run_quality_checks(&warehouse, &[negative], &[], &[], 24).expect("quality run failed");

    assert!(!report.passed());
    let failed = report.failed_checks();
    assert!(failed.contains(&"no_negative_metrics"));
    assert!(failed.contains(&"referential_integrity"));
}
