//! Data quality checks
//!
//! A small check suite that runs after every load. Checks that concern
//! persisted uniqueness read the warehouse tables; checks on derived values
//! run over the in-memory fact rows. Failures are a monitoring signal, not
//! a transactional guarantee: already-written tables are never rolled back.

use std::collections::{HashMap, HashSet};

use chrono::{Duration, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::db::Warehouse;
use crate::error::Result;
use crate::models::{ChannelCategory, ChannelDimension, DateDimension, MessageFact};

/// Maximum accepted message text length, in characters
const MAX_TEXT_CHARS: usize = 10_000;

/// Default grace window for message timestamps ahead of the wall clock
pub const DEFAULT_FUTURE_GRACE_HOURS: i64 = 24;

/// Outcome of a single quality check
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// Check identifier
    pub name: &'static str,
    /// Number of offending rows (zero means the check passed)
    pub failures: usize,
    /// Human-readable description of the first few offenders
    pub detail: Option<String>,
}

impl CheckResult {
    fn pass(name: &'static str) -> Self {
        Self {
            name,
            failures: 0,
            detail: None,
        }
    }

    fn fail(name: &'static str, failures: usize, detail: String) -> Self {
        Self {
            name,
            failures,
            detail: Some(detail),
        }
    }

    fn from_offending_ids(name: &'static str, what: &str, offenders: &[i64]) -> Self {
        if offenders.is_empty() {
            Self::pass(name)
        } else {
            let ids: Vec<String> = offenders.iter().take(5).map(ToString::to_string).collect();
            Self::fail(
                name,
                offenders.len(),
                format!("{what}: {}", ids.join(", ")),
            )
        }
    }

    /// True when the check found no offending rows
    pub const fn passed(&self) -> bool {
        self.failures == 0
    }
}

/// Aggregated result of the full check suite
#[derive(Debug, Clone, Serialize)]
pub struct QualityReport {
    /// Individual check outcomes, in execution order
    pub checks: Vec<CheckResult>,
}

impl QualityReport {
    /// True when every check passed
    pub fn passed(&self) -> bool {
        self.checks.iter().all(CheckResult::passed)
    }

    /// Names of the failed checks
    pub fn failed_checks(&self) -> Vec<&'static str> {
        self.checks
            .iter()
            .filter(|check| !check.passed())
            .map(|check| check.name)
            .collect()
    }
}

/// Run the full quality suite.
///
/// `facts`, `channels`, and `dates` are the rows produced by the current
/// run; uniqueness checks additionally read the persisted tables through
/// `warehouse`.
pub fn run_quality_checks(
    warehouse: &Warehouse,
    facts: &[MessageFact],
    channels: &[ChannelDimension],
    dates: &[DateDimension],
    future_grace_hours: i64,
) -> Result<QualityReport> {
    let now = Utc::now().naive_utc();

    let stored_channel_types = warehouse.fetch_channel_type_labels()?;
    let checks = vec![
        check_no_future_messages(facts, now, future_grace_hours),
        check_no_negative_metrics(facts),
        check_bounded_text_length(facts),
        check_valid_channel_type(&stored_channel_types),
        check_unique_message_ids(warehouse)?,
        check_unique_date_keys(dates),
        check_referential_integrity(facts, channels, dates),
    ];

    let report = QualityReport { checks };
    if report.passed() {
        info!(checks = report.checks.len(), "All quality checks passed");
    } else {
        for check in &report.checks {
            if !check.passed() {
                warn!(
                    check = check.name,
                    failures = check.failures,
                    detail = check.detail.as_deref().unwrap_or(""),
                    "Quality check failed"
                );
            }
        }
    }
    Ok(report)
}

/// Message timestamps may not be further ahead of the wall clock than the
/// grace window. Clock skew between scraper hosts motivates the window.
fn check_no_future_messages(
    facts: &[MessageFact],
    now: NaiveDateTime,
    grace_hours: i64,
) -> CheckResult {
    let cutoff = now + Duration::hours(grace_hours);
    let offenders: Vec<i64> = facts
        .iter()
        .filter(|fact| fact.message_date > cutoff)
        .map(|fact| fact.message_id)
        .collect();
    CheckResult::from_offending_ids("no_future_messages", "future-dated message ids", &offenders)
}

/// Views, forwards, lengths, and engagement must all be non-negative.
fn check_no_negative_metrics(facts: &[MessageFact]) -> CheckResult {
    let offenders: Vec<i64> = facts
        .iter()
        .filter(|fact| {
            fact.views < 0
                || fact.forwards < 0
                || fact.message_length < 0
                || fact.engagement_score < 0.0
        })
        .map(|fact| fact.message_id)
        .collect();
    CheckResult::from_offending_ids(
        "no_negative_metrics",
        "negative metrics on message ids",
        &offenders,
    )
}

/// Message text must fit the ingest bound.
fn check_bounded_text_length(facts: &[MessageFact]) -> CheckResult {
    let offenders: Vec<i64> = facts
        .iter()
        .filter(|fact| fact.message_text.chars().count() > MAX_TEXT_CHARS)
        .map(|fact| fact.message_id)
        .collect();
    CheckResult::from_offending_ids(
        "bounded_text_length",
        "oversized text on message ids",
        &offenders,
    )
}

/// Stored channel types must be one of the four category labels. The check
/// reads the stored text back from the warehouse rather than trusting the
/// parsed enum.
fn check_valid_channel_type(stored_channel_types: &[(String, String)]) -> CheckResult {
    let mut offenders: Vec<String> = stored_channel_types
        .iter()
        .filter(|(_, label)| ChannelCategory::from_label(label).is_none())
        .map(|(name, label)| format!("{name} ({label})"))
        .collect();

    if offenders.is_empty() {
        CheckResult::pass("valid_channel_type")
    } else {
        let count = offenders.len();
        offenders.truncate(5);
        CheckResult::fail(
            "valid_channel_type",
            count,
            format!("unexpected channel types: {}", offenders.join("; ")),
        )
    }
}

/// No two persisted message facts may share a message_id.
fn check_unique_message_ids(warehouse: &Warehouse) -> Result<CheckResult> {
    let facts = warehouse.fetch_message_facts()?;
    let mut counts: HashMap<i64, usize> = HashMap::new();
    for fact in &facts {
        *counts.entry(fact.message_id).or_insert(0) += 1;
    }
    let mut duplicates: Vec<i64> = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(id, _)| id)
        .collect();
    duplicates.sort_unstable();
    Ok(CheckResult::from_offending_ids(
        "unique_message_ids",
        "duplicate message ids",
        &duplicates,
    ))
}

/// Date keys must be unique across the date dimension snapshot.
fn check_unique_date_keys(dates: &[DateDimension]) -> CheckResult {
    let mut seen = HashSet::new();
    let duplicates: Vec<i64> = dates
        .iter()
        .filter(|date| !seen.insert(date.date_key))
        .map(|date| i64::from(date.date_key))
        .collect();
    CheckResult::from_offending_ids("unique_date_keys", "duplicate date keys", &duplicates)
}

/// Every fact must reference an existing channel key and date key.
fn check_referential_integrity(
    facts: &[MessageFact],
    channels: &[ChannelDimension],
    dates: &[DateDimension],
) -> CheckResult {
    let channel_keys: HashSet<&str> = channels
        .iter()
        .map(|channel| channel.channel_key.as_str())
        .collect();
    let date_keys: HashSet<i32> = dates.iter().map(|date| date.date_key).collect();

    let offenders: Vec<i64> = facts
        .iter()
        .filter(|fact| {
            !channel_keys.contains(fact.channel_key.as_str())
                || !date_keys.contains(&fact.date_key)
        })
        .map(|fact| fact.message_id)
        .collect();
    CheckResult::from_offending_ids(
        "referential_integrity",
        "dangling dimension keys on message ids",
        &offenders,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageLengthCategory, PopularityLevel, PostingTimeCategory};
    use chrono::NaiveDate;

    fn fact(message_id: i64, channel_key: &str, date_key: i32) -> MessageFact {
        let message_date = NaiveDate::from_ymd_opt(2025, 7, 15)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        MessageFact {
            message_key: format!("key-{message_id}"),
            message_id,
            channel_name: "lobelia4cosmetics".to_string(),
            channel_key: channel_key.to_string(),
            date_key,
            message_date,
            message_text: "paracetamol 500mg".to_string(),
            message_length: 17,
            length_category: MessageLengthCategory::Short,
            has_media: false,
            views: 10,
            forwards: 1,
            engagement_score: 15.0,
            views_per_forward: Some(10.0),
            posting_time_category: PostingTimeCategory::BusinessHours,
            popularity_level: PopularityLevel::Regular,
            loaded_at: message_date,
        }
    }

    fn date_row(date_key: i32) -> DateDimension {
        DateDimension {
            date_key,
            full_date: NaiveDate::from_ymd_opt(2025, 7, 15).unwrap(),
            day_of_week: 2,
            day_name: "Tue".to_string(),
            week_of_year: 29,
            month: 7,
            month_name: "July".to_string(),
            quarter: 3,
            year: 2025,
            is_weekend: false,
            is_business_day: true,
            fiscal_year: 2025,
            season: "Summer".to_string(),
            ethiopian_year: 2017,
        }
    }

    fn channel_row(channel_key: &str) -> ChannelDimension {
        ChannelDimension {
            channel_key: channel_key.to_string(),
            channel_name: "lobelia4cosmetics".to_string(),
            channel_title: "Lobelia Cosmetics".to_string(),
            channel_type: ChannelCategory::Cosmetics,
            first_post_at: None,
            last_post_at: None,
            total_posts: 1,
            posts_with_media: 0,
            media_percentage: 0.0,
            avg_views: 10.0,
            avg_forwards: 1.0,
            avg_engagement: 15.0,
            activity_level: crate::models::ActivityLevel::Low,
        }
    }

    #[test]
    fn referential_integrity_flags_dangling_keys() {
        let facts = vec![fact(1, "known", 20250715), fact(2, "unknown", 20250715)];
        let channels = vec![channel_row("known")];
        let dates = vec![date_row(20250715)];

        let result = check_referential_integrity(&facts, &channels, &dates);
        assert_eq!(result.failures, 1);
        assert!(result.detail.unwrap().contains('2'));
    }

    #[test]
    fn referential_integrity_passes_when_keys_resolve() {
        let facts = vec![fact(1, "known", 20250715)];
        let channels = vec![channel_row("known")];
        let dates = vec![date_row(20250715)];

        let result = check_referential_integrity(&facts, &channels, &dates);
        assert!(result.passed());
    }

    #[test]
    fn negative_views_fail_metrics_check() {
        let mut bad = fact(9, "known", 20250715);
        bad.views = -5;
        let result = check_no_negative_metrics(&[bad]);
        assert_eq!(result.failures, 1);
    }

    #[test]
    fn future_dates_respect_grace_window() {
        let now = NaiveDate::from_ymd_opt(2025, 7, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();

        let mut inside_grace = fact(1, "known", 20250716);
        inside_grace.message_date = now + Duration::hours(12);
        let mut beyond_grace = fact(2, "known", 20250717);
        beyond_grace.message_date = now + Duration::hours(36);

        let result = check_no_future_messages(&[inside_grace, beyond_grace], now, 24);
        assert_eq!(result.failures, 1);
    }

    #[test]
    fn oversized_text_fails_bound_check() {
        let mut big = fact(3, "known", 20250715);
        big.message_text = "x".repeat(MAX_TEXT_CHARS + 1);
        let result = check_bounded_text_length(&[big]);
        assert_eq!(result.failures, 1);

        let exact = {
            let mut f = fact(4, "known", 20250715);
            f.message_text = "y".repeat(MAX_TEXT_CHARS);
            f
        };
        assert!(check_bounded_text_length(&[exact]).passed());
    }

    #[test]
    fn channel_types_validated_against_whitelist() {
        let stored = vec![(
            "lobelia4cosmetics".to_string(),
            ChannelCategory::Cosmetics.label().to_string(),
        )];
        assert!(check_valid_channel_type(&stored).passed());

        let stored = vec![("tikvahpharma".to_string(), "Mystery".to_string())];
        assert_eq!(check_valid_channel_type(&stored).failures, 1);
    }

    #[test]
    fn duplicate_date_keys_are_flagged() {
        let dates = vec![date_row(20250715), date_row(20250715), date_row(20250716)];
        let result = check_unique_date_keys(&dates);
        assert_eq!(result.failures, 1);
    }
}
