//! Staging transform over the raw message layer
//!
//! A pure function from raw rows to cleaned, derived rows. Malformed rows
//! (null message id or blank channel name) are silently excluded; the
//! quality-check suite polices the raw layer independently.

use tracing::debug;

use crate::models::{MessageLengthCategory, RawMessage, StagedMessage, NO_TEXT_SENTINEL};

/// Weight applied to views in the engagement score
const VIEW_WEIGHT: f64 = 1.0;
/// Weight applied to forwards in the engagement score
const FORWARD_WEIGHT: f64 = 5.0;

/// Outcome of staging a raw snapshot
#[derive(Debug)]
pub struct StagingOutcome {
    /// Rows that passed validation and normalization
    pub staged: Vec<StagedMessage>,
    /// Count of raw rows excluded for a missing natural key
    pub dropped: usize,
}

/// Derive the staged view from a raw snapshot.
///
/// Filters rows with a null `message_id` or blank `channel_name`, clamps
/// views/forwards to be non-negative, substitutes a sentinel for blank text,
/// and computes the text length bucket and engagement score.
#[must_use]
pub fn stage_messages(raw: &[RawMessage]) -> StagingOutcome {
    let mut staged = Vec::with_capacity(raw.len());
    let mut dropped = 0usize;

    for row in raw {
        let Some(message_id) = row.message_id else {
            dropped += 1;
            continue;
        };
        let channel_name = match &row.channel_name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => {
                dropped += 1;
                continue;
            }
        };

        let original_text = row.message_text.as_deref().map(str::trim).unwrap_or("");
        // Length reflects the original text, so blank messages bucket as Empty
        // even though the stored text becomes the sentinel.
        let message_length = original_text.chars().count() as i64;
        let message_text = if original_text.is_empty() {
            NO_TEXT_SENTINEL.to_string()
        } else {
            original_text.to_string()
        };

        let views = row.views.unwrap_or(0).max(0);
        let forwards = row.forwards.unwrap_or(0).max(0);

        staged.push(StagedMessage {
            message_id,
            channel_name,
            channel_title: row.channel_title.clone(),
            message_date: row.message_date,
            message_text,
            message_length,
            length_category: MessageLengthCategory::from_length(message_length),
            has_media: row.has_media.unwrap_or(false),
            views,
            forwards,
            engagement_score: engagement_score(views, forwards),
        });
    }

    if dropped > 0 {
        debug!(dropped, "Excluded raw rows with missing natural key");
    }

    StagingOutcome { staged, dropped }
}

/// Weighted engagement: views count once, forwards count five times.
#[must_use]
pub fn engagement_score(views: i64, forwards: i64) -> f64 {
    views as f64 * VIEW_WEIGHT + forwards as f64 * FORWARD_WEIGHT
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn raw(message_id: Option<i64>, channel: Option<&str>) -> RawMessage {
        RawMessage {
            id: 1,
            message_id,
            channel_name: channel.map(ToString::to_string),
            channel_title: Some("Test Channel".to_string()),
            message_date: NaiveDate::from_ymd_opt(2026, 1, 16)
                .and_then(|d| d.and_hms_opt(10, 0, 0)),
            message_text: Some("Buy now!".to_string()),
            has_media: Some(false),
            image_path: None,
            views: Some(150),
            forwards: Some(10),
            extracted_at: NaiveDate::from_ymd_opt(2026, 1, 16)
                .and_then(|d| d.and_hms_opt(12, 0, 0))
                .unwrap_or_default(),
            raw_data: None,
        }
    }

    #[test]
    fn valid_rows_are_staged() {
        let outcome = stage_messages(&[raw(Some(1), Some("chemedinfo"))]);
        assert_eq!(outcome.staged.len(), 1);
        assert_eq!(outcome.dropped, 0);
        assert_eq!(outcome.staged[0].engagement_score, 200.0);
    }

    #[test]
    fn missing_message_id_is_dropped() {
        let outcome = stage_messages(&[raw(None, Some("chemedinfo"))]);
        assert!(outcome.staged.is_empty());
        assert_eq!(outcome.dropped, 1);
    }

    #[test]
    fn blank_channel_name_is_dropped() {
        let outcome = stage_messages(&[raw(Some(1), Some("   ")), raw(Some(2), None)]);
        assert!(outcome.staged.is_empty());
        assert_eq!(outcome.dropped, 2);
    }

    #[test]
    fn negative_metrics_are_clamped() {
        let mut row = raw(Some(1), Some("chemedinfo"));
        row.views = Some(-5);
        row.forwards = None;
        let outcome = stage_messages(&[row]);
        assert_eq!(outcome.staged[0].views, 0);
        assert_eq!(outcome.staged[0].forwards, 0);
        assert_eq!(outcome.staged[0].engagement_score, 0.0);
    }

    #[test]
    fn blank_text_gets_sentinel_and_empty_bucket() {
        let mut row = raw(Some(1), Some("chemedinfo"));
        row.message_text = Some("   ".to_string());
        let outcome = stage_messages(&[row]);
        let staged = &outcome.staged[0];
        assert_eq!(staged.message_text, NO_TEXT_SENTINEL);
        assert_eq!(staged.message_length, 0);
        assert_eq!(staged.length_category, MessageLengthCategory::Empty);
    }

    #[test]
    fn long_text_buckets_as_long() {
        let mut row = raw(Some(1), Some("chemedinfo"));
        row.message_text = Some("x".repeat(1001));
        let outcome = stage_messages(&[row]);
        assert_eq!(outcome.staged[0].length_category, MessageLengthCategory::Long);
    }
}
