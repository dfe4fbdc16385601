//! Fact builders for the star schema
//!
//! Message facts join the staged snapshot to both dimensions with inner-join
//! semantics: a message whose channel or date cannot be resolved is dropped,
//! never kept with null keys. Detection facts join the external vision
//! results back onto message facts the same way.

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDateTime, Timelike};
use tracing::debug;

use crate::dimensions::date_key;
use crate::models::{
    surrogate_key, ChannelDimension, DateDimension, DetectionResult, ImageDetectionFact,
    MessageFact, PerformanceCategory, PopularityLevel, PostingTimeCategory, StagedMessage,
};

/// Build message facts from the staged snapshot.
///
/// Rows dated at or before `high_water_mark` are skipped (incremental
/// policy: only data newer than what the target already holds is a
/// candidate). Rows without a message date, or whose channel/date key does
/// not resolve, are dropped.
#[must_use]
pub fn build_message_facts(
    staged: &[StagedMessage],
    channels: &[ChannelDimension],
    dates: &[DateDimension],
    high_water_mark: Option<NaiveDateTime>,
    loaded_at: NaiveDateTime,
) -> Vec<MessageFact> {
    let channel_keys: HashMap<&str, &str> = channels
        .iter()
        .map(|c| (c.channel_name.as_str(), c.channel_key.as_str()))
        .collect();
    let date_keys: HashSet<i32> = dates.iter().map(|d| d.date_key).collect();

    let mut facts = Vec::new();
    let mut dropped = 0usize;

    for message in staged {
        let Some(message_date) = message.message_date else {
            dropped += 1;
            continue;
        };
        if let Some(mark) = high_water_mark {
            if message_date <= mark {
                continue;
            }
        }
        let Some(channel_key) = channel_keys.get(message.channel_name.as_str()) else {
            dropped += 1;
            continue;
        };
        let key = date_key(message_date.date());
        if !date_keys.contains(&key) {
            dropped += 1;
            continue;
        }

        let views_per_forward = if message.forwards > 0 {
            Some(message.views as f64 / message.forwards as f64)
        } else {
            None
        };

        facts.push(MessageFact {
            message_key: surrogate_key(&[
                &message.message_id.to_string(),
                &message.channel_name,
            ]),
            message_id: message.message_id,
            channel_name: message.channel_name.clone(),
            channel_key: (*channel_key).to_string(),
            date_key: key,
            message_date,
            message_text: message.message_text.clone(),
            message_length: message.message_length,
            length_category: message.length_category,
            has_media: message.has_media,
            views: message.views,
            forwards: message.forwards,
            engagement_score: message.engagement_score,
            views_per_forward,
            posting_time_category: PostingTimeCategory::from_hour(message_date.hour()),
            popularity_level: PopularityLevel::from_views(message.views),
            loaded_at,
        });
    }

    if dropped > 0 {
        debug!(dropped, "Dropped staged rows with unresolvable dimension keys");
    }

    facts
}

/// Effectiveness weights from the source scoring model.
const CONFIDENCE_WEIGHT: f64 = 0.3;
const HAS_DETECTIONS_WEIGHT: f64 = 0.2;
const HIGH_CONFIDENCE_WEIGHT: f64 = 0.2;
const ABOVE_AVG_VIEWS_WEIGHT: f64 = 0.3;

/// Inputs for the recommendation rule chain.
#[derive(Debug, Clone, Copy)]
struct RecommendationContext {
    is_promotional: bool,
    is_product_display: bool,
    is_lifestyle: bool,
    is_high_confidence: bool,
    detection_count: i64,
    confidence_score: f64,
    views_above_channel_avg: bool,
}

/// Ordered recommendation rules, first match wins. Several conditions can
/// hold at once (a promotional image can also be high-engagement), so the
/// order is part of the contract.
const RECOMMENDATION_RULES: &[(fn(&RecommendationContext) -> bool, &str)] = &[
    (
        |c| c.is_promotional && c.views_above_channel_avg,
        "Scale this promotional format; it outperforms the channel average",
    ),
    (
        |c| c.is_product_display && c.is_high_confidence,
        "Reuse as catalog imagery for product listings",
    ),
    (
        |c| c.is_lifestyle,
        "Leverage for brand storytelling content",
    ),
    (
        |c| c.detection_count == 0,
        "Review image quality; the detector found no objects",
    ),
    (
        |c| c.confidence_score < 0.5,
        "Low detection confidence; consider re-running with a stronger model",
    ),
];

const DEFAULT_RECOMMENDATION: &str = "Maintain current content mix and monitor performance";

fn pick_recommendation(ctx: &RecommendationContext) -> &'static str {
    for (predicate, recommendation) in RECOMMENDATION_RULES {
        if predicate(ctx) {
            return recommendation;
        }
    }
    DEFAULT_RECOMMENDATION
}

fn has_tag(tags: &str, tag: &str) -> bool {
    tags.to_lowercase().contains(tag)
}

const fn weight_if(condition: bool) -> f64 {
    if condition {
        1.0
    } else {
        0.0
    }
}

/// Build image detection facts from the external detection results.
///
/// Results carrying a detector error, or whose `(message_id, channel_name)`
/// does not resolve to a message fact, are excluded.
#[must_use]
pub fn build_image_detection_facts(
    detections: &[DetectionResult],
    message_facts: &[MessageFact],
    channels: &[ChannelDimension],
    loaded_at: NaiveDateTime,
) -> Vec<ImageDetectionFact> {
    let facts_by_key: HashMap<(i64, &str), &MessageFact> = message_facts
        .iter()
        .map(|f| ((f.message_id, f.channel_name.as_str()), f))
        .collect();
    let avg_views: HashMap<&str, f64> = channels
        .iter()
        .map(|c| (c.channel_name.as_str(), c.avg_views))
        .collect();

    let mut rows = Vec::new();
    let mut dropped = 0usize;

    for detection in detections {
        if detection.error.is_some() {
            dropped += 1;
            continue;
        }
        let (Some(message_id), Some(channel_name)) =
            (detection.message_id, detection.channel_name.as_deref())
        else {
            dropped += 1;
            continue;
        };
        let Some(fact) = facts_by_key.get(&(message_id, channel_name)) else {
            dropped += 1;
            continue;
        };

        let is_promotional = has_tag(&detection.business_tags, "promotional");
        let is_product_display = has_tag(&detection.business_tags, "product_display");
        let is_lifestyle = has_tag(&detection.business_tags, "lifestyle");
        let is_high_confidence = has_tag(&detection.business_tags, "high_confidence");
        let views_above_channel_avg = avg_views
            .get(channel_name)
            .is_some_and(|avg| fact.views as f64 > *avg);

        let effectiveness_score = CONFIDENCE_WEIGHT * detection.confidence_score
            + HAS_DETECTIONS_WEIGHT * weight_if(detection.detection_count > 0)
            + HIGH_CONFIDENCE_WEIGHT * weight_if(is_high_confidence)
            + ABOVE_AVG_VIEWS_WEIGHT * weight_if(views_above_channel_avg);

        let ctx = RecommendationContext {
            is_promotional,
            is_product_display,
            is_lifestyle,
            is_high_confidence,
            detection_count: detection.detection_count,
            confidence_score: detection.confidence_score,
            views_above_channel_avg,
        };

        rows.push(ImageDetectionFact {
            detection_key: surrogate_key(&[
                &message_id.to_string(),
                channel_name,
                &detection.image_path,
            ]),
            message_id,
            channel_name: channel_name.to_string(),
            channel_key: fact.channel_key.clone(),
            date_key: fact.date_key,
            image_path: detection.image_path.clone(),
            detection_count: detection.detection_count,
            image_category: detection
                .image_category
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            confidence_score: detection.confidence_score,
            business_tags: detection.business_tags.clone(),
            top_objects: detection.top_objects.clone(),
            is_promotional,
            is_product_display,
            is_lifestyle,
            is_high_confidence,
            effectiveness_score,
            performance_category: PerformanceCategory::from_score(effectiveness_score),
            recommendation: pick_recommendation(&ctx).to_string(),
            loaded_at,
        });
    }

    if dropped > 0 {
        debug!(dropped, "Dropped detection rows without a matching message fact");
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimensions::{build_channel_dimension, build_date_dimension};
    use crate::models::MessageLengthCategory;
    use chrono::NaiveDate;

    fn staged(message_id: i64, channel: &str, views: i64, hour: u32) -> StagedMessage {
        StagedMessage {
            message_id,
            channel_name: channel.to_string(),
            channel_title: Some("Title".to_string()),
            message_date: NaiveDate::from_ymd_opt(2026, 1, 16)
                .and_then(|d| d.and_hms_opt(hour, 30, 0)),
            message_text: "Buy now!".to_string(),
            message_length: 8,
            length_category: MessageLengthCategory::Short,
            has_media: true,
            views,
            forwards: 10,
            engagement_score: views as f64 + 50.0,
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 17)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default()
    }

    fn build_all(rows: &[StagedMessage]) -> Vec<MessageFact> {
        let channels = build_channel_dimension(rows);
        let dates = build_date_dimension(
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
        );
        build_message_facts(rows, &channels, &dates, None, now())
    }

    #[test]
    fn facts_join_and_derive() {
        let facts = build_all(&[staged(1, "chemedinfo", 150, 10)]);
        assert_eq!(facts.len(), 1);
        let fact = &facts[0];
        assert_eq!(fact.date_key, 20260116);
        assert_eq!(fact.popularity_level, PopularityLevel::Popular);
        assert_eq!(fact.posting_time_category, PostingTimeCategory::BusinessHours);
        assert_eq!(fact.views_per_forward, Some(15.0));
    }

    #[test]
    fn unresolvable_channel_is_dropped() {
        let rows = vec![staged(1, "chemedinfo", 150, 10)];
        let channels = build_channel_dimension(&[]); // no channels resolvable
        let dates = build_date_dimension(
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
        );
        let facts = build_message_facts(&rows, &channels, &dates, None, now());
        assert!(facts.is_empty());
    }

    #[test]
    fn unresolvable_date_is_dropped() {
        let rows = vec![staged(1, "chemedinfo", 150, 10)];
        let channels = build_channel_dimension(&rows);
        let dates = build_date_dimension(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
        );
        let facts = build_message_facts(&rows, &channels, &dates, None, now());
        assert!(facts.is_empty());
    }

    #[test]
    fn high_water_mark_filters_old_rows() {
        let rows = vec![staged(1, "chemedinfo", 150, 10), staged(2, "chemedinfo", 150, 12)];
        let channels = build_channel_dimension(&rows);
        let dates = build_date_dimension(
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
        );
        let mark = NaiveDate::from_ymd_opt(2026, 1, 16).and_then(|d| d.and_hms_opt(11, 0, 0));
        let facts = build_message_facts(&rows, &channels, &dates, mark, now());
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].message_id, 2);
    }

    #[test]
    fn zero_forwards_yields_no_ratio() {
        let mut row = staged(1, "chemedinfo", 150, 10);
        row.forwards = 0;
        let facts = build_all(&[row]);
        assert_eq!(facts[0].views_per_forward, None);
    }

    fn detection(message_id: i64, channel: &str, tags: &str, confidence: f64) -> DetectionResult {
        DetectionResult {
            message_id: Some(message_id),
            channel_name: Some(channel.to_string()),
            image_path: format!("data/raw/images/{channel}/{message_id}.jpg"),
            detection_count: 3,
            image_category: Some("promotional".to_string()),
            confidence_score: confidence,
            business_tags: tags.to_string(),
            top_objects: "person,bottle".to_string(),
            processed_at: Some(now()),
            error: None,
        }
    }

    #[test]
    fn detection_facts_join_and_score() {
        let rows = vec![staged(1, "chemedinfo", 500, 10), staged(2, "chemedinfo", 100, 11)];
        let channels = build_channel_dimension(&rows);
        let dates = build_date_dimension(
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
        );
        let facts = build_message_facts(&rows, &channels, &dates, None, now());

        // avg views is 300, message 1 has 500 (above), with high confidence.
        let detections = vec![detection(1, "chemedinfo", "promotional,high_confidence", 0.9)];
        let image_facts = build_image_detection_facts(&detections, &facts, &channels, now());
        assert_eq!(image_facts.len(), 1);
        let row = &image_facts[0];
        assert!(row.is_promotional);
        assert!(row.is_high_confidence);
        assert!(!row.is_lifestyle);
        // 0.3*0.9 + 0.2*1 + 0.2*1 + 0.3*1 = 0.97
        assert!((row.effectiveness_score - 0.97).abs() < 1e-9);
        assert_eq!(row.performance_category, PerformanceCategory::Excellent);
        assert!(row.recommendation.contains("promotional"));
    }

    #[test]
    fn recommendation_order_is_first_match_wins() {
        // Both promotional+above-average and lifestyle hold; the promotional
        // rule is earlier in the chain.
        let ctx = RecommendationContext {
            is_promotional: true,
            is_product_display: false,
            is_lifestyle: true,
            is_high_confidence: true,
            detection_count: 2,
            confidence_score: 0.9,
            views_above_channel_avg: true,
        };
        assert!(pick_recommendation(&ctx).contains("promotional"));

        // Without the engagement condition the lifestyle rule wins.
        let ctx = RecommendationContext {
            views_above_channel_avg: false,
            ..ctx
        };
        assert!(pick_recommendation(&ctx).contains("storytelling"));
    }

    #[test]
    fn unmatched_detection_is_dropped() {
        let rows = vec![staged(1, "chemedinfo", 500, 10)];
        let channels = build_channel_dimension(&rows);
        let dates = build_date_dimension(
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
        );
        let facts = build_message_facts(&rows, &channels, &dates, None, now());

        let detections = vec![detection(99, "chemedinfo", "lifestyle", 0.8)];
        let image_facts = build_image_detection_facts(&detections, &facts, &channels, now());
        assert!(image_facts.is_empty());
    }

    #[test]
    fn errored_detection_is_dropped() {
        let rows = vec![staged(1, "chemedinfo", 500, 10)];
        let channels = build_channel_dimension(&rows);
        let dates = build_date_dimension(
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
        );
        let facts = build_message_facts(&rows, &channels, &dates, None, now());

        let mut bad = detection(1, "chemedinfo", "lifestyle", 0.8);
        bad.error = Some("corrupt image".to_string());
        let image_facts = build_image_detection_facts(&[bad], &facts, &channels, now());
        assert!(image_facts.is_empty());
    }
}
