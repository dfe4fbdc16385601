//! Dimension builders for the star schema
//!
//! Both builders are pure functions over the staged snapshot. The channel
//! builder aggregates per-channel activity and classifies each channel with
//! an explicit ordered predicate list; the date builder generates a
//! contiguous calendar series over the observed date range.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::models::{
    surrogate_key, ActivityLevel, ChannelCategory, ChannelDimension, DateDimension, StagedMessage,
};

/// Ordered category predicates. Evaluated top to bottom, first match wins,
/// so a name like "healthmed" resolves to Pharmaceutical before the
/// healthcare patterns are ever consulted.
const CATEGORY_RULES: &[(&[&str], ChannelCategory)] = &[
    (&["pharma", "med", "drug"], ChannelCategory::Pharmaceutical),
    (&["cosmetic", "beauty", "skin"], ChannelCategory::Cosmetics),
    (&["health", "care", "clinic"], ChannelCategory::Healthcare),
];

/// Classify a channel name, case-insensitively, first match wins.
#[must_use]
pub fn classify_channel(channel_name: &str) -> ChannelCategory {
    let lowered = channel_name.to_lowercase();
    for (patterns, category) in CATEGORY_RULES {
        if patterns.iter().any(|p| lowered.contains(p)) {
            return *category;
        }
    }
    ChannelCategory::GeneralMedical
}

#[derive(Debug, Default)]
struct ChannelAccumulator {
    titles: Vec<String>,
    first_post_at: Option<NaiveDateTime>,
    last_post_at: Option<NaiveDateTime>,
    total_posts: i64,
    posts_with_media: i64,
    total_views: i64,
    total_forwards: i64,
    total_engagement: f64,
}

/// Build the channel dimension from the staged snapshot.
///
/// One row per distinct channel name, sorted by name for deterministic
/// output. The surrogate key hashes name and title, so it stays stable
/// across runs for unchanged channels.
#[must_use]
pub fn build_channel_dimension(staged: &[StagedMessage]) -> Vec<ChannelDimension> {
    // BTreeMap keeps the output ordered by channel name.
    let mut groups: BTreeMap<&str, ChannelAccumulator> = BTreeMap::new();

    for message in staged {
        let acc = groups.entry(message.channel_name.as_str()).or_default();
        if let Some(title) = &message.channel_title {
            acc.titles.push(title.clone());
        }
        if let Some(date) = message.message_date {
            acc.first_post_at = Some(acc.first_post_at.map_or(date, |d| d.min(date)));
            acc.last_post_at = Some(acc.last_post_at.map_or(date, |d| d.max(date)));
        }
        acc.total_posts += 1;
        if message.has_media {
            acc.posts_with_media += 1;
        }
        acc.total_views += message.views;
        acc.total_forwards += message.forwards;
        acc.total_engagement += message.engagement_score;
    }

    groups
        .into_iter()
        .map(|(name, acc)| {
            // SQL MAX() semantics over observed titles keeps the key stable
            // regardless of row order.
            let channel_title = acc.titles.iter().max().cloned().unwrap_or_default();
            let posts = acc.total_posts as f64;
            ChannelDimension {
                channel_key: surrogate_key(&[name, &channel_title]),
                channel_name: name.to_string(),
                channel_type: classify_channel(name),
                first_post_at: acc.first_post_at,
                last_post_at: acc.last_post_at,
                total_posts: acc.total_posts,
                posts_with_media: acc.posts_with_media,
                media_percentage: acc.posts_with_media as f64 / posts * 100.0,
                avg_views: acc.total_views as f64 / posts,
                avg_forwards: acc.total_forwards as f64 / posts,
                avg_engagement: acc.total_engagement / posts,
                activity_level: ActivityLevel::from_post_count(acc.total_posts),
                channel_title,
            }
        })
        .collect()
}

/// Integer date key in YYYYMMDD form, a pure function of the date.
#[must_use]
pub fn date_key(date: NaiveDate) -> i32 {
    date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32
}

/// Observed date range of a staged snapshot, if any row carries a date.
#[must_use]
pub fn observed_date_range(staged: &[StagedMessage]) -> Option<(NaiveDate, NaiveDate)> {
    let mut range: Option<(NaiveDate, NaiveDate)> = None;
    for message in staged {
        if let Some(date) = message.message_date.map(|d| d.date()) {
            range = Some(match range {
                Some((min, max)) => (min.min(date), max.max(date)),
                None => (date, date),
            });
        }
    }
    range
}

fn season_name(month: u32) -> &'static str {
    match month {
        12 | 1 | 2 => "Winter",
        3..=5 => "Spring",
        6..=8 => "Summer",
        _ => "Autumn",
    }
}

/// Build the date dimension for `[min_date, max_date]`, inclusive.
///
/// Produces exactly one row per calendar day with no gaps. All attributes
/// are pure functions of the date; widening the range later only adds
/// boundary rows and never alters existing keys.
#[must_use]
pub fn build_date_dimension(min_date: NaiveDate, max_date: NaiveDate) -> Vec<DateDimension> {
    let mut rows = Vec::new();
    let mut current = min_date;
    while current <= max_date {
        let month = current.month();
        let year = current.year();
        let weekday = current.weekday();
        let is_weekend = matches!(weekday, chrono::Weekday::Sat | chrono::Weekday::Sun);
        rows.push(DateDimension {
            date_key: date_key(current),
            full_date: current,
            day_of_week: weekday.number_from_monday(),
            day_name: format!("{weekday}"),
            week_of_year: current.iso_week().week(),
            month,
            month_name: current.format("%B").to_string(),
            quarter: (month - 1) / 3 + 1,
            year,
            is_weekend,
            is_business_day: !is_weekend,
            // Fiscal year rolls over on April 1.
            fiscal_year: if month >= 4 { year } else { year - 1 },
            season: season_name(month).to_string(),
            // Known approximation carried over from the source system; the
            // real conversion also depends on the day within September.
            ethiopian_year: year - 8,
        });
        current = match current.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    rows
}
