//! Data models for the warehouse star schema
//!
//! This module contains all row types used throughout the pipeline: the raw
//! ingestion layer, the staged view, the dimension and fact tables, and the
//! enumerated classification labels they carry.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Sentinel stored in place of blank message text.
pub const NO_TEXT_SENTINEL: &str = "No text content";

/// Compute a deterministic surrogate key from natural key parts.
///
/// The key is the hex-encoded SHA-256 of the parts joined with `|`, so it is
/// stable across runs as long as the natural key fields do not change.
#[must_use]
pub fn surrogate_key(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(b"|");
        }
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// A raw Telegram message as ingested from scraper exports
///
/// Append-only source of truth. Fields other than the natural key may be
/// missing or malformed; the staging transform filters and normalizes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    /// Database primary key
    pub id: i64,
    /// Telegram message identifier (natural key, with channel name)
    pub message_id: Option<i64>,
    /// Channel the message was posted to (natural key, with message id)
    pub channel_name: Option<String>,
    /// Human-readable channel title
    pub channel_title: Option<String>,
    /// Timestamp the message was posted
    pub message_date: Option<NaiveDateTime>,
    /// Free-form message text
    pub message_text: Option<String>,
    /// True if the message carried media
    pub has_media: Option<bool>,
    /// Path to the downloaded media file, if any
    pub image_path: Option<String>,
    /// View count reported by Telegram
    pub views: Option<i64>,
    /// Forward count reported by Telegram
    pub forwards: Option<i64>,
    /// Timestamp the row was ingested
    pub extracted_at: NaiveDateTime,
    /// Original scraper payload as JSON text
    pub raw_data: Option<String>,
}

/// A scraped message as it appears in the scraper JSON exports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedMessage {
    /// Telegram message identifier
    #[serde(default)]
    pub message_id: Option<i64>,
    /// Channel the message was posted to
    #[serde(default)]
    pub channel_name: Option<String>,
    /// Human-readable channel title
    #[serde(default)]
    pub channel_title: Option<String>,
    /// ISO-8601 timestamp the message was posted
    #[serde(default)]
    pub message_date: Option<String>,
    /// Free-form message text
    #[serde(default)]
    pub message_text: Option<String>,
    /// True if the message carried media
    #[serde(default)]
    pub has_media: Option<bool>,
    /// Path to the downloaded media file
    #[serde(default)]
    pub image_path: Option<String>,
    /// View count reported by Telegram
    #[serde(default)]
    pub views: Option<i64>,
    /// Forward count reported by Telegram
    #[serde(default)]
    pub forwards: Option<i64>,
    /// ISO-8601 timestamp the scraper extracted the message
    #[serde(default)]
    pub extracted_at: Option<String>,
}

/// Data for inserting a raw message row
#[derive(Debug, Clone)]
pub struct NewRawMessage {
    /// Telegram message identifier
    pub message_id: Option<i64>,
    /// Channel the message was posted to
    pub channel_name: Option<String>,
    /// Human-readable channel title
    pub channel_title: Option<String>,
    /// Timestamp the message was posted
    pub message_date: Option<NaiveDateTime>,
    /// Free-form message text
    pub message_text: Option<String>,
    /// True if the message carried media
    pub has_media: Option<bool>,
    /// Path to the downloaded media file
    pub image_path: Option<String>,
    /// View count reported by Telegram
    pub views: Option<i64>,
    /// Forward count reported by Telegram
    pub forwards: Option<i64>,
    /// Timestamp the row was ingested (defaults to now)
    pub extracted_at: Option<NaiveDateTime>,
    /// Original scraper payload as JSON text
    pub raw_data: Option<String>,
}

/// Length bucket for message text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageLengthCategory {
    /// No text (length 0)
    Empty,
    /// Up to 100 characters
    Short,
    /// 101 to 1000 characters
    Medium,
    /// More than 1000 characters
    Long,
}

impl MessageLengthCategory {
    /// Classify a text length into its bucket
    #[must_use]
    pub const fn from_length(length: i64) -> Self {
        if length == 0 {
            Self::Empty
        } else if length <= 100 {
            Self::Short
        } else if length <= 1000 {
            Self::Medium
        } else {
            Self::Long
        }
    }

    /// Label stored in the warehouse
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Empty => "Empty",
            Self::Short => "Short",
            Self::Medium => "Medium",
            Self::Long => "Long",
        }
    }
}

/// A cleaned, validated message derived from a raw row
///
/// Never materialized: recomputed from the raw layer on every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedMessage {
    /// Telegram message identifier
    pub message_id: i64,
    /// Channel the message was posted to (non-blank)
    pub channel_name: String,
    /// Human-readable channel title
    pub channel_title: Option<String>,
    /// Timestamp the message was posted, if present on the raw row
    pub message_date: Option<NaiveDateTime>,
    /// Message text, with blank text replaced by a sentinel
    pub message_text: String,
    /// Character count of the original (trimmed) text
    pub message_length: i64,
    /// Length bucket
    pub length_category: MessageLengthCategory,
    /// True if the message carried media
    pub has_media: bool,
    /// View count, clamped to be non-negative
    pub views: i64,
    /// Forward count, clamped to be non-negative
    pub forwards: i64,
    /// Weighted engagement: views * 1.0 + forwards * 5.0
    pub engagement_score: f64,
}

/// Channel business category, evaluated first-match-wins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelCategory {
    /// Pharma-related channel names
    Pharmaceutical,
    /// Cosmetics and beauty channels
    Cosmetics,
    /// Health and care channels
    Healthcare,
    /// Fallback for everything else
    GeneralMedical,
}

impl ChannelCategory {
    /// All valid categories, used by the quality-check whitelist
    pub const ALL: [Self; 4] = [
        Self::Pharmaceutical,
        Self::Cosmetics,
        Self::Healthcare,
        Self::GeneralMedical,
    ];

    /// Label stored in the warehouse
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pharmaceutical => "Pharmaceutical",
            Self::Cosmetics => "Cosmetics",
            Self::Healthcare => "Healthcare",
            Self::GeneralMedical => "General Medical",
        }
    }

    /// Parse a stored label back into a category
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }
}

/// Channel posting-volume tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityLevel {
    /// More than 1000 posts
    High,
    /// More than 100 posts
    Medium,
    /// Everything else
    Low,
}

impl ActivityLevel {
    /// Classify a post count into its tier
    #[must_use]
    pub const fn from_post_count(posts: i64) -> Self {
        if posts > 1000 {
            Self::High
        } else if posts > 100 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Label stored in the warehouse
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::High => "High Activity",
            Self::Medium => "Medium Activity",
            Self::Low => "Low Activity",
        }
    }
}

/// One row per distinct channel observed in staging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelDimension {
    /// Deterministic surrogate key (hash of name + title)
    pub channel_key: String,
    /// Channel name (natural key)
    pub channel_name: String,
    /// Channel title (maximum of observed titles)
    pub channel_title: String,
    /// Business category
    pub channel_type: ChannelCategory,
    /// Timestamp of the earliest observed post
    pub first_post_at: Option<NaiveDateTime>,
    /// Timestamp of the latest observed post
    pub last_post_at: Option<NaiveDateTime>,
    /// Total staged posts for this channel
    pub total_posts: i64,
    /// Posts carrying media
    pub posts_with_media: i64,
    /// Percentage of posts carrying media (0-100)
    pub media_percentage: f64,
    /// Mean view count
    pub avg_views: f64,
    /// Mean forward count
    pub avg_forwards: f64,
    /// Mean engagement score
    pub avg_engagement: f64,
    /// Posting-volume tier
    pub activity_level: ActivityLevel,
}

/// One row per calendar day in the observed message date range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateDimension {
    /// Integer key in YYYYMMDD form, a pure function of the date
    pub date_key: i32,
    /// The calendar date
    pub full_date: NaiveDate,
    /// ISO day-of-week number (Monday = 1)
    pub day_of_week: u32,
    /// English day name
    pub day_name: String,
    /// ISO week number
    pub week_of_year: u32,
    /// Month number (1-12)
    pub month: u32,
    /// English month name
    pub month_name: String,
    /// Quarter number (1-4)
    pub quarter: u32,
    /// Calendar year
    pub year: i32,
    /// True for Saturday and Sunday
    pub is_weekend: bool,
    /// True for non-weekend days
    pub is_business_day: bool,
    /// Fiscal year; rolls over on April 1
    pub fiscal_year: i32,
    /// Meteorological season name
    pub season: String,
    /// Approximate Ethiopian calendar year (year - 8)
    pub ethiopian_year: i32,
}

/// Time-of-day bucket for a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostingTimeCategory {
    /// 09:00-17:59
    BusinessHours,
    /// 18:00-22:59
    Evening,
    /// 23:00-05:59
    LateNight,
    /// 06:00-08:59
    Morning,
}

impl PostingTimeCategory {
    /// Classify an hour of day (0-23) into its bucket
    #[must_use]
    pub const fn from_hour(hour: u32) -> Self {
        if hour >= 9 && hour <= 17 {
            Self::BusinessHours
        } else if hour >= 18 && hour <= 22 {
            Self::Evening
        } else if hour == 23 || hour <= 5 {
            Self::LateNight
        } else {
            Self::Morning
        }
    }

    /// Label stored in the warehouse
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::BusinessHours => "Business Hours",
            Self::Evening => "Evening",
            Self::LateNight => "Late Night",
            Self::Morning => "Morning",
        }
    }
}

/// View-count popularity tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PopularityLevel {
    /// More than 1000 views
    Viral,
    /// More than 100 views
    Popular,
    /// Everything else
    Regular,
}

impl PopularityLevel {
    /// Classify a view count into its tier
    #[must_use]
    pub const fn from_views(views: i64) -> Self {
        if views > 1000 {
            Self::Viral
        } else if views > 100 {
            Self::Popular
        } else {
            Self::Regular
        }
    }

    /// Label stored in the warehouse
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Viral => "Viral",
            Self::Popular => "Popular",
            Self::Regular => "Regular",
        }
    }
}

/// One row per message with resolvable channel and date keys
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageFact {
    /// Deterministic surrogate key (hash of message id + channel name)
    pub message_key: String,
    /// Telegram message identifier
    pub message_id: i64,
    /// Channel name (natural join key for detections)
    pub channel_name: String,
    /// Foreign key into the channel dimension
    pub channel_key: String,
    /// Foreign key into the date dimension
    pub date_key: i32,
    /// Timestamp the message was posted
    pub message_date: NaiveDateTime,
    /// Message text (sentinel when blank)
    pub message_text: String,
    /// Character count of the original text
    pub message_length: i64,
    /// Length bucket
    pub length_category: MessageLengthCategory,
    /// True if the message carried media
    pub has_media: bool,
    /// View count
    pub views: i64,
    /// Forward count
    pub forwards: i64,
    /// Weighted engagement score
    pub engagement_score: f64,
    /// Views divided by forwards, absent when there are no forwards
    pub views_per_forward: Option<f64>,
    /// Time-of-day bucket
    pub posting_time_category: PostingTimeCategory,
    /// Popularity tier
    pub popularity_level: PopularityLevel,
    /// Timestamp the fact row was written
    pub loaded_at: NaiveDateTime,
}

/// An object-detection result produced by the external vision pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Telegram message identifier the image belongs to
    pub message_id: Option<i64>,
    /// Channel the image belongs to
    pub channel_name: Option<String>,
    /// Path of the analyzed image
    pub image_path: String,
    /// Number of detected objects
    pub detection_count: i64,
    /// Category label assigned by the classifier
    pub image_category: Option<String>,
    /// Mean detection confidence (0-1)
    pub confidence_score: f64,
    /// Comma-delimited business tags
    pub business_tags: String,
    /// Comma-delimited top detected objects
    pub top_objects: String,
    /// Timestamp the image was processed
    pub processed_at: Option<NaiveDateTime>,
    /// Error reported by the detector, if any
    pub error: Option<String>,
}

/// Effectiveness tier derived from the weighted score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformanceCategory {
    /// Score >= 0.75
    Excellent,
    /// Score >= 0.5
    Good,
    /// Score >= 0.25
    Fair,
    /// Everything else
    Poor,
}

impl PerformanceCategory {
    /// Classify an effectiveness score into its tier
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 0.75 {
            Self::Excellent
        } else if score >= 0.5 {
            Self::Good
        } else if score >= 0.25 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    /// Label stored in the warehouse
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
        }
    }
}

/// One row per detection result resolvable to a message fact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageDetectionFact {
    /// Deterministic surrogate key (hash of message id + channel + path)
    pub detection_key: String,
    /// Telegram message identifier
    pub message_id: i64,
    /// Channel name
    pub channel_name: String,
    /// Foreign key into the channel dimension
    pub channel_key: String,
    /// Foreign key into the date dimension
    pub date_key: i32,
    /// Path of the analyzed image
    pub image_path: String,
    /// Number of detected objects
    pub detection_count: i64,
    /// Category label assigned by the classifier
    pub image_category: String,
    /// Mean detection confidence (0-1)
    pub confidence_score: f64,
    /// Comma-delimited business tags
    pub business_tags: String,
    /// Comma-delimited top detected objects
    pub top_objects: String,
    /// Tag list mentions "promotional"
    pub is_promotional: bool,
    /// Tag list mentions "product_display"
    pub is_product_display: bool,
    /// Tag list mentions "lifestyle"
    pub is_lifestyle: bool,
    /// Tag list mentions "high_confidence"
    pub is_high_confidence: bool,
    /// Weighted 0-1 effectiveness score
    pub effectiveness_score: f64,
    /// Tier derived from the effectiveness score
    pub performance_category: PerformanceCategory,
    /// Business recommendation, chosen first-match-wins
    pub recommendation: String,
    /// Timestamp the fact row was written
    pub loaded_at: NaiveDateTime,
}
