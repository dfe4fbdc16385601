//! Database schema definitions
//!
//! This module provides constants for table and column names used with
//! rusqlite. Tables mirror the star-schema layers: one raw layer, two
//! dimensions, two facts, and the run registry used for writer exclusion.

/// Raw Telegram messages table schema
pub mod raw_messages {
    /// Table name
    pub const TABLE: &str = "raw_telegram_messages";
    /// Primary key column
    pub const ID: &str = "id";
    /// Telegram message identifier column
    pub const MESSAGE_ID: &str = "message_id";
    /// Channel name column
    pub const CHANNEL_NAME: &str = "channel_name";
    /// Channel title column
    pub const CHANNEL_TITLE: &str = "channel_title";
    /// Message timestamp column
    pub const MESSAGE_DATE: &str = "message_date";
    /// Message text column
    pub const MESSAGE_TEXT: &str = "message_text";
    /// Media flag column
    pub const HAS_MEDIA: &str = "has_media";
    /// Media file path column
    pub const IMAGE_PATH: &str = "image_path";
    /// View count column
    pub const VIEWS: &str = "views";
    /// Forward count column
    pub const FORWARDS: &str = "forwards";
    /// Ingestion timestamp column
    pub const EXTRACTED_AT: &str = "extracted_at";
    /// Original payload column (JSON text)
    pub const RAW_DATA: &str = "raw_data";
}

/// Channel dimension table schema
pub mod dim_channels {
    /// Table name
    pub const TABLE: &str = "dim_channels";
    /// Surrogate key column
    pub const CHANNEL_KEY: &str = "channel_key";
    /// Channel name column
    pub const CHANNEL_NAME: &str = "channel_name";
    /// Channel title column
    pub const CHANNEL_TITLE: &str = "channel_title";
    /// Business category column
    pub const CHANNEL_TYPE: &str = "channel_type";
    /// First post timestamp column
    pub const FIRST_POST_AT: &str = "first_post_at";
    /// Last post timestamp column
    pub const LAST_POST_AT: &str = "last_post_at";
    /// Total post count column
    pub const TOTAL_POSTS: &str = "total_posts";
    /// Posts-with-media count column
    pub const POSTS_WITH_MEDIA: &str = "posts_with_media";
    /// Media percentage column
    pub const MEDIA_PERCENTAGE: &str = "media_percentage";
    /// Average views column
    pub const AVG_VIEWS: &str = "avg_views";
    /// Average forwards column
    pub const AVG_FORWARDS: &str = "avg_forwards";
    /// Average engagement column
    pub const AVG_ENGAGEMENT: &str = "avg_engagement";
    /// Activity tier column
    pub const ACTIVITY_LEVEL: &str = "activity_level";
}

/// Date dimension table schema
pub mod dim_dates {
    /// Table name
    pub const TABLE: &str = "dim_dates";
    /// Integer date key column (YYYYMMDD)
    pub const DATE_KEY: &str = "date_key";
    /// Calendar date column
    pub const FULL_DATE: &str = "full_date";
    /// ISO day-of-week column
    pub const DAY_OF_WEEK: &str = "day_of_week";
    /// Day name column
    pub const DAY_NAME: &str = "day_name";
    /// ISO week number column
    pub const WEEK_OF_YEAR: &str = "week_of_year";
    /// Month number column
    pub const MONTH: &str = "month";
    /// Month name column
    pub const MONTH_NAME: &str = "month_name";
    /// Quarter number column
    pub const QUARTER: &str = "quarter";
    /// Calendar year column
    pub const YEAR: &str = "year";
    /// Weekend flag column
    pub const IS_WEEKEND: &str = "is_weekend";
    /// Business day flag column
    pub const IS_BUSINESS_DAY: &str = "is_business_day";
    /// Fiscal year column
    pub const FISCAL_YEAR: &str = "fiscal_year";
    /// Season name column
    pub const SEASON: &str = "season";
    /// Ethiopian calendar year approximation column
    pub const ETHIOPIAN_YEAR: &str = "ethiopian_year";
}

/// Message fact table schema
pub mod fct_messages {
    /// Table name
    pub const TABLE: &str = "fct_messages";
    /// Surrogate key column
    pub const MESSAGE_KEY: &str = "message_key";
    /// Telegram message identifier column
    pub const MESSAGE_ID: &str = "message_id";
    /// Channel name column
    pub const CHANNEL_NAME: &str = "channel_name";
    /// Channel dimension foreign key column
    pub const CHANNEL_KEY: &str = "channel_key";
    /// Date dimension foreign key column
    pub const DATE_KEY: &str = "date_key";
    /// Message timestamp column
    pub const MESSAGE_DATE: &str = "message_date";
    /// Message text column
    pub const MESSAGE_TEXT: &str = "message_text";
    /// Text length column
    pub const MESSAGE_LENGTH: &str = "message_length";
    /// Length bucket column
    pub const LENGTH_CATEGORY: &str = "length_category";
    /// Media flag column
    pub const HAS_MEDIA: &str = "has_media";
    /// View count column
    pub const VIEWS: &str = "views";
    /// Forward count column
    pub const FORWARDS: &str = "forwards";
    /// Engagement score column
    pub const ENGAGEMENT_SCORE: &str = "engagement_score";
    /// Views-per-forward column
    pub const VIEWS_PER_FORWARD: &str = "views_per_forward";
    /// Time-of-day bucket column
    pub const POSTING_TIME_CATEGORY: &str = "posting_time_category";
    /// Popularity tier column
    pub const POPULARITY_LEVEL: &str = "popularity_level";
    /// Load timestamp column
    pub const LOADED_AT: &str = "loaded_at";
}

/// Image detection fact table schema
pub mod fct_image_detections {
    /// Table name
    pub const TABLE: &str = "fct_image_detections";
    /// Surrogate key column
    pub const DETECTION_KEY: &str = "detection_key";
    /// Telegram message identifier column
    pub const MESSAGE_ID: &str = "message_id";
    /// Channel name column
    pub const CHANNEL_NAME: &str = "channel_name";
    /// Channel dimension foreign key column
    pub const CHANNEL_KEY: &str = "channel_key";
    /// Date dimension foreign key column
    pub const DATE_KEY: &str = "date_key";
    /// Image path column
    pub const IMAGE_PATH: &str = "image_path";
    /// Detected object count column
    pub const DETECTION_COUNT: &str = "detection_count";
    /// Classifier category column
    pub const IMAGE_CATEGORY: &str = "image_category";
    /// Confidence score column
    pub const CONFIDENCE_SCORE: &str = "confidence_score";
    /// Tag list column
    pub const BUSINESS_TAGS: &str = "business_tags";
    /// Top objects column
    pub const TOP_OBJECTS: &str = "top_objects";
    /// Promotional flag column
    pub const IS_PROMOTIONAL: &str = "is_promotional";
    /// Product-display flag column
    pub const IS_PRODUCT_DISPLAY: &str = "is_product_display";
    /// Lifestyle flag column
    pub const IS_LIFESTYLE: &str = "is_lifestyle";
    /// High-confidence flag column
    pub const IS_HIGH_CONFIDENCE: &str = "is_high_confidence";
    /// Effectiveness score column
    pub const EFFECTIVENESS_SCORE: &str = "effectiveness_score";
    /// Performance tier column
    pub const PERFORMANCE_CATEGORY: &str = "performance_category";
    /// Recommendation column
    pub const RECOMMENDATION: &str = "recommendation";
    /// Load timestamp column
    pub const LOADED_AT: &str = "loaded_at";
}

/// Detection staging table schema (collaborator input, loaded from CSV)
pub mod raw_detections {
    /// Table name
    pub const TABLE: &str = "raw_image_detections";
    /// Primary key column
    pub const ID: &str = "id";
    /// Telegram message identifier column
    pub const MESSAGE_ID: &str = "message_id";
    /// Channel name column
    pub const CHANNEL_NAME: &str = "channel_name";
    /// Image path column
    pub const IMAGE_PATH: &str = "image_path";
    /// Detected object count column
    pub const DETECTION_COUNT: &str = "detection_count";
    /// Classifier category column
    pub const IMAGE_CATEGORY: &str = "image_category";
    /// Confidence score column
    pub const CONFIDENCE_SCORE: &str = "confidence_score";
    /// Tag list column
    pub const BUSINESS_TAGS: &str = "business_tags";
    /// Top objects column
    pub const TOP_OBJECTS: &str = "top_objects";
    /// Processing timestamp column
    pub const PROCESSED_AT: &str = "processed_at";
    /// Detector error column
    pub const ERROR: &str = "error";
}

/// Pipeline run registry schema (writer exclusion and audit trail)
pub mod pipeline_runs {
    /// Table name
    pub const TABLE: &str = "pipeline_runs";
    /// Primary key column
    pub const ID: &str = "id";
    /// Run start timestamp column
    pub const STARTED_AT: &str = "started_at";
    /// Run finish timestamp column
    pub const FINISHED_AT: &str = "finished_at";
    /// Run status column ("running", "succeeded", "failed")
    pub const STATUS: &str = "status";
}
