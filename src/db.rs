//! Warehouse database access
//!
//! Connection pooling, embedded migrations, and the readers/writers for each
//! warehouse table. The one piece of genuinely stateful logic lives here:
//! the delete-then-insert upsert on `fct_messages`, which runs inside a
//! single immediate transaction so readers never observe a partially
//! replaced row set, and the run-registry lock that keeps writers exclusive.

use std::fs;
use std::path::Path;

use chrono::{NaiveDateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::{debug, info};

use crate::error::{Result, WarehouseError};
use crate::models::{
    ActivityLevel, ChannelCategory, ChannelDimension, DateDimension, DetectionResult,
    ImageDetectionFact, MessageFact, MessageLengthCategory, NewRawMessage, PerformanceCategory,
    PopularityLevel, PostingTimeCategory, RawMessage,
};
use crate::schema::{
    dim_channels, dim_dates, fct_image_detections, fct_messages, pipeline_runs, raw_detections,
    raw_messages,
};

/// Type alias for the database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;
/// Type alias for a pooled connection
pub type DbConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Identifier of a registered pipeline run, returned by the lock
#[derive(Debug, Clone, Copy)]
pub struct RunHandle(i64);

/// Summary counts over the warehouse tables
#[derive(Debug, Clone)]
pub struct WarehouseStats {
    /// Rows in the raw message layer
    pub raw_messages: i64,
    /// Rows in the raw detection layer
    pub raw_detections: i64,
    /// Rows in the channel dimension
    pub channels: i64,
    /// Rows in the date dimension
    pub dates: i64,
    /// Rows in the message fact table
    pub message_facts: i64,
    /// Rows in the image detection fact table
    pub detection_facts: i64,
}

/// Warehouse database manager
pub struct Warehouse {
    pool: DbPool,
}

impl Warehouse {
    /// Create a new warehouse connection pool and run migrations.
    ///
    /// Accepts either a bare path or a `sqlite:` prefixed URL.
    pub fn new(database_url: &str) -> Result<Self> {
        let path = database_url.strip_prefix("sqlite:").unwrap_or(database_url);

        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder().build(manager)?;

        let conn = pool.get()?;
        Self::run_migrations(&conn)?;

        Ok(Self { pool })
    }

    /// Run embedded database migrations
    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute_batch(include_str!(
            "../migrations/2026-08-01-000000_create_raw_tables/up.sql"
        ))?;
        conn.execute_batch(include_str!(
            "../migrations/2026-08-01-000001_create_mart_tables/up.sql"
        ))?;
        conn.execute_batch(include_str!(
            "../migrations/2026-08-01-000002_create_pipeline_runs/up.sql"
        ))?;
        Ok(())
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> Result<DbConnection> {
        Ok(self.pool.get()?)
    }

    /// Verify the database is reachable. Run once at pipeline startup.
    pub fn connectivity_check(&self) -> Result<()> {
        let conn = self.get_connection()?;
        let one: i64 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
        if one == 1 {
            debug!("Connectivity check passed");
            Ok(())
        } else {
            Err(WarehouseError::Other("Connectivity check failed".to_string()))
        }
    }

    // ---- raw layer ----

    /// Insert a raw message, ignoring conflicts on the natural key.
    ///
    /// Returns true if a row was inserted, false if an identical natural key
    /// already existed (idempotent re-load).
    pub fn insert_raw_message(&self, new_message: &NewRawMessage) -> Result<bool> {
        let conn = self.get_connection()?;
        let extracted_at = new_message
            .extracted_at
            .unwrap_or_else(|| Utc::now().naive_utc());

        let inserted = conn.execute(
            &format!(
                "INSERT INTO {} ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT({}, {}) DO NOTHING",
                raw_messages::TABLE,
                raw_messages::MESSAGE_ID,
                raw_messages::CHANNEL_NAME,
                raw_messages::CHANNEL_TITLE,
                raw_messages::MESSAGE_DATE,
                raw_messages::MESSAGE_TEXT,
                raw_messages::HAS_MEDIA,
                raw_messages::IMAGE_PATH,
                raw_messages::VIEWS,
                raw_messages::FORWARDS,
                raw_messages::EXTRACTED_AT,
                raw_messages::RAW_DATA,
                raw_messages::MESSAGE_ID,
                raw_messages::CHANNEL_NAME,
            ),
            params![
                new_message.message_id,
                new_message.channel_name,
                new_message.channel_title,
                new_message.message_date,
                new_message.message_text,
                new_message.has_media,
                new_message.image_path,
                new_message.views,
                new_message.forwards,
                extracted_at,
                new_message.raw_data,
            ],
        )?;

        Ok(inserted > 0)
    }

    /// Fetch the full raw message snapshot, ordered by ingestion id
    pub fn fetch_raw_messages(&self) -> Result<Vec<RawMessage>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} ORDER BY {} ASC",
            raw_messages::TABLE,
            raw_messages::ID
        ))?;
        let rows = stmt.query_map([], Self::map_raw_message)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    fn map_raw_message(row: &Row) -> rusqlite::Result<RawMessage> {
        Ok(RawMessage {
            id: row.get(raw_messages::ID)?,
            message_id: row.get(raw_messages::MESSAGE_ID)?,
            channel_name: row.get(raw_messages::CHANNEL_NAME)?,
            channel_title: row.get(raw_messages::CHANNEL_TITLE)?,
            message_date: row.get(raw_messages::MESSAGE_DATE)?,
            message_text: row.get(raw_messages::MESSAGE_TEXT)?,
            has_media: row.get(raw_messages::HAS_MEDIA)?,
            image_path: row.get(raw_messages::IMAGE_PATH)?,
            views: row.get(raw_messages::VIEWS)?,
            forwards: row.get(raw_messages::FORWARDS)?,
            extracted_at: row.get(raw_messages::EXTRACTED_AT)?,
            raw_data: row.get(raw_messages::RAW_DATA)?,
        })
    }

    /// Insert a detection result, ignoring conflicts on the natural key
    pub fn insert_detection_result(&self, detection: &DetectionResult) -> Result<bool> {
        let conn = self.get_connection()?;
        let inserted = conn.execute(
            &format!(
                "INSERT INTO {} ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT({}, {}, {}) DO NOTHING",
                raw_detections::TABLE,
                raw_detections::MESSAGE_ID,
                raw_detections::CHANNEL_NAME,
                raw_detections::IMAGE_PATH,
                raw_detections::DETECTION_COUNT,
                raw_detections::IMAGE_CATEGORY,
                raw_detections::CONFIDENCE_SCORE,
                raw_detections::BUSINESS_TAGS,
                raw_detections::TOP_OBJECTS,
                raw_detections::PROCESSED_AT,
                raw_detections::ERROR,
                raw_detections::MESSAGE_ID,
                raw_detections::CHANNEL_NAME,
                raw_detections::IMAGE_PATH,
            ),
            params![
                detection.message_id,
                detection.channel_name,
                detection.image_path,
                detection.detection_count,
                detection.image_category,
                detection.confidence_score,
                detection.business_tags,
                detection.top_objects,
                detection.processed_at,
                detection.error,
            ],
        )?;
        Ok(inserted > 0)
    }

    /// Fetch all stored detection results
    pub fn fetch_detection_results(&self) -> Result<Vec<DetectionResult>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} ORDER BY {} ASC",
            raw_detections::TABLE,
            raw_detections::ID
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok(DetectionResult {
                message_id: row.get(raw_detections::MESSAGE_ID)?,
                channel_name: row.get(raw_detections::CHANNEL_NAME)?,
                image_path: row.get(raw_detections::IMAGE_PATH)?,
                detection_count: row.get(raw_detections::DETECTION_COUNT)?,
                image_category: row.get(raw_detections::IMAGE_CATEGORY)?,
                confidence_score: row.get(raw_detections::CONFIDENCE_SCORE)?,
                business_tags: row.get(raw_detections::BUSINESS_TAGS)?,
                top_objects: row.get(raw_detections::TOP_OBJECTS)?,
                processed_at: row.get(raw_detections::PROCESSED_AT)?,
                error: row.get(raw_detections::ERROR)?,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    // ---- dimensions ----

    /// Replace the channel dimension wholesale.
    ///
    /// The dimension is fully recomputable from staging; surrogate keys are
    /// content hashes, so replacement does not invalidate fact references.
    pub fn replace_channel_dimensions(&self, channels: &[ChannelDimension]) -> Result<()> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(&format!("DELETE FROM {}", dim_channels::TABLE), [])?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                dim_channels::TABLE,
                dim_channels::CHANNEL_KEY,
                dim_channels::CHANNEL_NAME,
                dim_channels::CHANNEL_TITLE,
                dim_channels::CHANNEL_TYPE,
                dim_channels::FIRST_POST_AT,
                dim_channels::LAST_POST_AT,
                dim_channels::TOTAL_POSTS,
                dim_channels::POSTS_WITH_MEDIA,
                dim_channels::MEDIA_PERCENTAGE,
                dim_channels::AVG_VIEWS,
                dim_channels::AVG_FORWARDS,
                dim_channels::AVG_ENGAGEMENT,
                dim_channels::ACTIVITY_LEVEL,
            ))?;
            for channel in channels {
                stmt.execute(params![
                    channel.channel_key,
                    channel.channel_name,
                    channel.channel_title,
                    channel.channel_type.label(),
                    channel.first_post_at,
                    channel.last_post_at,
                    channel.total_posts,
                    channel.posts_with_media,
                    channel.media_percentage,
                    channel.avg_views,
                    channel.avg_forwards,
                    channel.avg_engagement,
                    channel.activity_level.label(),
                ])?;
            }
        }
        tx.commit()?;

        info!(rows = channels.len(), "Rebuilt channel dimension");
        Ok(())
    }

    /// Fetch the channel dimension, ordered by name
    pub fn fetch_channel_dimensions(&self) -> Result<Vec<ChannelDimension>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} ORDER BY {} ASC",
            dim_channels::TABLE,
            dim_channels::CHANNEL_NAME
        ))?;
        let rows = stmt.query_map([], |row| {
            let type_label: String = row.get(dim_channels::CHANNEL_TYPE)?;
            let activity_label: String = row.get(dim_channels::ACTIVITY_LEVEL)?;
            Ok(ChannelDimension {
                channel_key: row.get(dim_channels::CHANNEL_KEY)?,
                channel_name: row.get(dim_channels::CHANNEL_NAME)?,
                channel_title: row.get(dim_channels::CHANNEL_TITLE)?,
                channel_type: ChannelCategory::from_label(&type_label)
                    .unwrap_or(ChannelCategory::GeneralMedical),
                first_post_at: row.get(dim_channels::FIRST_POST_AT)?,
                last_post_at: row.get(dim_channels::LAST_POST_AT)?,
                total_posts: row.get(dim_channels::TOTAL_POSTS)?,
                posts_with_media: row.get(dim_channels::POSTS_WITH_MEDIA)?,
                media_percentage: row.get(dim_channels::MEDIA_PERCENTAGE)?,
                avg_views: row.get(dim_channels::AVG_VIEWS)?,
                avg_forwards: row.get(dim_channels::AVG_FORWARDS)?,
                avg_engagement: row.get(dim_channels::AVG_ENGAGEMENT)?,
                activity_level: match activity_label.as_str() {
                    "High Activity" => ActivityLevel::High,
                    "Medium Activity" => ActivityLevel::Medium,
                    _ => ActivityLevel::Low,
                },
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Fetch stored channel type labels (used by the quality suite, which
    /// must see the raw stored text rather than the parsed enum)
    pub fn fetch_channel_type_labels(&self) -> Result<Vec<(String, String)>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {}, {} FROM {}",
            dim_channels::CHANNEL_NAME,
            dim_channels::CHANNEL_TYPE,
            dim_channels::TABLE
        ))?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Extend the date dimension; existing date keys are left untouched.
    pub fn extend_date_dimensions(&self, dates: &[DateDimension]) -> Result<()> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT({}) DO NOTHING",
                dim_dates::TABLE,
                dim_dates::DATE_KEY,
                dim_dates::FULL_DATE,
                dim_dates::DAY_OF_WEEK,
                dim_dates::DAY_NAME,
                dim_dates::WEEK_OF_YEAR,
                dim_dates::MONTH,
                dim_dates::MONTH_NAME,
                dim_dates::QUARTER,
                dim_dates::YEAR,
                dim_dates::IS_WEEKEND,
                dim_dates::IS_BUSINESS_DAY,
                dim_dates::FISCAL_YEAR,
                dim_dates::SEASON,
                dim_dates::ETHIOPIAN_YEAR,
                dim_dates::DATE_KEY,
            ))?;
            for date in dates {
                stmt.execute(params![
                    date.date_key,
                    date.full_date,
                    date.day_of_week,
                    date.day_name,
                    date.week_of_year,
                    date.month,
                    date.month_name,
                    date.quarter,
                    date.year,
                    date.is_weekend,
                    date.is_business_day,
                    date.fiscal_year,
                    date.season,
                    date.ethiopian_year,
                ])?;
            }
        }
        tx.commit()?;

        info!(rows = dates.len(), "Extended date dimension");
        Ok(())
    }

    /// Fetch the date dimension, ordered by key
    pub fn fetch_date_dimensions(&self) -> Result<Vec<DateDimension>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} ORDER BY {} ASC",
            dim_dates::TABLE,
            dim_dates::DATE_KEY
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok(DateDimension {
                date_key: row.get(dim_dates::DATE_KEY)?,
                full_date: row.get(dim_dates::FULL_DATE)?,
                day_of_week: row.get(dim_dates::DAY_OF_WEEK)?,
                day_name: row.get(dim_dates::DAY_NAME)?,
                week_of_year: row.get(dim_dates::WEEK_OF_YEAR)?,
                month: row.get(dim_dates::MONTH)?,
                month_name: row.get(dim_dates::MONTH_NAME)?,
                quarter: row.get(dim_dates::QUARTER)?,
                year: row.get(dim_dates::YEAR)?,
                is_weekend: row.get(dim_dates::IS_WEEKEND)?,
                is_business_day: row.get(dim_dates::IS_BUSINESS_DAY)?,
                fiscal_year: row.get(dim_dates::FISCAL_YEAR)?,
                season: row.get(dim_dates::SEASON)?,
                ethiopian_year: row.get(dim_dates::ETHIOPIAN_YEAR)?,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    // ---- facts ----

    /// Current incremental high-water mark of the message fact table
    pub fn message_fact_high_water_mark(&self) -> Result<Option<NaiveDateTime>> {
        let conn = self.get_connection()?;
        let mark: Option<NaiveDateTime> = conn
            .query_row(
                &format!(
                    "SELECT MAX({}) FROM {}",
                    fct_messages::MESSAGE_DATE,
                    fct_messages::TABLE
                ),
                [],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(mark)
    }

    /// Upsert message facts: delete rows sharing a candidate's `message_id`,
    /// then insert the replacements, all inside one immediate transaction.
    ///
    /// Returns (deleted, inserted) counts.
    pub fn upsert_message_facts(&self, facts: &[MessageFact]) -> Result<(usize, usize)> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut deleted = 0usize;
        {
            let mut delete_stmt = tx.prepare(&format!(
                "DELETE FROM {} WHERE {} = ?",
                fct_messages::TABLE,
                fct_messages::MESSAGE_ID
            ))?;
            let mut insert_stmt = tx.prepare(&format!(
                "INSERT INTO {} ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                fct_messages::TABLE,
                fct_messages::MESSAGE_KEY,
                fct_messages::MESSAGE_ID,
                fct_messages::CHANNEL_NAME,
                fct_messages::CHANNEL_KEY,
                fct_messages::DATE_KEY,
                fct_messages::MESSAGE_DATE,
                fct_messages::MESSAGE_TEXT,
                fct_messages::MESSAGE_LENGTH,
                fct_messages::LENGTH_CATEGORY,
                fct_messages::HAS_MEDIA,
                fct_messages::VIEWS,
                fct_messages::FORWARDS,
                fct_messages::ENGAGEMENT_SCORE,
                fct_messages::VIEWS_PER_FORWARD,
                fct_messages::POSTING_TIME_CATEGORY,
                fct_messages::POPULARITY_LEVEL,
                fct_messages::LOADED_AT,
            ))?;

            for fact in facts {
                deleted += delete_stmt.execute(params![fact.message_id])?;
                insert_stmt.execute(params![
                    fact.message_key,
                    fact.message_id,
                    fact.channel_name,
                    fact.channel_key,
                    fact.date_key,
                    fact.message_date,
                    fact.message_text,
                    fact.message_length,
                    fact.length_category.label(),
                    fact.has_media,
                    fact.views,
                    fact.forwards,
                    fact.engagement_score,
                    fact.views_per_forward,
                    fact.posting_time_category.label(),
                    fact.popularity_level.label(),
                    fact.loaded_at,
                ])?;
            }
        }
        tx.commit()?;

        info!(inserted = facts.len(), replaced = deleted, "Upserted message facts");
        Ok((deleted, facts.len()))
    }

    /// Fetch the full message fact table, ordered by message date
    pub fn fetch_message_facts(&self) -> Result<Vec<MessageFact>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} ORDER BY {} ASC",
            fct_messages::TABLE,
            fct_messages::MESSAGE_DATE
        ))?;
        let rows = stmt.query_map([], Self::map_message_fact)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    fn map_message_fact(row: &Row) -> rusqlite::Result<MessageFact> {
        let length_label: String = row.get(fct_messages::LENGTH_CATEGORY)?;
        let posting_label: String = row.get(fct_messages::POSTING_TIME_CATEGORY)?;
        let popularity_label: String = row.get(fct_messages::POPULARITY_LEVEL)?;
        let views: i64 = row.get(fct_messages::VIEWS)?;
        let message_length: i64 = row.get(fct_messages::MESSAGE_LENGTH)?;
        Ok(MessageFact {
            message_key: row.get(fct_messages::MESSAGE_KEY)?,
            message_id: row.get(fct_messages::MESSAGE_ID)?,
            channel_name: row.get(fct_messages::CHANNEL_NAME)?,
            channel_key: row.get(fct_messages::CHANNEL_KEY)?,
            date_key: row.get(fct_messages::DATE_KEY)?,
            message_date: row.get(fct_messages::MESSAGE_DATE)?,
            message_text: row.get(fct_messages::MESSAGE_TEXT)?,
            message_length,
            length_category: match length_label.as_str() {
                "Empty" => MessageLengthCategory::Empty,
                "Short" => MessageLengthCategory::Short,
                "Medium" => MessageLengthCategory::Medium,
                _ => MessageLengthCategory::Long,
            },
            has_media: row.get(fct_messages::HAS_MEDIA)?,
            views,
            forwards: row.get(fct_messages::FORWARDS)?,
            engagement_score: row.get(fct_messages::ENGAGEMENT_SCORE)?,
            views_per_forward: row.get(fct_messages::VIEWS_PER_FORWARD)?,
            posting_time_category: match posting_label.as_str() {
                "Business Hours" => PostingTimeCategory::BusinessHours,
                "Evening" => PostingTimeCategory::Evening,
                "Late Night" => PostingTimeCategory::LateNight,
                _ => PostingTimeCategory::Morning,
            },
            popularity_level: match popularity_label.as_str() {
                "Viral" => PopularityLevel::Viral,
                "Popular" => PopularityLevel::Popular,
                _ => PopularityLevel::Regular,
            },
            loaded_at: row.get(fct_messages::LOADED_AT)?,
        })
    }

    /// Replace the image detection fact table wholesale.
    ///
    /// Detection facts are fully recomputable from the raw detection layer
    /// and the message fact table, so this layer is rebuilt each run.
    pub fn replace_image_detection_facts(&self, facts: &[ImageDetectionFact]) -> Result<()> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(&format!("DELETE FROM {}", fct_image_detections::TABLE), [])?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                fct_image_detections::TABLE,
                fct_image_detections::DETECTION_KEY,
                fct_image_detections::MESSAGE_ID,
                fct_image_detections::CHANNEL_NAME,
                fct_image_detections::CHANNEL_KEY,
                fct_image_detections::DATE_KEY,
                fct_image_detections::IMAGE_PATH,
                fct_image_detections::DETECTION_COUNT,
                fct_image_detections::IMAGE_CATEGORY,
                fct_image_detections::CONFIDENCE_SCORE,
                fct_image_detections::BUSINESS_TAGS,
                fct_image_detections::TOP_OBJECTS,
                fct_image_detections::IS_PROMOTIONAL,
                fct_image_detections::IS_PRODUCT_DISPLAY,
                fct_image_detections::IS_LIFESTYLE,
                fct_image_detections::IS_HIGH_CONFIDENCE,
                fct_image_detections::EFFECTIVENESS_SCORE,
                fct_image_detections::PERFORMANCE_CATEGORY,
                fct_image_detections::RECOMMENDATION,
                fct_image_detections::LOADED_AT,
            ))?;
            for fact in facts {
                stmt.execute(params![
                    fact.detection_key,
                    fact.message_id,
                    fact.channel_name,
                    fact.channel_key,
                    fact.date_key,
                    fact.image_path,
                    fact.detection_count,
                    fact.image_category,
                    fact.confidence_score,
                    fact.business_tags,
                    fact.top_objects,
                    fact.is_promotional,
                    fact.is_product_display,
                    fact.is_lifestyle,
                    fact.is_high_confidence,
                    fact.effectiveness_score,
                    fact.performance_category.label(),
                    fact.recommendation,
                    fact.loaded_at,
                ])?;
            }
        }
        tx.commit()?;

        info!(rows = facts.len(), "Rebuilt image detection facts");
        Ok(())
    }

    /// Fetch the image detection fact table
    pub fn fetch_image_detection_facts(&self) -> Result<Vec<ImageDetectionFact>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} ORDER BY {} ASC",
            fct_image_detections::TABLE,
            fct_image_detections::MESSAGE_ID
        ))?;
        let rows = stmt.query_map([], |row| {
            let performance_label: String = row.get(fct_image_detections::PERFORMANCE_CATEGORY)?;
            Ok(ImageDetectionFact {
                detection_key: row.get(fct_image_detections::DETECTION_KEY)?,
                message_id: row.get(fct_image_detections::MESSAGE_ID)?,
                channel_name: row.get(fct_image_detections::CHANNEL_NAME)?,
                channel_key: row.get(fct_image_detections::CHANNEL_KEY)?,
                date_key: row.get(fct_image_detections::DATE_KEY)?,
                image_path: row.get(fct_image_detections::IMAGE_PATH)?,
                detection_count: row.get(fct_image_detections::DETECTION_COUNT)?,
                image_category: row.get(fct_image_detections::IMAGE_CATEGORY)?,
                confidence_score: row.get(fct_image_detections::CONFIDENCE_SCORE)?,
                business_tags: row.get(fct_image_detections::BUSINESS_TAGS)?,
                top_objects: row.get(fct_image_detections::TOP_OBJECTS)?,
                is_promotional: row.get(fct_image_detections::IS_PROMOTIONAL)?,
                is_product_display: row.get(fct_image_detections::IS_PRODUCT_DISPLAY)?,
                is_lifestyle: row.get(fct_image_detections::IS_LIFESTYLE)?,
                is_high_confidence: row.get(fct_image_detections::IS_HIGH_CONFIDENCE)?,
                effectiveness_score: row.get(fct_image_detections::EFFECTIVENESS_SCORE)?,
                performance_category: match performance_label.as_str() {
                    "Excellent" => PerformanceCategory::Excellent,
                    "Good" => PerformanceCategory::Good,
                    "Fair" => PerformanceCategory::Fair,
                    _ => PerformanceCategory::Poor,
                },
                recommendation: row.get(fct_image_detections::RECOMMENDATION)?,
                loaded_at: row.get(fct_image_detections::LOADED_AT)?,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    // ---- run registry ----

    /// Acquire the single-writer run lock by registering a running run.
    ///
    /// Fails with [`WarehouseError::LockHeld`] if another run is active.
    pub fn acquire_run_lock(&self) -> Result<RunHandle> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let running: i64 = tx.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE {} = 'running'",
                pipeline_runs::TABLE,
                pipeline_runs::STATUS
            ),
            [],
            |row| row.get(0),
        )?;
        if running > 0 {
            return Err(WarehouseError::LockHeld);
        }

        tx.execute(
            &format!(
                "INSERT INTO {} ({}, {}) VALUES (?, 'running')",
                pipeline_runs::TABLE,
                pipeline_runs::STARTED_AT,
                pipeline_runs::STATUS
            ),
            params![Utc::now().naive_utc()],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        debug!(run_id = id, "Acquired pipeline run lock");
        Ok(RunHandle(id))
    }

    /// Release the run lock, recording the final status.
    pub fn release_run_lock(&self, handle: RunHandle, succeeded: bool) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute(
            &format!(
                "UPDATE {} SET {} = ?, {} = ? WHERE {} = ?",
                pipeline_runs::TABLE,
                pipeline_runs::STATUS,
                pipeline_runs::FINISHED_AT,
                pipeline_runs::ID
            ),
            params![
                if succeeded { "succeeded" } else { "failed" },
                Utc::now().naive_utc(),
                handle.0,
            ],
        )?;
        Ok(())
    }

    /// Summary counts over the warehouse tables
    pub fn stats(&self) -> Result<WarehouseStats> {
        let conn = self.get_connection()?;
        let count = |table: &str| -> Result<i64> {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })?)
        };
        Ok(WarehouseStats {
            raw_messages: count(raw_messages::TABLE)?,
            raw_detections: count(raw_detections::TABLE)?,
            channels: count(dim_channels::TABLE)?,
            dates: count(dim_dates::TABLE)?,
            message_facts: count(fct_messages::TABLE)?,
            detection_facts: count(fct_image_detections::TABLE)?,
        })
    }
}
