//! Raw layer loaders
//!
//! Ingests scraper JSON exports from the date-partitioned data lake and
//! object-detection results from CSV into the append-only raw tables. Both
//! loaders are idempotent: rows whose natural key already exists are
//! silently skipped, so re-running a load never duplicates data.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::{info, warn};

use crate::db::Warehouse;
use crate::error::{Result, WarehouseError};
use crate::metrics;
use crate::models::{DetectionResult, NewRawMessage, ScrapedMessage};

/// Maximum stored message text length, in characters
const MAX_TEXT_CHARS: usize = 10_000;

/// Manifest files are lake bookkeeping, not channel exports
const MANIFEST_FILE: &str = "_manifest.json";

/// Counts from a completed load
#[derive(Debug, Default, Clone, Copy)]
pub struct LoadSummary {
    /// Rows inserted
    pub inserted: usize,
    /// Rows skipped because the natural key already existed
    pub duplicates: usize,
    /// Rows skipped because they could not be used (no id, bad row)
    pub skipped: usize,
}

/// Envelope of a scraper JSON export
#[derive(Debug, Deserialize)]
struct ScrapedExport {
    #[serde(default)]
    metadata: ExportMetadata,
    /// Newer exports use `data`, older ones `messages`
    #[serde(default)]
    data: Vec<ScrapedMessage>,
    #[serde(default)]
    messages: Vec<ScrapedMessage>,
}

#[derive(Debug, Default, Deserialize)]
struct ExportMetadata {
    #[serde(default)]
    channel: Option<String>,
}

/// Parse a scraper timestamp.
///
/// Exports mix ISO-8601 with timezone offsets, ISO without offsets, and a
/// handful of older space-separated formats. Offsets are dropped; all
/// values are treated as UTC.
pub fn parse_message_date(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(with_offset.naive_utc());
    }
    if let Ok(iso) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(iso);
    }

    const FALLBACK_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%d/%m/%Y %H:%M:%S"];
    for format in FALLBACK_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(parsed);
        }
    }

    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];
    for format in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, format) {
            return parsed.and_hms_opt(0, 0, 0);
        }
    }

    warn!(value = trimmed, "Could not parse message date");
    None
}

/// Load scraper JSON exports from the data lake.
///
/// The lake is laid out as `<data_dir>/YYYY-MM-DD/<channel>.json`; pass
/// `specific_date` to load a single partition.
pub fn load_message_lake(
    warehouse: &Warehouse,
    data_dir: &Path,
    specific_date: Option<NaiveDate>,
) -> Result<LoadSummary> {
    if !data_dir.is_dir() {
        return Err(WarehouseError::InvalidConfig(format!(
            "data directory not found: {}",
            data_dir.display()
        )));
    }

    let partitions: Vec<PathBuf> = match specific_date {
        Some(date) => {
            let partition = data_dir.join(date.format("%Y-%m-%d").to_string());
            if !partition.is_dir() {
                return Err(WarehouseError::InvalidConfig(format!(
                    "date partition not found: {}",
                    partition.display()
                )));
            }
            vec![partition]
        }
        None => {
            let mut dirs: Vec<PathBuf> = fs::read_dir(data_dir)?
                .filter_map(std::result::Result::ok)
                .map(|entry| entry.path())
                .filter(|path| path.is_dir())
                .collect();
            dirs.sort();
            dirs
        }
    };

    let mut summary = LoadSummary::default();
    for partition in &partitions {
        let mut files: Vec<PathBuf> = fs::read_dir(partition)?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension().is_some_and(|ext| ext == "json")
                    && path.file_name().is_none_or(|name| name != MANIFEST_FILE)
            })
            .collect();
        files.sort();

        for file in &files {
            let file_summary = load_export_file(warehouse, file)?;
            summary.inserted += file_summary.inserted;
            summary.duplicates += file_summary.duplicates;
            summary.skipped += file_summary.skipped;
        }
    }

    metrics::record_rows_ingested(summary.inserted, "telegram_json");
    info!(
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        skipped = summary.skipped,
        partitions = partitions.len(),
        "Loaded message lake"
    );
    Ok(summary)
}

/// Load one channel export file
fn load_export_file(warehouse: &Warehouse, path: &Path) -> Result<LoadSummary> {
    let contents = fs::read_to_string(path)?;
    let export: ScrapedExport = serde_json::from_str(&contents)?;

    let fallback_channel = export.metadata.channel.clone().unwrap_or_else(|| {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    let messages = if export.data.is_empty() {
        &export.messages
    } else {
        &export.data
    };

    let mut summary = LoadSummary::default();
    for scraped in messages {
        match to_new_raw_message(scraped, &fallback_channel) {
            Some(new_message) => {
                if warehouse.insert_raw_message(&new_message)? {
                    summary.inserted += 1;
                } else {
                    summary.duplicates += 1;
                }
            }
            None => summary.skipped += 1,
        }
    }

    info!(
        file = %path.display(),
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        skipped = summary.skipped,
        "Loaded export file"
    );
    Ok(summary)
}

/// Convert a scraped message into an insertable raw row.
///
/// Rows without a message id cannot be keyed and are dropped. Text is
/// stored as scraped (staging owns the no-text sentinel); counters are
/// clamped at zero at ingest so the raw layer never carries negatives.
fn to_new_raw_message(scraped: &ScrapedMessage, fallback_channel: &str) -> Option<NewRawMessage> {
    let message_id = scraped.message_id?;

    let channel_name = scraped
        .channel_name
        .clone()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| fallback_channel.to_string());
    let channel_title = scraped
        .channel_title
        .clone()
        .filter(|title| !title.trim().is_empty())
        .unwrap_or_else(|| channel_name.clone());

    let message_text = scraped
        .message_text
        .as_deref()
        .map(|text| text.chars().take(MAX_TEXT_CHARS).collect::<String>());
    let image_path = scraped
        .image_path
        .clone()
        .filter(|p| !p.trim().is_empty());
    let has_media = scraped.has_media.unwrap_or(image_path.is_some());

    // serde can always re-serialize a value it just deserialized
    let raw_data = serde_json::to_string(scraped).ok();

    Some(NewRawMessage {
        message_id: Some(message_id),
        channel_name: Some(channel_name),
        channel_title: Some(channel_title),
        message_date: scraped.message_date.as_deref().and_then(parse_message_date),
        message_text,
        has_media: Some(has_media),
        image_path,
        views: Some(scraped.views.unwrap_or(0).max(0)),
        forwards: Some(scraped.forwards.unwrap_or(0).max(0)),
        extracted_at: scraped.extracted_at.as_deref().and_then(parse_message_date),
        raw_data,
    })
}

/// One row of the detector CSV export
#[derive(Debug, Deserialize)]
struct DetectionCsvRecord {
    #[serde(default)]
    message_id: Option<i64>,
    #[serde(default)]
    channel_name: Option<String>,
    image_path: String,
    #[serde(default)]
    detection_count: i64,
    #[serde(default)]
    image_category: Option<String>,
    #[serde(default)]
    confidence_score: f64,
    #[serde(default)]
    business_tags: String,
    #[serde(default)]
    top_objects: String,
    #[serde(default)]
    processed_at: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Load detector results from CSV into the raw detection table.
///
/// Columns are matched by header name; extra columns in the export are
/// ignored.
pub fn load_detection_csv(warehouse: &Warehouse, path: &Path) -> Result<LoadSummary> {
    let mut reader = csv::Reader::from_path(path)?;

    let mut summary = LoadSummary::default();
    for record in reader.deserialize::<DetectionCsvRecord>() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                warn!(error = %err, "Skipping malformed detection row");
                summary.skipped += 1;
                continue;
            }
        };

        // Rows without a resolvable key can never join a message fact, and
        // NULL keys defeat the UNIQUE constraint on reload (SQLite treats
        // NULLs as distinct). Drop them at ingest.
        let channel_name = record.channel_name.filter(|name| !name.trim().is_empty());
        if record.message_id.is_none() || channel_name.is_none() {
            warn!(image = record.image_path, "Skipping detection row without message key");
            summary.skipped += 1;
            continue;
        }

        let detection = DetectionResult {
            message_id: record.message_id,
            channel_name,
            image_path: record.image_path,
            detection_count: record.detection_count.max(0),
            image_category: record.image_category,
            confidence_score: record.confidence_score.clamp(0.0, 1.0),
            business_tags: record.business_tags,
            top_objects: record.top_objects,
            processed_at: record.processed_at.as_deref().and_then(parse_message_date),
            error: record.error.filter(|e| !e.trim().is_empty()),
        };

        if warehouse.insert_detection_result(&detection)? {
            summary.inserted += 1;
        } else {
            summary.duplicates += 1;
        }
    }

    metrics::record_rows_ingested(summary.inserted, "detection_csv");
    info!(
        file = %path.display(),
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        skipped = summary.skipped,
        "Loaded detection results"
    );
    Ok(summary)
}
