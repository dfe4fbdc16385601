//! Medical Warehouse - Telegram Analytics Pipeline
//!
//! A Rust library implementing a star-schema warehouse over scraped
//! Telegram medical-channel data.
//!
//! # Features
//!
//! - Load scraper JSON exports and detector CSVs into an append-only raw layer
//! - Stage, clean, and enrich messages in memory
//! - Build channel and date dimensions with deterministic surrogate keys
//! - Maintain the message fact table incrementally via keyed upserts
//! - Derive image-detection facts with effectiveness scoring
//! - Gate every run behind a data-quality check suite

/// Configuration management
pub mod config;
/// Database operations and connection pooling
pub mod db;
/// Channel and date dimension builders
pub mod dimensions;
/// Error types
pub mod error;
/// Fact table builders
pub mod facts;
/// Raw layer loaders (JSON lake, detection CSV)
pub mod loader;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Pipeline orchestration
pub mod pipeline;
/// Data quality checks
pub mod quality;
/// Database schema definitions
pub mod schema;
/// Staging transform
pub mod staging;
/// Input validation and sanitization
pub mod validation;

// Re-export key components for easier access
pub use db::Warehouse;
pub use error::{Result, WarehouseError};
pub use models::{ChannelDimension, DateDimension, ImageDetectionFact, MessageFact, RawMessage};
pub use pipeline::{PipelineReport, PipelineRunner};
