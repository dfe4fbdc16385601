use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use std::path::Path;

/// Validation utilities for input sanitization and edge case handling
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Validate a lake partition date string (YYYY-MM-DD)
    pub fn validate_partition_date(value: &str) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
            .map_err(|_| anyhow!("Invalid date: {}. Use format YYYY-MM-DD", value))
    }

    /// Validate a database URL or path
    pub fn validate_database_url(url: &str) -> Result<()> {
        if url.trim().is_empty() {
            return Err(anyhow!("Database URL cannot be empty"));
        }

        let path = url.strip_prefix("sqlite:").unwrap_or(url);
        if path.trim().is_empty() {
            return Err(anyhow!("Database path cannot be empty"));
        }
        if path.contains('\0') {
            return Err(anyhow!("Database path contains invalid characters"));
        }

        Ok(())
    }

    /// Validate an input file path
    pub fn validate_file_path(path: &Path) -> Result<()> {
        if path.to_string_lossy().is_empty() {
            return Err(anyhow!("File path cannot be empty"));
        }

        // Check for path traversal attempts
        let path_str = path.to_string_lossy();
        if path_str.contains("..") {
            return Err(anyhow!("File path must not contain parent references"));
        }

        Ok(())
    }
}
