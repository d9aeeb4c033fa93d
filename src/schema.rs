//! Preparation requests
//!
//! A [`PrepareFile`] is the input of one task. It usually arrives as JSON:
//!
//! ```json
//! {
//!   "feed_identifier": "retaillink_daily_sales",
//!   "file_location": "s3://inbox/acme/sales.tsv",
//!   "data_supplier": "acme",
//!   "start_date": "2023-12-14",
//!   "end_date": "2023-12-14",
//!   "source_creation_timestamp": "2023-12-15T06:00:00Z"
//! }
//! ```
//!
//! `feed_version` defaults to 1 and `concat` to `true`. Timestamps without
//! an offset are taken as UTC.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("malformed request: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("file_location '{0}' is not a valid URI")]
    InvalidLocation(String),
    #[error("data_supplier '{0}' must be a single path segment")]
    InvalidSupplier(String),
    #[error("end_date {end} is before start_date {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareFile {
    pub feed_identifier: String,
    #[serde(default = "default_feed_version")]
    pub feed_version: u32,
    pub file_location: String,
    pub data_supplier: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub source_creation_timestamp: DateTime<FixedOffset>,
    #[serde(default = "default_concat")]
    pub concat: bool,
}

impl PrepareFile {
    /// Parse and validate a JSON request
    pub fn from_json(json: &str) -> Result<Self, RequestError> {
        let request: PrepareFile = serde_json::from_str(json)?;
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        if self.feed_identifier.trim().is_empty() {
            return Err(RequestError::EmptyField("feed_identifier"));
        }

        if self.data_supplier.trim().is_empty() {
            return Err(RequestError::EmptyField("data_supplier"));
        }

        // Used as one directory name in output paths
        let supplier = self.data_supplier.as_str();
        if supplier.contains(['/', '\\']) || matches!(supplier, "." | "..") {
            return Err(RequestError::InvalidSupplier(self.data_supplier.clone()));
        }

        if self.file_location.trim().is_empty() {
            return Err(RequestError::EmptyField("file_location"));
        }

        // Bare paths are local files; anything with a scheme must parse
        if self.file_location.contains("://") && Url::parse(&self.file_location).is_err() {
            return Err(RequestError::InvalidLocation(self.file_location.clone()));
        }

        if self.end_date < self.start_date {
            return Err(RequestError::InvalidDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }

        Ok(())
    }
}

fn default_feed_version() -> u32 {
    1
}

fn default_concat() -> bool {
    true
}

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Parse RFC 3339, or a naive timestamp / bare date read as UTC
pub fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts);
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc().fixed_offset())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}
