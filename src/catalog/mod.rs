//! Data catalogue sinks
//!
//! Every written output file is announced to the catalogue as a
//! [`CatalogueFileRecord`]. A run submits all of its records in one call,
//! and only after every file has been written.

mod http;

pub use http::HttpCatalogClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::config::CatalogConfig;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog setting missing: {0}")]
    MissingSetting(&'static str),

    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("catalog request timed out")]
    Timeout,

    #[error("catalog returned HTTP {status} for {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// One output file as announced to the catalogue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogueFileRecord {
    pub feed_identifier: String,
    pub feed_version: u32,
    pub file_location: String,
    pub organisation: String,
    /// `start_date`, `end_date`, `data_provider`, `source_creation_timestamp`
    pub file_meta: BTreeMap<String, String>,
}

/// Destination for catalogue records
#[async_trait]
pub trait CatalogSink: Send + Sync {
    /// Submit one run's records as a single batch
    async fn submit(&self, records: &[CatalogueFileRecord]) -> Result<()>;
}

/// Build the sink described by `config`: the HTTP client when a catalogue
/// root is configured, otherwise a sink that only logs
pub fn from_config(config: &CatalogConfig) -> Result<Arc<dyn CatalogSink>> {
    if config.root_url.is_some() {
        Ok(Arc::new(HttpCatalogClient::new(config)?))
    } else {
        tracing::warn!("No catalog root_url configured, records will only be logged");
        Ok(Arc::new(LogCatalog))
    }
}

/// Sink that logs records instead of sending them
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCatalog;

#[async_trait]
impl CatalogSink for LogCatalog {
    async fn submit(&self, records: &[CatalogueFileRecord]) -> Result<()> {
        for record in records {
            tracing::info!(
                feed = %record.feed_identifier,
                version = record.feed_version,
                location = %record.file_location,
                "Catalogue record"
            );
        }
        Ok(())
    }
}

/// Sink that keeps every submitted batch in memory
#[derive(Debug, Default)]
pub struct RecordingCatalog {
    batches: Mutex<Vec<Vec<CatalogueFileRecord>>>,
    failure: Option<u16>,
}

impl RecordingCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that records each call and then rejects it with `status`
    pub fn failing(status: u16) -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            failure: Some(status),
        }
    }

    pub fn batches(&self) -> Vec<Vec<CatalogueFileRecord>> {
        self.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Vec<CatalogueFileRecord>>> {
        self.batches.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CatalogSink for RecordingCatalog {
    async fn submit(&self, records: &[CatalogueFileRecord]) -> Result<()> {
        self.lock().push(records.to_vec());

        match self.failure {
            Some(status) => Err(CatalogError::Status {
                url: "recording://catalogue/".to_string(),
                status,
                body: String::new(),
            }),
            None => Ok(()),
        }
    }
}
