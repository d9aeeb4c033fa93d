//! Preparation run orchestration
//!
//! A [`FilePreparer`] is one run of one feed over one input file: open the
//! file with the feed's handler, transform every sub-unit, write the
//! resulting CSV files under deterministic paths, then announce them to the
//! catalogue.
//!
//! Output paths look like
//! `{output_dir}/{supplier}/{YYYY-MM-DD HH-MM-SS-ffffff}/{feed}.{counter}.csv`.
//! The timestamp is taken once per run, so every file of a run shares the
//! same directory and differs only by its counter.

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::catalog::{CatalogError, CatalogSink, CatalogueFileRecord};
use crate::dataset::{Dataset, DatasetError};
use crate::handlers::{FileHandler, HandlerError};
use crate::registry::RegistryError;
use crate::schema::RequestError;
use crate::scripts::{Script, ScriptContext, ScriptError};
use crate::storage::{StorageClient, StorageError};

/// `strftime` layout of the per-run directory
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H-%M-%S-%6f";

/// Source of the run timestamp
pub type Clock = fn() -> DateTime<Utc>;

#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("invalid request: {0}")]
    Request(#[from] RequestError),

    #[error(transparent)]
    UnknownFeed(#[from] RegistryError),

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error("transformation failed on sub-unit {index}: {source}")]
    Transformation {
        index: usize,
        #[source]
        source: ScriptError,
    },

    #[error("failed to serialize output: {0}")]
    Dataset(#[from] DatasetError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: StorageError,
    },

    #[error("no datasets produced from {0}")]
    NothingToWrite(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

pub type Result<T> = std::result::Result<T, PrepareError>;

pub struct FilePreparer {
    script: Arc<dyn Script>,
    handler: FileHandler,
    feed_identifier: String,
    feed_version: u32,
    data_supplier: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    source_creation_timestamp: DateTime<FixedOffset>,
    files_counter: usize,
    output_file_paths: Vec<String>,
    run_timestamp: Option<String>,
    clock: Clock,
}

impl FilePreparer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        script: Arc<dyn Script>,
        handler: FileHandler,
        feed_identifier: impl Into<String>,
        feed_version: u32,
        data_supplier: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        source_creation_timestamp: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            script,
            handler,
            feed_identifier: feed_identifier.into(),
            feed_version,
            data_supplier: data_supplier.into(),
            start_date,
            end_date,
            source_creation_timestamp,
            files_counter: 0,
            output_file_paths: Vec::new(),
            run_timestamp: None,
            clock: Utc::now,
        }
    }

    /// Replace the clock used for the run timestamp
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn feed_identifier(&self) -> &str {
        &self.feed_identifier
    }

    pub fn feed_version(&self) -> u32 {
        self.feed_version
    }

    pub fn data_supplier(&self) -> &str {
        &self.data_supplier
    }

    pub fn handler(&self) -> &FileHandler {
        &self.handler
    }

    pub fn files_counter(&self) -> usize {
        self.files_counter
    }

    pub fn output_file_paths(&self) -> &[String] {
        &self.output_file_paths
    }

    /// Transform every sub-unit of `location`, in handler order
    ///
    /// Stops at the first failing sub-unit.
    pub async fn run_script(
        &self,
        storage: &StorageClient,
        location: &str,
    ) -> Result<Vec<Dataset>> {
        let ctx = ScriptContext::new(self.start_date, self.end_date);
        let mut units = self.handler.open(storage, location).await?;

        let mut datasets = Vec::new();
        while let Some(unit) = units.next().await {
            let unit = unit?;
            let index = datasets.len();

            let dataset = self
                .script
                .run(&ctx.for_unit(&unit), &unit)
                .map_err(|source| PrepareError::Transformation { index, source })?;

            debug!(
                location,
                index,
                member = unit.name().unwrap_or("-"),
                rows = dataset.len(),
                "Transformed sub-unit"
            );
            datasets.push(dataset);
        }

        info!(
            location,
            handler = self.handler.kind(),
            count = datasets.len(),
            "Ran transformation"
        );
        Ok(datasets)
    }

    /// Write datasets as CSV, either merged into one file or one file each
    ///
    /// Returns every path written by this run so far.
    pub async fn write_outputs(
        &mut self,
        storage: &StorageClient,
        output_dir: &str,
        datasets: Vec<Dataset>,
        concat: bool,
    ) -> Result<&[String]> {
        if datasets.is_empty() {
            return Err(PrepareError::NothingToWrite(self.feed_identifier.clone()));
        }

        let outputs = if concat {
            vec![Dataset::concat(datasets)]
        } else {
            datasets
        };

        for dataset in outputs {
            let path = self.generate_file_path(output_dir);
            let body = dataset.to_csv()?;
            let size = body.len();

            storage
                .write(&path, body)
                .await
                .map_err(|source| PrepareError::Write {
                    path: path.clone(),
                    source,
                })?;

            debug!(path = %path, rows = dataset.len(), size, "Wrote output file");
            self.output_file_paths.push(path);
        }

        Ok(&self.output_file_paths)
    }

    /// Run the transformation over `location` and write its outputs
    pub async fn prepare(
        &mut self,
        storage: &StorageClient,
        location: &str,
        output_dir: &str,
        concat: bool,
    ) -> Result<&[String]> {
        let datasets = self.run_script(storage, location).await?;
        self.write_outputs(storage, output_dir, datasets, concat)
            .await
    }

    /// Next output path; the first call fixes the run timestamp
    pub fn generate_file_path(&mut self, output_dir: &str) -> String {
        let clock = self.clock;
        let timestamp = self
            .run_timestamp
            .get_or_insert_with(|| clock().format(TIMESTAMP_FORMAT).to_string());

        let path = format!(
            "{}/{}/{}/{}.{}.csv",
            output_dir.trim_end_matches('/'),
            self.data_supplier,
            timestamp,
            self.feed_identifier,
            self.files_counter
        );
        self.files_counter += 1;
        path
    }

    /// One record per written output file
    pub fn catalogue_records(&self, organisation: &str) -> Vec<CatalogueFileRecord> {
        let file_meta = BTreeMap::from([
            ("start_date".to_string(), self.start_date.to_string()),
            ("end_date".to_string(), self.end_date.to_string()),
            ("data_provider".to_string(), self.data_supplier.clone()),
            (
                "source_creation_timestamp".to_string(),
                iso_timestamp(&self.source_creation_timestamp),
            ),
        ]);

        self.output_file_paths
            .iter()
            .map(|path| CatalogueFileRecord {
                feed_identifier: self.feed_identifier.clone(),
                feed_version: self.feed_version,
                file_location: path.clone(),
                organisation: organisation.to_string(),
                file_meta: file_meta.clone(),
            })
            .collect()
    }

    /// Submit every written file to `sink` in one batch
    ///
    /// Returns the number of records submitted; nothing is sent when the run
    /// has written no files.
    pub async fn catalogue_outputs(
        &self,
        sink: &dyn CatalogSink,
        organisation: &str,
    ) -> Result<usize> {
        let records = self.catalogue_records(organisation);
        if records.is_empty() {
            return Ok(0);
        }

        sink.submit(&records).await?;
        info!(count = records.len(), "Catalogued outputs");
        Ok(records.len())
    }
}

/// Seconds precision, or exactly six fractional digits when there are microseconds
fn iso_timestamp(ts: &DateTime<FixedOffset>) -> String {
    let format = if ts.timestamp_subsec_micros() == 0 {
        SecondsFormat::Secs
    } else {
        SecondsFormat::Micros
    };
    ts.to_rfc3339_opts(format, false)
}
