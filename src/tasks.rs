//! Task body for one preparation request

use std::sync::Arc;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::catalog::{self, CatalogError, CatalogSink};
use crate::config::Config;
use crate::observability::Metrics;
use crate::preparer::{Clock, PrepareError};
use crate::registry::ScriptRegistry;
use crate::schema::PrepareFile;
use crate::storage::StorageClient;

/// Runs preparation requests against shared storage, registry and catalogue
///
/// Failures are returned as-is; nothing is retried and a failed run
/// submits nothing to the catalogue.
#[derive(Clone)]
pub struct TaskRunner {
    registry: Arc<ScriptRegistry>,
    storage: StorageClient,
    catalog: Arc<dyn CatalogSink>,
    output_dir: String,
    organisation: String,
    metrics: Arc<Metrics>,
    clock: Option<Clock>,
}

impl TaskRunner {
    pub fn new(
        registry: Arc<ScriptRegistry>,
        storage: StorageClient,
        catalog: Arc<dyn CatalogSink>,
        output_dir: impl Into<String>,
        organisation: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            storage,
            catalog,
            output_dir: output_dir.into(),
            organisation: organisation.into(),
            metrics: Arc::new(Metrics::new()),
            clock: None,
        }
    }

    /// Runner with the built-in feeds and the storage and catalogue from
    /// `config`
    pub fn from_config(config: &Config) -> Result<Self, CatalogError> {
        Ok(Self::new(
            Arc::new(ScriptRegistry::with_defaults()),
            StorageClient::new(&config.storage),
            catalog::from_config(&config.catalog)?,
            config.output.dir.clone(),
            config.catalog.organisation.clone(),
        ))
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn registry(&self) -> &ScriptRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Create, run, write and catalogue; returns the written paths
    pub async fn prepare_file(&self, request: PrepareFile) -> Result<Vec<String>, PrepareError> {
        let run_id = Uuid::now_v7();
        let span = info_span!(
            "prepare_file",
            %run_id,
            feed = %request.feed_identifier,
            version = request.feed_version,
            supplier = %request.data_supplier
        );

        async move {
            match self.run(&request).await {
                Ok(paths) => {
                    self.metrics.run_completed();
                    info!(count = paths.len(), "Preparation completed");
                    Ok(paths)
                }
                Err(e) => {
                    self.metrics.run_failed();
                    error!(location = %request.file_location, error = %e, "Preparation failed");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, request: &PrepareFile) -> Result<Vec<String>, PrepareError> {
        request.validate()?;

        let mut preparer = self.registry.create(
            &request.feed_identifier,
            request.feed_version,
            &request.data_supplier,
            request.start_date,
            request.end_date,
            request.source_creation_timestamp,
        )?;
        if let Some(clock) = self.clock {
            preparer = preparer.with_clock(clock);
        }

        let paths = preparer
            .prepare(
                &self.storage,
                &request.file_location,
                &self.output_dir,
                request.concat,
            )
            .await?
            .to_vec();
        self.metrics.files_written(paths.len());

        let catalogued = preparer
            .catalogue_outputs(self.catalog.as_ref(), &self.organisation)
            .await?;
        self.metrics.records_catalogued(catalogued);

        Ok(paths)
    }
}
