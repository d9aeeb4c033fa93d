//! Configuration management for fileprep
//!
//! Settings are layered from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use fileprep::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Writing prepared files to: {}", config.output.dir);
//! ```
//!
//! # Environment Variables
//!
//! Any setting can be overridden with `FILEPREP__<section>__<key>`:
//! - `FILEPREP__OUTPUT__DIR=s3://prepared/output`
//! - `FILEPREP__CATALOG__ROOT_URL=https://catalogue.example.com/`
//! - `FILEPREP__CATALOG__TIMEOUT_SECS=60`
//!
//! Secrets only come from the environment: `AWS_ACCESS_KEY_ID`,
//! `AWS_SECRET_ACCESS_KEY` and `CATALOG_CLIENT_SECRET`.
//!
//! # Configuration File
//!
//! Loaded from `config/fileprep.toml` unless `FILEPREP_CONFIG` points elsewhere.

mod models;
mod sources;
mod validation;

pub use models::{CatalogConfig, Config, OutputConfig, StorageConfig};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or the
    /// merged settings fail validation.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_with_secrets(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
