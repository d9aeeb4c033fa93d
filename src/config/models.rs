use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Where prepared files are written
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Output root; files land under `<dir>/<supplier>/<run timestamp>/`
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String {
    "file://output".to_string()
}

/// Remote storage settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    pub region: Option<String>,
    pub endpoint: Option<String>,
    #[serde(default)]
    pub allow_http: bool,
    /// Access key (loaded from environment, not from config file)
    #[serde(skip)]
    pub access_key: Option<String>,
    /// Secret key (loaded from environment, not from config file)
    #[serde(skip)]
    pub secret_key: Option<String>,
}

impl StorageConfig {
    /// Options handed to `object_store` when resolving remote URIs
    pub fn store_options(&self) -> Vec<(String, String)> {
        let mut options = Vec::new();

        if let Some(region) = &self.region {
            options.push(("aws_region".to_string(), region.clone()));
        }
        if let Some(endpoint) = &self.endpoint {
            options.push(("aws_endpoint".to_string(), endpoint.clone()));
        }
        if self.allow_http {
            options.push(("aws_allow_http".to_string(), "true".to_string()));
        }
        if let Some(access_key) = &self.access_key {
            options.push(("aws_access_key_id".to_string(), access_key.clone()));
        }
        if let Some(secret_key) = &self.secret_key {
            options.push(("aws_secret_access_key".to_string(), secret_key.clone()));
        }

        options
    }
}

/// Data catalogue service settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    /// Catalogue API root; when absent, records are only logged
    pub root_url: Option<String>,
    /// OAuth token endpoint used for client-credentials grants
    pub token_url: Option<String>,
    pub audience: Option<String>,
    pub client_id: Option<String>,
    /// Client secret (loaded from environment, not from config file)
    #[serde(skip)]
    pub client_secret: Option<String>,
    #[serde(default = "default_organisation")]
    pub organisation: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl CatalogConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            root_url: None,
            token_url: None,
            audience: None,
            client_id: None,
            client_secret: None,
            organisation: default_organisation(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_organisation() -> String {
    "atheon".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}
