use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "FILEPREP_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/fileprep.toml";
const ENV_PREFIX: &str = "FILEPREP";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_with_secrets(config_path)
}

/// Same as [`load`] with an explicit file path
pub fn load_with_secrets(config_path: PathBuf) -> Result<Config, ConfigError> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let mut config = load_from_sources(config_path)?;
    load_secrets(&mut config);

    Ok(config)
}

/// Secrets are never read from TOML files, only from the environment
fn load_secrets(config: &mut Config) {
    if let Ok(access_key) = env::var("AWS_ACCESS_KEY_ID") {
        config.storage.access_key = Some(access_key);
    }
    if let Ok(secret_key) = env::var("AWS_SECRET_ACCESS_KEY") {
        config.storage.secret_key = Some(secret_key);
    }
    if let Ok(client_secret) = env::var("CATALOG_CLIENT_SECRET") {
        config.catalog.client_secret = Some(client_secret);
    }
}

/// Load configuration from a specific path and environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // FILEPREP__OUTPUT__DIR -> output.dir
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}
