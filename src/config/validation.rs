use super::models::Config;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("output.dir must not be empty")]
    EmptyOutputDir,

    #[error("{field} is not a valid URL: {value}")]
    InvalidUrl { field: &'static str, value: String },

    #[error("catalog.{0} is required when catalog.root_url is set")]
    MissingCatalogSetting(&'static str),

    #[error("catalog.timeout_secs must be greater than zero")]
    ZeroTimeout,
}

pub fn validate(config: &Config) -> Result<(), ValidationError> {
    if config.output.dir.trim().is_empty() {
        return Err(ValidationError::EmptyOutputDir);
    }

    if config.catalog.timeout_secs == 0 {
        return Err(ValidationError::ZeroTimeout);
    }

    validate_catalog(config)
}

fn validate_catalog(config: &Config) -> Result<(), ValidationError> {
    let catalog = &config.catalog;

    let Some(root_url) = &catalog.root_url else {
        return Ok(());
    };
    check_url("catalog.root_url", root_url)?;

    let token_url = catalog
        .token_url
        .as_ref()
        .ok_or(ValidationError::MissingCatalogSetting("token_url"))?;
    check_url("catalog.token_url", token_url)?;

    if catalog.client_id.is_none() {
        return Err(ValidationError::MissingCatalogSetting("client_id"));
    }
    if catalog.client_secret.is_none() {
        return Err(ValidationError::MissingCatalogSetting("client_secret"));
    }

    Ok(())
}

fn check_url(field: &'static str, value: &str) -> Result<(), ValidationError> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
        }),
    }
}
