//! HTTP client for the data catalogue service

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CatalogError, CatalogSink, CatalogueFileRecord, Result};
use crate::config::CatalogConfig;

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    audience: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct CatalogueRequest<'a> {
    file_records: [&'a [CatalogueFileRecord]; 1],
    flush: bool,
}

/// Catalogue client authenticating with a client-credentials grant
///
/// A fresh token is requested for every submission; runs submit once.
pub struct HttpCatalogClient {
    client: Client,
    catalogue_url: String,
    token_url: String,
    audience: Option<String>,
    client_id: String,
    client_secret: String,
}

impl HttpCatalogClient {
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let root_url = config
            .root_url
            .as_deref()
            .ok_or(CatalogError::MissingSetting("root_url"))?;
        let token_url = config
            .token_url
            .clone()
            .ok_or(CatalogError::MissingSetting("token_url"))?;
        let client_id = config
            .client_id
            .clone()
            .ok_or(CatalogError::MissingSetting("client_id"))?;
        let client_secret = config
            .client_secret
            .clone()
            .ok_or(CatalogError::MissingSetting("client_secret"))?;

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("fileprep/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            catalogue_url: format!("{}/catalogue/", root_url.trim_end_matches('/')),
            token_url,
            audience: config
                .audience
                .as_deref()
                .map(|a| a.trim_end_matches('/').to_string()),
            client_id,
            client_secret,
        })
    }

    async fn access_token(&self) -> Result<String> {
        let request = TokenRequest {
            grant_type: "client_credentials",
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            audience: self.audience.as_deref(),
        };

        let response = self
            .client
            .post(&self.token_url)
            .json(&request)
            .send()
            .await
            .map_err(request_error)?;
        let response = check_status(&self.token_url, response).await?;

        let token: TokenResponse = response.json().await?;
        debug!(url = %self.token_url, "Obtained catalog access token");
        Ok(token.access_token)
    }
}

#[async_trait]
impl CatalogSink for HttpCatalogClient {
    async fn submit(&self, records: &[CatalogueFileRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let token = self.access_token().await?;
        let body = CatalogueRequest {
            file_records: [records],
            flush: false,
        };

        let response = self
            .client
            .post(&self.catalogue_url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;
        check_status(&self.catalogue_url, response).await?;

        debug!(url = %self.catalogue_url, count = records.len(), "Catalogued files");
        Ok(())
    }
}

fn request_error(e: reqwest::Error) -> CatalogError {
    if e.is_timeout() {
        CatalogError::Timeout
    } else {
        CatalogError::Http(e)
    }
}

async fn check_status(url: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(CatalogError::Status {
        url: url.to_string(),
        status: status.as_u16(),
        body,
    })
}
