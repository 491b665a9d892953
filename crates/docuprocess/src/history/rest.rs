//! History store backed by a hosted PostgREST-style table.
//!
//! Rows live at `{base_url}/rest/v1/{table}`. Every request carries the project API
//! key as `apikey`. The bearer is the signed-in user's access token when the
//! identity has one, otherwise the API key.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use super::{HistoryQuery, HistoryRecord, HistoryStore, NewHistoryRecord};
use crate::config::RestStoreConfig;
use crate::error::{ConfigError, PersistenceError};
use crate::session::AccessToken;
use crate::secrets::resolve_secret;

pub struct RestHistoryStore {
    client: Client,
    endpoint: Url,
    api_key: SecretString,
}

impl std::fmt::Debug for RestHistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestHistoryStore")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl RestHistoryStore {
    pub fn new(
        base_url: &str,
        table: &str,
        api_key: SecretString,
        timeout: Option<Duration>,
    ) -> Result<Self, ConfigError> {
        let endpoint = format!("{}/rest/v1/{}", base_url.trim_end_matches('/'), table);
        let endpoint = Url::parse(&endpoint).map_err(|e| ConfigError::Validation {
            message: format!("Invalid history store URL '{}': {}", endpoint, e),
        })?;

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| ConfigError::Validation {
            message: format!("Failed to build HTTP client: {}", e),
        })?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    pub fn from_config(config: &RestStoreConfig) -> Result<Self, ConfigError> {
        let api_key = resolve_secret(
            config.api_key.as_deref(),
            config.api_key_file.as_deref(),
            config.api_key_env_var.as_deref(),
        )
        .map_err(|source| ConfigError::Secret {
            name: "persistence.rest.api_key".to_string(),
            source,
        })?;

        Self::new(
            &config.base_url,
            &config.table,
            api_key,
            config.timeout_secs.map(Duration::from_secs),
        )
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request(
        &self,
        method: reqwest::Method,
        user_token: Option<&AccessToken>,
    ) -> reqwest::RequestBuilder {
        let key = self.api_key.expose_secret();
        let bearer = user_token.map_or(key, AccessToken::expose);
        self.client
            .request(method, self.endpoint.clone())
            .header("apikey", key)
            .bearer_auth(bearer)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, PersistenceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PersistenceError::Http {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl HistoryStore for RestHistoryStore {
    async fn insert(&self, record: NewHistoryRecord) -> Result<(), PersistenceError> {
        record.validate()?;

        let response = self
            .request(reqwest::Method::POST, record.access_token.as_ref())
            .header("Prefer", "return=minimal")
            .json(&record)
            .send()
            .await?;
        check_status(response).await?;

        debug!(user_id = %record.user_id, "History row inserted");
        Ok(())
    }

    async fn query(&self, query: &HistoryQuery) -> Result<Vec<HistoryRecord>, PersistenceError> {
        let params = [
            ("select", "*".to_string()),
            ("user_id", format!("eq.{}", query.user_id)),
            ("order", "processed_at.desc".to_string()),
        ];

        let response = self
            .request(reqwest::Method::GET, query.access_token.as_ref())
            .query(&params)
            .send()
            .await?;
        let body = check_status(response).await?.text().await?;

        serde_json::from_str(&body).map_err(|e| PersistenceError::Decode(e.to_string()))
    }
}
