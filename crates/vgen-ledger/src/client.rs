//! PostgREST ledger client.
//!
//! Thin HTTP layer over the ledger database's REST surface. Repositories
//! build on the row/RPC helpers here; nothing else in the system talks to
//! the ledger directly.

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{LedgerError, LedgerResult};

/// Configuration for the ledger client.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Base URL of the REST endpoint (without the `/rest/v1` suffix).
    pub base_url: String,
    /// Service-role key; bypasses row-level security.
    pub service_key: String,
}

impl LedgerConfig {
    pub fn from_env() -> LedgerResult<Self> {
        Ok(Self {
            base_url: std::env::var("LEDGER_URL")
                .map_err(|_| LedgerError::config_error("LEDGER_URL not set"))?,
            service_key: std::env::var("LEDGER_SERVICE_KEY")
                .map_err(|_| LedgerError::config_error("LEDGER_SERVICE_KEY not set"))?,
        })
    }
}

/// HTTP client for the ledger's REST surface.
#[derive(Clone)]
pub struct LedgerClient {
    http: Client,
    base_url: String,
}

impl LedgerClient {
    pub fn new(config: LedgerConfig) -> LedgerResult<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.service_key)
            .map_err(|_| LedgerError::config_error("service key is not a valid header value"))?;
        headers.insert("apikey", key.clone());
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.service_key))
            .map_err(|_| LedgerError::config_error("service key is not a valid header value"))?;
        headers.insert("Authorization", bearer);

        let http = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| LedgerError::config_error(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_env() -> LedgerResult<Self> {
        Self::new(LedgerConfig::from_env()?)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Select rows matching a single equality filter.
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filter_column: &str,
        filter_value: &str,
    ) -> LedgerResult<Vec<T>> {
        debug!("Selecting from {} where {} = {}", table, filter_column, filter_value);

        let response = self
            .http
            .get(self.table_url(table))
            .query(&[
                (filter_column, format!("eq.{}", filter_value)),
                ("select", "*".to_string()),
            ])
            .send()
            .await?;

        let rows = Self::check(response).await?.json().await?;
        Ok(rows)
    }

    /// Insert one row and return the stored representation.
    pub async fn insert<T: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        row: &T,
    ) -> LedgerResult<R> {
        debug!("Inserting into {}", table);

        let response = self
            .http
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await?;

        let mut rows: Vec<R> = Self::check(response).await?.json().await?;
        rows.pop()
            .ok_or_else(|| LedgerError::InvalidResponse("insert returned no rows".to_string()))
    }

    /// Patch rows matching a single equality filter.
    pub async fn update<T: Serialize>(
        &self,
        table: &str,
        filter_column: &str,
        filter_value: &str,
        patch: &T,
    ) -> LedgerResult<()> {
        debug!("Updating {} where {} = {}", table, filter_column, filter_value);

        let response = self
            .http
            .patch(self.table_url(table))
            .query(&[(filter_column, format!("eq.{}", filter_value))])
            .json(patch)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    /// Invoke a stored procedure.
    pub async fn rpc<T: Serialize, R: DeserializeOwned>(
        &self,
        function: &str,
        args: &T,
    ) -> LedgerResult<R> {
        debug!("Calling RPC {}", function);

        let response = self
            .http
            .post(format!("{}/rest/v1/rpc/{}", self.base_url, function))
            .json(args)
            .send()
            .await?;

        let value = Self::check(response).await?.json().await?;
        Ok(value)
    }

    async fn check(response: reqwest::Response) -> LedgerResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND {
            return Err(LedgerError::not_found(body));
        }
        Err(LedgerError::request_failed(format!("{}: {}", status, body)))
    }
}
