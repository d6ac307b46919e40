// src/fetch/mod.rs
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;

use crate::table::Table;

pub mod discover;

#[derive(Debug, Error)]
pub enum FetchError {
    /// The artifact is absent at the requested location. Distinguished from
    /// other failures so callers can fall back to discovery.
    #[error("not found: {0}")]
    NotFound(String),
    #[error("HTTP status {status} from {url}")]
    Status { url: String, status: StatusCode },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        source: reqwest::Error,
    },
    #[error("invalid CSV from {url}: {detail}")]
    Invalid { url: String, detail: String },
}

/// Resolves a source URL to a parsed CSV table.
#[async_trait]
pub trait CsvFetcher: Send + Sync {
    async fn fetch_csv(&self, url: &str) -> Result<Table, FetchError>;
}

/// HTTP-backed fetcher. One attempt per call; a not-found response is a
/// signal for the caller, not a retryable failure.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CsvFetcher for HttpFetcher {
    async fn fetch_csv(&self, url: &str) -> Result<Table, FetchError> {
        debug!(%url, "fetching CSV");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let bytes = resp.bytes().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;
        Table::from_csv(&bytes).map_err(|e| FetchError::Invalid {
            url: url.to_string(),
            detail: e.to_string(),
        })
    }
}
