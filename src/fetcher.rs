use std::time::Duration;

use axum::body::Bytes;
use reqwest::{Client, StatusCode};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("upstream returned {status} for {url}")]
    Status { url: String, status: StatusCode },
}

/// Thin HTTP client for the publisher's file server.
///
/// No retries: a single failed request is reported to the caller as-is.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("TodayReader/1.0 (Daily Paper Reader)")
            .build()?;

        Ok(Self { client })
    }

    /// GET `url` and return the full body. Non-2xx responses are errors.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Bytes, FetchError> {
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| transport(url, source))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        response.bytes().await.map_err(|source| transport(url, source))
    }

    /// GET `url` and report whether it answered 200. The body is discarded.
    pub async fn probe_exists(&self, url: &str) -> Result<bool, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| transport(url, source))?;

        let exists = response.status() == StatusCode::OK;
        debug!("Probed {} -> {}", url, response.status());
        Ok(exists)
    }
}

fn transport(url: &str, source: reqwest::Error) -> FetchError {
    FetchError::Transport {
        url: url.to_string(),
        source,
    }
}
