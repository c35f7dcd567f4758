use covid_core::Table;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Result of fetching one tabular resource.
///
/// `NotFound` is kept apart from `TransportError` because a missing file can
/// be legitimate (data not published yet); callers decide how to treat
/// either. No retries happen at this layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(Table),
    NotFound,
    TransportError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{url}: not found")]
    NotFound { url: String },
    #[error("{url}: HTTP {status}")]
    Status { url: String, status: StatusCode },
    #[error("{url}: request failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url}: decode failed: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

pub fn default_http_client() -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(concat!("covid-sync/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(15))
        .timeout(Duration::from_secs(120))
        .build()
}

fn is_not_found(status: StatusCode) -> bool {
    status == StatusCode::NOT_FOUND || status == StatusCode::GONE
}

/// GET `url` and parse the body as a CSV table.
pub async fn fetch_table(client: &Client, url: &str) -> FetchOutcome {
    debug!("Downloading '{}'", url);

    let resp = match client.get(url).send().await {
        Ok(resp) => resp,
        Err(e) => return FetchOutcome::TransportError(format!("request failed: {e}")),
    };

    let status = resp.status();
    if is_not_found(status) {
        return FetchOutcome::NotFound;
    }
    if !status.is_success() {
        return FetchOutcome::TransportError(format!("HTTP {status}"));
    }

    let body = match resp.bytes().await {
        Ok(b) => b,
        Err(e) => return FetchOutcome::TransportError(format!("body read failed: {e}")),
    };

    match Table::from_bytes(body) {
        Ok(table) => FetchOutcome::Success(table),
        Err(e) => FetchOutcome::TransportError(e.to_string()),
    }
}

/// GET `url` and decode the body as JSON. Never cached.
pub async fn fetch_json<T: DeserializeOwned>(client: &Client, url: &str) -> Result<T, FetchError> {
    debug!("Fetching '{}'", url);

    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;

    let status = resp.status();
    if is_not_found(status) {
        return Err(FetchError::NotFound {
            url: url.to_string(),
        });
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

    serde_json::from_slice(&bytes).map_err(|source| FetchError::Decode {
        url: url.to_string(),
        source,
    })
}
