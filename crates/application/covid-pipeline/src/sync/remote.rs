use crate::sync::SyncError;
use covid_core::FreshnessMarker;
use covid_infra::net::{fetch_json, fetch_table, FetchOutcome};
use reqwest::Client;

/// Source of remote tables and freshness markers.
#[async_trait::async_trait]
pub trait TableSource: Send + Sync {
    async fn fetch_table(&self, url: &str) -> FetchOutcome;
    async fn fetch_marker(&self, url: &str) -> Result<FreshnessMarker, SyncError>;
}

/// HTTP-based source backed by a shared `reqwest` client.
pub struct HttpTableSource {
    client: Client,
}

impl HttpTableSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl TableSource for HttpTableSource {
    async fn fetch_table(&self, url: &str) -> FetchOutcome {
        fetch_table(&self.client, url).await
    }

    async fn fetch_marker(&self, url: &str) -> Result<FreshnessMarker, SyncError> {
        fetch_json::<FreshnessMarker>(&self.client, url)
            .await
            .map_err(|e| SyncError::Remote(format!("freshness marker: {e}")))
    }
}
