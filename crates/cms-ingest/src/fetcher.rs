//! Catalog listing and payload download

use crate::config::IngestConfig;
use async_trait::async_trait;
use cms_common::types::DatasetDescriptor;
use cms_common::{IngestError, Result};
use reqwest::Client;
use tracing::{debug, warn};

/// User-Agent sent with every request
const USER_AGENT: &str = concat!("cms-ingest/", env!("CARGO_PKG_VERSION"));

/// Source of catalog entries and dataset payloads
///
/// One fetcher is shared by every worker of a run, so implementations must be
/// usable from several tasks at once.
#[async_trait]
pub trait DatasetFetcher: Send + Sync {
    /// Fetch and decode the full catalog
    ///
    /// Fails with [`IngestError::CatalogFetch`]; the run cannot continue.
    /// Entries that do not decode are left out of the listing.
    async fn list_catalog(&self) -> Result<Vec<DatasetDescriptor>>;

    /// Download the raw payload at `url`
    ///
    /// Fails with [`IngestError::Network`] on connection errors, timeouts and
    /// non-success statuses.
    async fn download_payload(&self, url: &str) -> Result<Vec<u8>>;
}

/// [`DatasetFetcher`] over HTTP
///
/// Wraps a single `reqwest::Client`, whose connection pool is reused by all
/// requests of the run.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    catalog_url: String,
}

impl HttpFetcher {
    pub fn new(config: &IngestConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| IngestError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(client, config.catalog_url.clone()))
    }

    pub fn with_client(client: Client, catalog_url: impl Into<String>) -> Self {
        Self {
            client,
            catalog_url: catalog_url.into(),
        }
    }
}

#[async_trait]
impl DatasetFetcher for HttpFetcher {
    async fn list_catalog(&self) -> Result<Vec<DatasetDescriptor>> {
        debug!(url = %self.catalog_url, "Fetching dataset catalog");

        let response = self
            .client
            .get(&self.catalog_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| IngestError::catalog(format!("{}: {}", self.catalog_url, e)))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| IngestError::catalog(format!("{}: {}", self.catalog_url, e)))?;

        let entries: Vec<serde_json::Value> = serde_json::from_slice(&body).map_err(|e| {
            IngestError::catalog(format!("Malformed catalog from {}: {}", self.catalog_url, e))
        })?;

        Ok(decode_entries(entries))
    }

    async fn download_payload(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| IngestError::network(e.to_string()))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| IngestError::network(e.to_string()))?;

        debug!(url, size_bytes = bytes.len(), "Payload downloaded");
        Ok(bytes.to_vec())
    }
}

/// Decode catalog entries one at a time, dropping the ones that don't fit
fn decode_entries(entries: Vec<serde_json::Value>) -> Vec<DatasetDescriptor> {
    let total = entries.len();
    let datasets: Vec<DatasetDescriptor> = entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let identifier = entry.get("identifier").cloned();
            match serde_json::from_value::<DatasetDescriptor>(entry) {
                Ok(dataset) => Some(dataset),
                Err(e) => {
                    warn!(index, identifier = ?identifier, error = %e, "Skipping undecodable catalog entry");
                    None
                },
            }
        })
        .collect();

    debug!(total, decoded = datasets.len(), "Catalog decoded");
    datasets
}
