//! Incremental ingestion run
//!
//! A run moves through four steps:
//!
//! 1. load the watermark left by the previous run
//! 2. list the catalog and keep datasets in the configured category whose
//!    `modified` is strictly newer than the watermark
//! 3. process the candidates on a bounded pool; each dataset is downloaded,
//!    parsed, renamed and written with its own retry loop, and its failures
//!    never leave that loop
//! 4. store "now" as the new watermark (see [`WatermarkPolicy`])
//!
//! The watermark is only written at the very end, so a run that dies halfway
//! leaves it untouched and the next run starts over from the same candidates.

use crate::clock::{Clock, SystemClock};
use crate::config::{IngestConfig, WatermarkPolicy};
use crate::fetcher::DatasetFetcher;
use crate::normalize::normalize_column_name;
use crate::table::Table;
use crate::watermark::WatermarkStore;
use cms_common::types::{DatasetDescriptor, Watermark};
use cms_common::{IngestError, Result};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Terminal state of one dataset within a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetOutcome {
    /// Artifact written
    Saved { path: PathBuf, rows: usize },
    /// Every attempt hit a network error
    SkippedRetriesExhausted { attempts: u32 },
    /// Payload could not be parsed as CSV; not retried
    SkippedParseError,
    /// Anything else (I/O, missing download URL, worker panic); not retried
    SkippedUnexpectedError,
}

impl DatasetOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, DatasetOutcome::Saved { .. })
    }
}

/// Datasets of `category` modified strictly after `watermark`
pub fn select_candidates(
    catalog: Vec<DatasetDescriptor>,
    category: &str,
    watermark: &Watermark,
) -> Vec<DatasetDescriptor> {
    catalog
        .into_iter()
        .filter(|d| d.has_category(category) && watermark.admits(&d.modified))
        .collect()
}

/// Per-dataset retry procedure, cheap to clone into spawned tasks
#[derive(Clone)]
struct Worker {
    config: Arc<IngestConfig>,
    fetcher: Arc<dyn DatasetFetcher>,
    clock: Arc<dyn Clock>,
}

impl Worker {
    async fn process(&self, dataset: &DatasetDescriptor) -> DatasetOutcome {
        let dataset_id = dataset.identifier.as_str();

        if !is_safe_file_stem(dataset_id) {
            error!(dataset_id, "Identifier cannot be used as a file name, skipping");
            return DatasetOutcome::SkippedUnexpectedError;
        }

        let Some(url) = dataset.download_url() else {
            error!(dataset_id, "Catalog entry has no download URL, skipping");
            return DatasetOutcome::SkippedUnexpectedError;
        };

        let path = self.config.artifact_path(dataset_id);
        let max_attempts = self.config.max_attempts;

        for attempt in 1..=max_attempts {
            match self.attempt(url, &path).await {
                Ok(rows) => {
                    info!(dataset_id, attempt, rows, path = %path.display(), "Processed and saved dataset");
                    return DatasetOutcome::Saved { path, rows };
                },
                Err(e) if e.is_transient() => {
                    warn!(dataset_id, attempt, max_attempts, error = %e, "Network error");
                    // No backoff after the final attempt, the dataset is skipped at once
                    if attempt < max_attempts {
                        self.clock.sleep(self.config.retry_delay()).await;
                    }
                },
                Err(e @ IngestError::Parse(_)) => {
                    error!(dataset_id, error = %e, "Parsing error, skipping dataset");
                    return DatasetOutcome::SkippedParseError;
                },
                Err(e) => {
                    error!(dataset_id, error = %e, "Unexpected error, skipping dataset");
                    return DatasetOutcome::SkippedUnexpectedError;
                },
            }
        }

        error!(dataset_id, attempts = max_attempts, "Giving up after repeated network errors");
        DatasetOutcome::SkippedRetriesExhausted {
            attempts: max_attempts,
        }
    }

    /// Download, parse, rename and write once; returns the row count
    async fn attempt(&self, url: &str, path: &Path) -> Result<usize> {
        let payload = self.fetcher.download_payload(url).await?;
        let path = path.to_path_buf();

        tokio::task::spawn_blocking(move || -> Result<usize> {
            let mut table = Table::parse(&payload)?;
            table.rename_columns(normalize_column_name);
            table.write_csv(&path)?;
            Ok(table.row_count())
        })
        .await
        .map_err(|e| IngestError::unexpected(format!("CSV task failed: {}", e)))?
    }
}

/// Identifiers become `{identifier}.csv` inside the output directory
fn is_safe_file_stem(identifier: &str) -> bool {
    !identifier.is_empty()
        && identifier != "."
        && identifier != ".."
        && !identifier.contains(['/', '\\', '\0'])
}

/// Orchestrates one incremental sync
pub struct IngestionPipeline {
    worker: Worker,
    store: WatermarkStore,
}

impl IngestionPipeline {
    pub fn new(config: IngestConfig, fetcher: Arc<dyn DatasetFetcher>) -> Self {
        let store = WatermarkStore::new(config.watermark_file.clone());
        Self {
            worker: Worker {
                config: Arc::new(config),
                fetcher,
                clock: Arc::new(SystemClock),
            },
            store,
        }
    }

    /// Replace the wall clock, e.g. to skip backoff delays in tests
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.worker.clock = clock;
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.worker.config
    }

    /// Run the retry procedure for a single dataset
    pub async fn process_dataset(&self, dataset: &DatasetDescriptor) -> DatasetOutcome {
        self.worker.process(dataset).await
    }

    /// Execute one incremental sync
    ///
    /// Only a catalog failure, or failing to create the output directory or
    /// to save the watermark, is returned as an error. Returns the watermark
    /// in effect once the run is over.
    pub async fn run(&self) -> Result<Watermark> {
        let run_id = Uuid::new_v4();
        self.run_inner()
            .instrument(info_span!("ingest_run", %run_id))
            .await
    }

    async fn run_inner(&self) -> Result<Watermark> {
        let config = &self.worker.config;

        tokio::fs::create_dir_all(&config.output_dir).await?;

        let previous = self.store.load().await;
        debug!(watermark = %previous, "Loaded watermark");

        let catalog = self.worker.fetcher.list_catalog().await?;
        let in_category = catalog.iter().filter(|d| d.has_category(&config.category)).count();
        info!(category = %config.category, "Found {} matching datasets.", in_category);

        let candidates = select_candidates(catalog, &config.category, &previous);
        info!("Processing {} new or updated datasets.", candidates.len());

        let outcomes = self.dispatch(candidates).await;

        let advance = match config.watermark_policy {
            WatermarkPolicy::Always => true,
            WatermarkPolicy::AllSaved => outcomes.iter().all(DatasetOutcome::is_saved),
        };

        if !advance {
            let failed = outcomes.iter().filter(|o| !o.is_saved()).count();
            warn!(failed, watermark = %previous, "Some datasets were not saved, keeping previous watermark");
            return Ok(previous);
        }

        let next = Watermark::from_datetime(self.worker.clock.now());
        self.store.save(&next).await?;
        info!(watermark = %next, "Watermark updated.");

        Ok(next)
    }

    /// Run every candidate on a pool of at most `concurrency` tasks
    async fn dispatch(&self, candidates: Vec<DatasetDescriptor>) -> Vec<DatasetOutcome> {
        stream::iter(candidates)
            .map(|dataset| {
                let worker = self.worker.clone();
                let dataset_id = dataset.identifier.clone();
                let span = info_span!("dataset", dataset_id = %dataset_id);

                async move {
                    let task = tokio::spawn(async move { worker.process(&dataset).await }.instrument(span));
                    match task.await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            error!(dataset_id = %dataset_id, error = %e, "Dataset task aborted");
                            DatasetOutcome::SkippedUnexpectedError
                        },
                    }
                }
            })
            .buffer_unordered(self.worker.config.concurrency)
            .collect()
            .await
    }
}
