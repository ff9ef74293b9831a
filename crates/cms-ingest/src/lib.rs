//! CMS Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Incremental sync of CMS Provider Data catalog entries into local CSV files.
//!
//! A run reads the watermark left by the previous run, lists the catalog,
//! keeps the entries in the configured category that changed since the
//! watermark, downloads and rewrites each of them with normalized column
//! names, and finally moves the watermark forward.
//!
//! # Example
//!
//! ```no_run
//! use cms_ingest::{HttpFetcher, IngestConfig, IngestionPipeline};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::default();
//!     let fetcher = HttpFetcher::new(&config)?;
//!     let pipeline = IngestionPipeline::new(config, Arc::new(fetcher));
//!     pipeline.run().await?;
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod fetcher;
pub mod normalize;
pub mod pipeline;
pub mod table;
pub mod watermark;

pub use clock::{Clock, SystemClock};
pub use config::{IngestConfig, WatermarkPolicy};
pub use fetcher::{DatasetFetcher, HttpFetcher};
pub use normalize::normalize_column_name;
pub use pipeline::{DatasetOutcome, IngestionPipeline};
pub use watermark::WatermarkStore;
