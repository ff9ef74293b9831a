//! CMS Ingest - incremental sync of CMS provider datasets

use anyhow::{Context, Result};
use clap::Parser;
use cms_common::logging::{init_logging, LogConfig, LogLevel};
use cms_ingest::config::{
    DEFAULT_CATALOG_URL, DEFAULT_CATEGORY, DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_OUTPUT_DIR, DEFAULT_RETRY_DELAY_SECS, DEFAULT_TIMEOUT_SECS, DEFAULT_WATERMARK_FILE,
};
use cms_ingest::{HttpFetcher, IngestConfig, IngestionPipeline, WatermarkPolicy};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "cms-ingest")]
#[command(author, version, about = "Sync new or updated CMS datasets into local CSV files")]
struct Cli {
    /// Catalog endpoint listing every dataset
    #[arg(long, env = "CMS_CATALOG_URL", default_value = DEFAULT_CATALOG_URL)]
    catalog_url: String,

    /// Directory receiving one CSV per dataset
    #[arg(short, long, env = "CMS_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// JSON file holding the last run time
    #[arg(long, env = "CMS_WATERMARK_FILE", default_value = DEFAULT_WATERMARK_FILE)]
    watermark_file: PathBuf,

    /// Dataset theme to sync
    #[arg(long, env = "CMS_CATEGORY", default_value = DEFAULT_CATEGORY)]
    category: String,

    /// Datasets processed at the same time
    #[arg(long, env = "CMS_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Download attempts per dataset
    #[arg(long, env = "CMS_MAX_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Seconds to wait between download attempts
    #[arg(long, env = "CMS_RETRY_DELAY_SECS", default_value_t = DEFAULT_RETRY_DELAY_SECS)]
    retry_delay_secs: u64,

    /// HTTP request timeout in seconds
    #[arg(long, env = "CMS_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// When to move the watermark forward: "always" or "all-saved"
    #[arg(long, env = "CMS_WATERMARK_POLICY", default_value_t = WatermarkPolicy::Always)]
    watermark_policy: WatermarkPolicy,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> IngestConfig {
        IngestConfig::builder()
            .catalog_url(self.catalog_url)
            .output_dir(self.output_dir)
            .watermark_file(self.watermark_file)
            .category(self.category)
            .concurrency(self.concurrency)
            .max_attempts(self.max_attempts)
            .retry_delay_secs(self.retry_delay_secs)
            .timeout_secs(self.timeout_secs)
            .watermark_policy(self.watermark_policy)
            .build()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is the normal case
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("cms-ingest")
        .build();

    // Environment variables take precedence
    let log_config = LogConfig::from_env_with(log_config)?;
    let _log_guard = init_logging(&log_config)?;

    let config = cli.into_config();
    config.validate().context("Invalid configuration")?;

    let fetcher = HttpFetcher::new(&config)?;
    let pipeline = IngestionPipeline::new(config, Arc::new(fetcher));

    let watermark = pipeline.run().await.context("Ingestion run failed")?;

    info!(watermark = %watermark, "Ingestion complete");
    Ok(())
}
