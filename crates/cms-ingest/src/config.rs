//! Ingestion configuration

use cms_common::IngestError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Defaults
// ============================================================================

/// CMS Provider Data metastore listing of every dataset
pub const DEFAULT_CATALOG_URL: &str =
    "https://data.cms.gov/provider-data/api/1/metastore/schemas/dataset/items";

pub const DEFAULT_OUTPUT_DIR: &str = "./processed_data";

pub const DEFAULT_WATERMARK_FILE: &str = "metadata.json";

pub const DEFAULT_CATEGORY: &str = "Hospitals";

pub const DEFAULT_CONCURRENCY: usize = 4;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Fixed delay between download attempts, in seconds
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5;

/// Per-request HTTP timeout, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// What to do with the watermark when some candidates were not saved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPolicy {
    /// Advance after every run, whatever happened to individual datasets.
    /// Datasets that failed are not retried by the next run unless the
    /// catalog reports them as modified again.
    #[default]
    Always,
    /// Advance only when every candidate was saved; otherwise keep the
    /// previous watermark so the next run retries the whole candidate set.
    AllSaved,
}

impl std::str::FromStr for WatermarkPolicy {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "always" => Ok(WatermarkPolicy::Always),
            "all-saved" | "all_saved" => Ok(WatermarkPolicy::AllSaved),
            _ => Err(IngestError::config(format!(
                "Invalid watermark policy '{}', expected 'always' or 'all-saved'",
                s
            ))),
        }
    }
}

impl std::fmt::Display for WatermarkPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatermarkPolicy::Always => write!(f, "always"),
            WatermarkPolicy::AllSaved => write!(f, "all-saved"),
        }
    }
}

/// Settings for one ingestion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Catalog endpoint returning a JSON array of dataset descriptors
    pub catalog_url: String,

    /// Directory receiving one `{identifier}.csv` per dataset
    pub output_dir: PathBuf,

    /// JSON file holding `last_run_time`
    pub watermark_file: PathBuf,

    /// Theme a dataset must carry to be synced
    pub category: String,

    /// Maximum number of datasets processed at the same time
    pub concurrency: usize,

    /// Download attempts per dataset before giving up
    pub max_attempts: u32,

    /// Delay between download attempts
    pub retry_delay_secs: u64,

    /// HTTP request timeout
    pub timeout_secs: u64,

    pub watermark_policy: WatermarkPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            watermark_file: PathBuf::from(DEFAULT_WATERMARK_FILE),
            category: DEFAULT_CATEGORY.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            watermark_policy: WatermarkPolicy::Always,
        }
    }
}

impl IngestConfig {
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::default()
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Path of the artifact written for `identifier`
    pub fn artifact_path(&self, identifier: &str) -> PathBuf {
        self.output_dir.join(format!("{}.csv", identifier))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.catalog_url.trim().is_empty() {
            return Err(IngestError::config("Catalog URL cannot be empty"));
        }

        if self.category.trim().is_empty() {
            return Err(IngestError::config("Category cannot be empty"));
        }

        if self.concurrency == 0 {
            return Err(IngestError::config("Concurrency must be greater than 0"));
        }

        if self.max_attempts == 0 {
            return Err(IngestError::config("Max attempts must be greater than 0"));
        }

        if self.timeout_secs == 0 {
            return Err(IngestError::config("Timeout must be greater than 0"));
        }

        Ok(())
    }
}

/// Builder for IngestConfig
#[derive(Debug, Default)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn catalog_url(mut self, url: impl Into<String>) -> Self {
        self.config.catalog_url = url.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn watermark_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.watermark_file = path.into();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.config.category = category.into();
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn retry_delay_secs(mut self, secs: u64) -> Self {
        self.config.retry_delay_secs = secs;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn watermark_policy(mut self, policy: WatermarkPolicy) -> Self {
        self.config.watermark_policy = policy;
        self
    }

    pub fn build(self) -> IngestConfig {
        self.config
    }
}
