//! CMS Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging, and error handling for the CMS dataset sync tools.
//!
//! # Overview
//!
//! - **Error Handling**: the ingestion error taxonomy and result alias
//! - **Logging**: tracing subscriber setup driven by [`logging::LogConfig`]
//! - **Types**: catalog descriptors and the sync watermark
//!
//! # Example
//!
//! ```no_run
//! use cms_common::types::{DatasetDescriptor, Watermark};
//!
//! fn is_pending(dataset: &DatasetDescriptor, watermark: &Watermark) -> bool {
//!     watermark.admits(&dataset.modified)
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{IngestError, Result};
