//! Domain types shared by the sync tools

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One entry of the metastore catalog
///
/// Only the fields the sync needs are kept; everything else in the catalog
/// response is ignored during deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    /// Catalog identifier, unique per entry (e.g. `xubh-q36u`)
    pub identifier: String,

    /// Human readable title, used for logging only
    #[serde(default)]
    pub title: Option<String>,

    /// Category tags
    #[serde(default)]
    pub theme: Vec<String>,

    /// Last modification time, ISO-8601
    pub modified: String,

    /// Downloadable distributions of this dataset
    #[serde(default)]
    pub distribution: Vec<Distribution>,
}

/// A downloadable form of a dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    #[serde(rename = "downloadURL", default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,

    #[serde(rename = "mediaType", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

impl DatasetDescriptor {
    /// URL of the first distribution that carries one
    pub fn download_url(&self) -> Option<&str> {
        self.distribution
            .iter()
            .find_map(|d| d.download_url.as_deref())
    }

    /// Whether this dataset is tagged with `category`
    pub fn has_category(&self, category: &str) -> bool {
        self.theme.iter().any(|t| t == category)
    }
}

/// Timestamp of the last completed ingestion run
///
/// Compared as a string: ISO-8601 in a fixed-width format sorts the same way
/// lexicographically as chronologically. The empty string is the sentinel for
/// "never ran" and sorts below every real timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watermark(String);

impl Watermark {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The "never ran" sentinel
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when `modified` is strictly newer than this watermark
    pub fn admits(&self, modified: &str) -> bool {
        modified > self.0.as_str()
    }
}

impl std::fmt::Display for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            write!(f, "<none>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_descriptor_from_catalog_json() {
        let json = r#"{
            "identifier": "xubh-q36u",
            "title": "Hospital General Information",
            "theme": ["Hospitals"],
            "modified": "2024-01-02",
            "keyword": ["ignored"],
            "distribution": [
                {"mediaType": "text/csv", "downloadURL": "https://example.test/a.csv"}
            ]
        }"#;

        let d: DatasetDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(d.identifier, "xubh-q36u");
        assert!(d.has_category("Hospitals"));
        assert!(!d.has_category("hospitals"));
        assert_eq!(d.download_url(), Some("https://example.test/a.csv"));
    }

    #[test]
    fn test_descriptor_without_theme_or_distribution() {
        let json = r#"{"identifier": "abc", "modified": "2024-01-02"}"#;
        let d: DatasetDescriptor = serde_json::from_str(json).unwrap();
        assert!(d.theme.is_empty());
        assert_eq!(d.download_url(), None);
    }

    #[test]
    fn test_download_url_skips_distributions_without_url() {
        let json = r#"{
            "identifier": "abc",
            "modified": "2024-01-02",
            "distribution": [{"mediaType": "text/html"}, {"downloadURL": "https://x.test/b.csv"}]
        }"#;
        let d: DatasetDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(d.download_url(), Some("https://x.test/b.csv"));
    }

    #[test]
    fn test_watermark_ordering() {
        let empty = Watermark::empty();
        assert!(empty.admits("2000-01-01"));
        assert!(empty < Watermark::new("0"));

        let w = Watermark::new("2024-01-01T00:00:00Z");
        assert!(w.admits("2024-01-02T00:00:00Z"));
        assert!(!w.admits("2024-01-01T00:00:00Z"));
        assert!(!w.admits("2023-12-31T23:59:59Z"));
    }

    #[test]
    fn test_watermark_from_datetime() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let w = Watermark::from_datetime(at);
        assert_eq!(w.as_str(), "2024-05-01T12:00:00.000000Z");
        assert_eq!(serde_json::to_string(&w).unwrap(), "\"2024-05-01T12:00:00.000000Z\"");
    }
}
