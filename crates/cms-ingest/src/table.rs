//! In-memory CSV table
//!
//! Payloads are small enough (a few MB per CMS dataset) to hold in memory, so
//! a dataset is parsed completely before anything touches the output file.

use cms_common::{IngestError, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::path::Path;

/// Header row plus data rows of a CSV payload
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    headers: StringRecord,
    rows: Vec<StringRecord>,
}

impl Table {
    /// Parse a CSV payload with a header row
    ///
    /// Rows shorter than the header are padded with empty cells. An empty
    /// payload, a row longer than the header or invalid UTF-8 is an
    /// [`IngestError::Parse`].
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let headers = reader
            .headers()
            .map_err(|e| IngestError::parse(e.to_string()))?
            .clone();

        if headers.is_empty() {
            return Err(IngestError::parse("No columns to parse from payload"));
        }

        let width = headers.len();
        let mut rows = Vec::new();
        for record in reader.records() {
            let mut record = record.map_err(|e| IngestError::parse(e.to_string()))?;
            if record.len() > width {
                let line = record.position().map_or(0, |p| p.line());
                return Err(IngestError::parse(format!(
                    "Expected {} fields in line {}, saw {}",
                    width,
                    line,
                    record.len()
                )));
            }
            while record.len() < width {
                record.push_field("");
            }
            rows.push(record);
        }

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.headers.iter()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Replace every column name with `rename(name)`
    pub fn rename_columns<F>(&mut self, rename: F)
    where
        F: Fn(&str) -> String,
    {
        self.headers = self.headers.iter().map(rename).collect();
    }

    /// Write the table to `path`, replacing any existing file
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = WriterBuilder::new().from_path(path).map_err(csv_write_error)?;

        writer.write_record(&self.headers).map_err(csv_write_error)?;
        for row in &self.rows {
            writer.write_record(row).map_err(csv_write_error)?;
        }
        writer.flush()?;

        Ok(())
    }
}

fn csv_write_error(err: csv::Error) -> IngestError {
    match err.into_kind() {
        csv::ErrorKind::Io(io) => IngestError::Io(io),
        other => IngestError::unexpected(format!("CSV write failed: {:?}", other)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::normalize::normalize_column_name;
    use tempfile::TempDir;

    const PAYLOAD: &[u8] = b"Facility ID,Facility Name,City/Town\n\
010001,SOUTHEAST HEALTH MEDICAL CENTER,DOTHAN\n\
010005,\"MARSHALL MEDICAL CENTERS, SOUTH\",BOAZ\n";

    #[test]
    fn test_parse() {
        let table = Table::parse(PAYLOAD).unwrap();
        assert_eq!(
            table.headers().collect::<Vec<_>>(),
            vec!["Facility ID", "Facility Name", "City/Town"]
        );
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_header_only_payload() {
        let table = Table::parse(b"A,B\n").unwrap();
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn test_empty_payload_is_parse_error() {
        let err = Table::parse(b"").unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)));
    }

    #[test]
    fn test_long_row_is_parse_error() {
        let err = Table::parse(b"a,b,c\n1,2,3\n4,5,6,7\n").unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)));
    }

    #[test]
    fn test_short_rows_are_padded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("footnotes.csv");

        let mut table = Table::parse(b"Facility ID,Footnote\n010001\n010005,2\n").unwrap();
        assert_eq!(table.row_count(), 2);

        table.rename_columns(normalize_column_name);
        table.write_csv(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "facility_id,footnote\n010001,\n010005,2\n");
    }

    #[test]
    fn test_invalid_utf8_is_parse_error() {
        let err = Table::parse(b"name\n\xff\xfe\n").unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)));
    }

    #[test]
    fn test_rename_and_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("xubh-q36u.csv");
        std::fs::write(&path, "stale content that must disappear\n").unwrap();

        let mut table = Table::parse(PAYLOAD).unwrap();
        table.rename_columns(normalize_column_name);
        table.write_csv(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let mut lines = written.lines();
        assert_eq!(lines.next(), Some("facility_id,facility_name,citytown"));
        assert_eq!(lines.next(), Some("010001,SOUTHEAST HEALTH MEDICAL CENTER,DOTHAN"));
        assert_eq!(lines.next(), Some("010005,\"MARSHALL MEDICAL CENTERS, SOUTH\",BOAZ"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_write_into_missing_directory_is_io_error() {
        let dir = TempDir::new().unwrap();
        let table = Table::parse(PAYLOAD).unwrap();
        let err = table.write_csv(&dir.path().join("nope").join("a.csv")).unwrap_err();
        assert!(matches!(err, IngestError::Io(_)));
    }
}
