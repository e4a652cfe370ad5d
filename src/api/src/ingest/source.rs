//! CSV row source and the per-row error type.

use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::rc::Rc;

use super::sanitize::{clean_date, clean_float, clean_int, clean_str, clean_time};
use crate::models::BoundsError;
use chrono::{NaiveDate, NaiveTime};

/// Why a single source row was rejected
#[derive(Debug, thiserror::Error)]
pub enum RowError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error(transparent)]
    OutOfRange(#[from] BoundsError),
    #[error("constraint violation: {0}")]
    Constraint(#[from] rusqlite::Error),
    #[error("malformed record: {0}")]
    Malformed(#[from] csv::Error),
}

/// One CSV data row with header-based field lookup
#[derive(Debug, Clone)]
pub struct RawRow {
    headers: Rc<HashMap<String, usize>>,
    record: StringRecord,
}

impl RawRow {
    /// Build a row from `(column, value)` pairs
    #[cfg(test)]
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let headers = pairs
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (name.to_string(), i))
            .collect();
        Self {
            headers: Rc::new(headers),
            record: pairs.iter().map(|(_, value)| *value).collect(),
        }
    }

    /// Raw cell, `None` when the column is absent
    pub fn get(&self, column: &str) -> Option<&str> {
        self.headers
            .get(column)
            .and_then(|&idx| self.record.get(idx))
    }

    pub fn int(&self, column: &str) -> Option<i64> {
        clean_int(self.get(column))
    }

    pub fn float(&self, column: &str) -> Option<f64> {
        clean_float(self.get(column))
    }

    pub fn text(&self, column: &str) -> Option<String> {
        clean_str(self.get(column))
    }

    pub fn date(&self, column: &str) -> Option<NaiveDate> {
        clean_date(self.get(column))
    }

    pub fn time(&self, column: &str) -> Option<NaiveTime> {
        clean_time(self.get(column))
    }

    pub fn req_int(&self, column: &'static str) -> Result<i64, RowError> {
        self.int(column).ok_or(RowError::MissingField(column))
    }

    pub fn req_text(&self, column: &'static str) -> Result<String, RowError> {
        self.text(column).ok_or(RowError::MissingField(column))
    }

    pub fn req_date(&self, column: &'static str) -> Result<NaiveDate, RowError> {
        self.date(column).ok_or(RowError::MissingField(column))
    }

    pub fn req_time(&self, column: &'static str) -> Result<NaiveTime, RowError> {
        self.time(column).ok_or(RowError::MissingField(column))
    }
}

/// Streaming reader over one tabular source
pub struct RowSource {
    reader: csv::Reader<Box<dyn Read + Send>>,
    headers: Rc<HashMap<String, usize>>,
}

impl RowSource {
    /// Open a CSV file on disk
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open source file {}", path.display()))?;
        Self::from_reader(file)
    }

    /// Wrap any reader (uploaded bodies, test fixtures)
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(Box::new(reader) as Box<dyn Read + Send>);

        let headers = reader
            .headers()
            .context("Failed to read CSV headers")?
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().trim_start_matches('\u{feff}').to_string(), i))
            .collect();

        Ok(Self {
            reader,
            headers: Rc::new(headers),
        })
    }

    /// Next data row; `None` at end of input
    pub fn next_row(&mut self) -> Option<Result<RawRow, csv::Error>> {
        let mut record = StringRecord::new();
        match self.reader.read_record(&mut record) {
            Ok(true) => Some(Ok(RawRow {
                headers: Rc::clone(&self.headers),
                record,
            })),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_row_lookup() {
        let row = RawRow::from_pairs(&[("driverId", "1"), ("number", "\\N"), ("code", "HAM")]);
        assert_eq!(row.get("driverId"), Some("1"));
        assert_eq!(row.int("driverId"), Some(1));
        assert_eq!(row.int("number"), None);
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.text("code"), Some("HAM".to_string()));
    }

    #[test]
    fn test_required_field_errors() {
        let row = RawRow::from_pairs(&[("forename", "\\N")]);
        let err = row.req_text("forename").unwrap_err();
        assert!(matches!(err, RowError::MissingField("forename")));
        assert_eq!(err.to_string(), "missing required field `forename`");
    }

    #[test]
    fn test_row_source_reads_records() {
        let data = "statusId,status\n1,Finished\n2,Disqualified\n";
        let mut source = RowSource::from_reader(data.as_bytes()).unwrap();

        let first = source.next_row().unwrap().unwrap();
        assert_eq!(first.int("statusId"), Some(1));
        assert_eq!(first.text("status"), Some("Finished".to_string()));

        let second = source.next_row().unwrap().unwrap();
        assert_eq!(second.text("status"), Some("Disqualified".to_string()));

        assert!(source.next_row().is_none());
    }

    #[test]
    fn test_short_rows_read_as_missing_columns() {
        let data = "raceId,driverId,lap,position\n841,20,1\n";
        let mut source = RowSource::from_reader(data.as_bytes()).unwrap();
        let row = source.next_row().unwrap().unwrap();
        assert_eq!(row.int("lap"), Some(1));
        assert_eq!(row.get("position"), None);
    }
}
