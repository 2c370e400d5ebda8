//! Tabular store for OSS PM counter dumps.
//!
//! A dump is a comma-separated file whose first three rows are header and
//! metadata. Row 2 names the columns; counter columns carry a unit suffix in
//! parentheses (e.g. `UEActiveDLAvg(count)`), label columns do not. A dump
//! with exactly three rows has no data. Rows may have different lengths.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use crate::error::PmError;

/// Number of leading header/metadata rows.
pub const HEADER_ROWS: usize = 3;

/// Row index holding the column names.
const COLUMN_NAME_ROW: usize = 2;

static UNIT_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([^)]*\)").expect("unit suffix regex is valid"));

/// Rows of string cells as read from a PM dump.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Loads a delimited file. A missing file is reported as
    /// [`PmError::NotFound`] so callers can skip it.
    ///
    /// A line holding a single empty field (`""`) loads as an empty row,
    /// which is how [`Dataset::write`] encodes one.
    pub fn load(path: &Path) -> Result<Self, PmError> {
        if !path.exists() {
            return Err(PmError::NotFound(path.to_path_buf()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|e| read_error(path, e))?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| read_error(path, e))?;
            if record.len() == 1 && record[0].is_empty() {
                rows.push(Vec::new());
            } else {
                rows.push(record.iter().map(str::to_string).collect());
            }
        }

        Ok(Self { rows })
    }

    /// Writes the rows back as a delimited file.
    pub fn write(&self, path: &Path) -> Result<(), PmError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|e| read_error(path, e))?;
        for row in &self.rows {
            writer.write_record(row).map_err(|e| read_error(path, e))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True when the dump has at least one row past the header block.
    pub fn has_data(&self) -> bool {
        self.rows.len() > HEADER_ROWS
    }

    /// Data rows, i.e. everything after the header block.
    pub fn data_rows(&self) -> &[Vec<String>] {
        self.rows.get(HEADER_ROWS..).unwrap_or(&[])
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col).map(String::as_str)
    }

    /// First cell of the dump; OSS writes the family name there.
    pub fn title(&self) -> Option<&str> {
        self.cell(0, 0)
    }

    /// Number of label columns, i.e. column-name cells without a unit suffix.
    pub fn label_column_count(&self) -> Result<usize, PmError> {
        let names = self.rows.get(COLUMN_NAME_ROW).ok_or_else(|| {
            PmError::parse("column name row", format!("dump has only {} rows", self.len()))
        })?;
        let counters = names.iter().filter(|c| UNIT_SUFFIX.is_match(c)).count();
        Ok(names.len() - counters)
    }
}

fn read_error(path: &Path, err: impl ToString) -> PmError {
    PmError::Read {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Vec<Vec<String>> {
        vec![
            vec!["UECON_AMF".into()],
            vec!["2023-09-23 01:15:00".into(), "2023-09-23 01:30:00".into()],
            vec![
                "NE ID".into(),
                "Location".into(),
                "Attempt(count)".into(),
                "Latency(msec)".into(),
            ],
        ]
    }

    #[test]
    fn test_header_only_dump_has_no_data() {
        let ds = Dataset::from_rows(header());
        assert_eq!(ds.len(), 3);
        assert!(!ds.has_data());
        assert!(ds.data_rows().is_empty());
    }

    #[test]
    fn test_data_rows_skip_header_block() {
        let mut rows = header();
        rows.push(vec!["1".into(), "LOC1".into()]);
        let ds = Dataset::from_rows(rows);
        assert!(ds.has_data());
        assert_eq!(ds.data_rows().len(), 1);
        assert_eq!(ds.cell(3, 1), Some("LOC1"));
        assert_eq!(ds.cell(3, 7), None);
    }

    #[test]
    fn test_write_then_load_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Air_MAC_Packet.csv");
        let ds = Dataset::from_rows(vec![
            vec!["Air MAC Packet".into()],
            vec![],
            vec![],
            vec!["ne1".into(), "".into(), "LOC1".into()],
            vec!["ne2".into(), "gNB, 2".into(), "LOC2".into(), "17".into(), "\"q\"".into()],
        ]);

        ds.write(&path).unwrap();
        let loaded = Dataset::load(&path).unwrap();

        assert_eq!(loaded, ds);
        assert_eq!(loaded.rows()[1], Vec::<String>::new());
        assert_eq!(loaded.cell(4, 1), Some("gNB, 2"));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = Dataset::load(&dir.path().join("absent.csv")).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_label_column_count() {
        let ds = Dataset::from_rows(header());
        assert_eq!(ds.label_column_count().unwrap(), 2);
        assert!(Dataset::default().label_column_count().is_err());
    }

    #[test]
    fn test_title() {
        assert_eq!(Dataset::from_rows(header()).title(), Some("UECON_AMF"));
    }
}
