//! Column layout of OSS PM dumps.
//!
//! Dumps have no self-describing schema; fields are identified by position.
//! This module names those positions and gives bounds-checked accessors so a
//! short row is reported instead of indexing out of range.

use serde::{Deserialize, Serialize};

use crate::error::PmError;
use crate::tabular::{Dataset, HEADER_ROWS};

/// Network-element identity columns shared by all RAN dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityColumns {
    pub ne_id: usize,
    pub ne_name: usize,
    pub init_time: usize,
    pub location: usize,
}

impl Default for IdentityColumns {
    fn default() -> Self {
        Self {
            ne_id: 0,
            ne_name: 2,
            init_time: 3,
            location: 6,
        }
    }
}

/// Two value columns read together: UE average/max for activity dumps,
/// uplink/downlink bytes for MAC packet dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairColumns {
    pub first: usize,
    pub second: usize,
}

impl Default for PairColumns {
    fn default() -> Self {
        Self { first: 7, second: 10 }
    }
}

/// Core (AMF) dump columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreColumns {
    pub attempt: usize,
    pub success: usize,
    pub cache_hit: usize,
    pub ratio: usize,
    /// Message/connection total in AMFTPS and AMFMS dumps.
    pub total: usize,
}

impl Default for CoreColumns {
    fn default() -> Self {
        Self {
            attempt: 7,
            success: 8,
            cache_hit: 9,
            ratio: 18,
            total: 9,
        }
    }
}

/// Complete positional layout used by the correlator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpSchema {
    pub identity: IdentityColumns,
    pub pair: PairColumns,
    pub core: CoreColumns,
}

/// Borrowed data row with its absolute row number.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    pub number: usize,
    cells: &'a [String],
}

impl<'a> Row<'a> {
    pub fn text(&self, col: usize, field: &str) -> Result<&'a str, PmError> {
        self.cells.get(col).map(String::as_str).ok_or_else(|| {
            PmError::parse(
                self.context(field),
                format!("column {} out of range ({} cells)", col, self.cells.len()),
            )
        })
    }

    /// Integer cell. Decimal cells are truncated toward zero; an empty cell is 0.
    pub fn int(&self, col: usize, field: &str) -> Result<i64, PmError> {
        let raw = self.text(col, field)?.trim();
        if raw.is_empty() {
            return Ok(0);
        }
        raw.parse::<i64>()
            .or_else(|_| raw.parse::<f64>().map(|f| f as i64))
            .map_err(|e| PmError::parse(self.context(field), format!("'{raw}': {e}")))
    }

    /// Float cell; an empty cell is 0.
    pub fn float(&self, col: usize, field: &str) -> Result<f64, PmError> {
        let raw = self.text(col, field)?.trim();
        if raw.is_empty() {
            return Ok(0.0);
        }
        raw.parse::<f64>()
            .map_err(|e| PmError::parse(self.context(field), format!("'{raw}': {e}")))
    }

    fn context(&self, field: &str) -> String {
        format!("row {} field '{}'", self.number, field)
    }
}

/// Iterates the data rows of a dump.
pub fn data_rows(dataset: &Dataset) -> impl Iterator<Item = Row<'_>> {
    dataset
        .data_rows()
        .iter()
        .enumerate()
        .map(|(i, cells)| Row {
            number: i + HEADER_ROWS,
            cells,
        })
}
