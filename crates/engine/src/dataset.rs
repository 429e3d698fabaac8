//! Tabular data model shared by the pipeline, the grid and the exporters.
//!
//! Rows are keyed by column name; the dataset header list fixes the column
//! order. Every row answers for every header (absent cells read as
//! `CellValue::Empty`).

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cell::CellValue;

static EMPTY: CellValue = CellValue::Empty;

/// Derived per-row markers. Set by the transformation pipeline, never by edits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowFlags {
    /// Cash ride settled under the Sapsan account
    pub sapsan: bool,
    /// Fare validation failed; needs manual review
    pub value_error: bool,
    /// City could not be resolved from the address
    pub address_error: bool,
    /// Fees were already moved from cost to the extra-payment column
    pub fee_adjusted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    cells: HashMap<String, CellValue>,
    #[serde(default)]
    pub flags: RowFlags,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cells<I, K>(cells: I) -> Self
    where
        I: IntoIterator<Item = (K, CellValue)>,
        K: Into<String>,
    {
        Self {
            cells: cells.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            flags: RowFlags::default(),
        }
    }

    pub fn get(&self, column: &str) -> &CellValue {
        self.cells.get(column).unwrap_or(&EMPTY)
    }

    pub fn set(&mut self, column: impl Into<String>, value: CellValue) -> CellValue {
        self.cells.insert(column.into(), value).unwrap_or_default()
    }

    /// Display text of a cell ("" when absent)
    pub fn text(&self, column: &str) -> String {
        self.get(column).display()
    }

    fn fill_missing(&mut self, headers: &[String]) {
        for header in headers {
            self.cells.entry(header.clone()).or_default();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

/// One step of the column mapper: source column → output column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub source_id: String,
    pub display_name: String,
    pub visible: bool,
}

impl ColumnConfig {
    pub fn new(source_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self { source_id: source_id.into(), display_name: display_name.into(), visible: true }
    }

    /// Identity mapping for every header, all visible
    pub fn identity(headers: &[String]) -> Vec<ColumnConfig> {
        headers.iter().map(|h| ColumnConfig::new(h.clone(), h.clone())).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetError {
    DuplicateHeader(String),
    RowOutOfRange { row: usize, rows: usize },
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateHeader(h) => write!(f, "duplicate column header: {h}"),
            Self::RowOutOfRange { row, rows } => {
                write!(f, "row {row} out of range (dataset has {rows} rows)")
            }
        }
    }
}

impl std::error::Error for DatasetError {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Row>,
    #[serde(default)]
    pub initial_sort: Option<SortSpec>,
}

impl Dataset {
    pub fn new(headers: Vec<String>) -> Result<Self, DatasetError> {
        let mut seen = HashSet::new();
        for h in &headers {
            if !seen.insert(h.as_str()) {
                return Err(DatasetError::DuplicateHeader(h.clone()));
            }
        }
        Ok(Self { headers, rows: Vec::new(), initial_sort: None })
    }

    pub fn with_rows(headers: Vec<String>, rows: Vec<Row>) -> Result<Self, DatasetError> {
        let mut dataset = Self::new(headers)?;
        for row in rows {
            dataset.push_row(row);
        }
        Ok(dataset)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Row] {
        &mut self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn row_mut(&mut self, index: usize) -> Result<&mut Row, DatasetError> {
        let rows = self.rows.len();
        self.rows.get_mut(index).ok_or(DatasetError::RowOutOfRange { row: index, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, mut row: Row) {
        row.fill_missing(&self.headers);
        self.rows.push(row);
    }

    /// Reorder rows with a stable comparator
    pub fn sort_rows_by<F>(&mut self, compare: F)
    where
        F: FnMut(&Row, &Row) -> std::cmp::Ordering,
    {
        self.rows.sort_by(compare);
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    /// First header whose normalized name contains `needle`
    pub fn column_containing(&self, needle: &str) -> Option<&str> {
        find_header(&self.headers, |h| h.contains(&normalize_header(needle)))
    }

    /// Append rows of another dataset, mapping cells by header name
    pub fn extend_from(&mut self, other: &Dataset) {
        for row in other.rows() {
            let mut merged = Row::new();
            merged.flags = row.flags;
            for header in &self.headers {
                merged.set(header.clone(), row.get(header).clone());
            }
            self.rows.push(merged);
        }
    }
}

/// Lookup key for header matching: trimmed, lowercase, `ё` folded to `е`
pub fn normalize_header(name: &str) -> String {
    name.trim().to_lowercase().replace('ё', "е")
}

pub fn find_header<'a, P>(headers: &'a [String], predicate: P) -> Option<&'a str>
where
    P: Fn(&str) -> bool,
{
    headers
        .iter()
        .find(|h| predicate(&normalize_header(h)))
        .map(|h| h.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_duplicate_header_rejected() {
        let err = Dataset::new(headers(&["Адрес", "Адрес"])).unwrap_err();
        assert_eq!(err, DatasetError::DuplicateHeader("Адрес".into()));
    }

    #[test]
    fn test_rows_answer_for_every_header() {
        let mut ds = Dataset::new(headers(&["Номер заказа", "Адрес"])).unwrap();
        ds.push_row(Row::from_cells([("Номер заказа", CellValue::Number(1.0))]));
        assert_eq!(ds.rows()[0].get("Адрес"), &CellValue::Empty);
        assert_eq!(ds.rows()[0].get("Нет такой"), &CellValue::Empty);
    }

    #[test]
    fn test_column_lookup_is_normalized() {
        let ds = Dataset::new(headers(&["Время заказа", "Парк партнёр", "Клиент"])).unwrap();
        assert_eq!(ds.column_containing("время заказа"), Some("Время заказа"));
        assert_eq!(ds.column_containing("парк партнер"), Some("Парк партнёр"));
    }

    #[test]
    fn test_extend_from_maps_by_header() {
        let mut spb = Dataset::new(headers(&["A", "B"])).unwrap();
        spb.push_row(Row::from_cells([("A", CellValue::text("spb"))]));
        let mut msk = Dataset::new(headers(&["B", "A", "C"])).unwrap();
        msk.push_row(Row::from_cells([("A", CellValue::text("msk")), ("C", CellValue::text("x"))]));

        spb.extend_from(&msk);
        assert_eq!(spb.len(), 2);
        assert_eq!(spb.rows()[1].text("A"), "msk");
        assert_eq!(spb.rows()[1].get("C"), &CellValue::Empty);
    }

    #[test]
    fn test_json_roundtrip_keeps_flags() {
        let mut ds = Dataset::new(headers(&["A"])).unwrap();
        let mut row = Row::from_cells([("A", CellValue::Number(3.0))]);
        row.flags.sapsan = true;
        ds.push_row(row);
        ds.initial_sort = Some(SortSpec { column: "A".into(), direction: SortDirection::Ascending });

        let json = serde_json::to_string(&ds).unwrap();
        let back: Dataset = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ds);
    }
}
