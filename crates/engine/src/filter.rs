//! Filter conditions, column classification and sort keys for the grid.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::cell::CellValue;
use crate::dataset::normalize_header;

/// Header fragments that mark financial (numeric) columns
pub const NUMERIC_COLUMN_KEYS: &[&str] = &["стоимость", "сумма клиента", "доплата", "комиссия", "к выплате"];

/// Header fragment that marks time columns
pub const TIME_COLUMN_KEY: &str = "время";

// =============================================================================
// Column classification
// =============================================================================

/// How a column compares for sorting and range filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnClass {
    Time,
    Numeric,
    Text,
}

impl ColumnClass {
    pub fn classify(header: &str) -> Self {
        let name = normalize_header(header);
        if name.contains(TIME_COLUMN_KEY) {
            ColumnClass::Time
        } else if NUMERIC_COLUMN_KEYS.iter().any(|k| name.contains(k)) {
            ColumnClass::Numeric
        } else {
            ColumnClass::Text
        }
    }
}

// =============================================================================
// SortKey
// =============================================================================

/// Typed key for sorting. Keys of one column always share a variant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortKey {
    Time(NaiveDateTime),
    Number(OrderedFloat<f64>),
    /// Lowercased display text
    Text(String),
}

impl SortKey {
    pub fn from_cell(value: &CellValue, class: ColumnClass) -> Self {
        match class {
            // Unparseable dates sort as the epoch (earliest)
            ColumnClass::Time => SortKey::Time(value.as_date().unwrap_or_default()),
            ColumnClass::Numeric => SortKey::Number(OrderedFloat(value.number_or_zero())),
            ColumnClass::Text => SortKey::Text(value.display().to_lowercase()),
        }
    }
}

/// Compare two cells of a column according to its class
pub fn compare_cells(a: &CellValue, b: &CellValue, class: ColumnClass) -> Ordering {
    SortKey::from_cell(a, class).cmp(&SortKey::from_cell(b, class))
}

// =============================================================================
// FilterCondition
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterKind {
    Contains,
    Equals,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
}

impl FilterKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "contains" => Some(Self::Contains),
            "equals" | "=" => Some(Self::Equals),
            "startswith" => Some(Self::StartsWith),
            "endswith" => Some(Self::EndsWith),
            "greaterthan" | ">" => Some(Self::GreaterThan),
            "lessthan" | "<" => Some(Self::LessThan),
            _ => None,
        }
    }
}

/// Per-column filter predicate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub kind: FilterKind,
    pub value: String,
}

impl FilterCondition {
    pub fn new(kind: FilterKind, value: impl Into<String>) -> Self {
        Self { kind, value: value.into() }
    }

    /// Multi-select: an `equals` condition over a `|`-delimited value set
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined: Vec<String> = values.into_iter().map(|v| v.as_ref().to_string()).collect();
        Self { kind: FilterKind::Equals, value: joined.join("|") }
    }

    pub fn passes(&self, cell: &CellValue, class: ColumnClass) -> bool {
        let text = cell.display().trim().to_lowercase();
        let needle = self.value.trim().to_lowercase();

        match self.kind {
            FilterKind::Contains => text.contains(&needle),
            FilterKind::StartsWith => text.starts_with(&needle),
            FilterKind::EndsWith => text.ends_with(&needle),
            FilterKind::Equals => {
                text == needle
                    || self
                        .value
                        .split('|')
                        .map(|v| v.trim().to_lowercase())
                        .any(|v| v == text)
            }
            FilterKind::GreaterThan | FilterKind::LessThan => {
                let ordering = if class == ColumnClass::Numeric {
                    let (Some(lhs), Some(rhs)) = (cell.as_number(), CellValue::text(needle.as_str()).as_number())
                    else {
                        return false;
                    };
                    lhs.partial_cmp(&rhs)
                } else {
                    Some(text.cmp(&needle))
                };
                match (self.kind, ordering) {
                    (FilterKind::GreaterThan, Some(Ordering::Greater)) => true,
                    (FilterKind::LessThan, Some(Ordering::Less)) => true,
                    _ => false,
                }
            }
        }
    }
}

// =============================================================================
// Unique values (multi-select support)
// =============================================================================

/// Distinct value of a column with its row count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueValueEntry {
    /// Display string from the first-seen cell
    pub display: String,
    pub count: usize,
}

/// Distinct display values (case-insensitive), most frequent first
pub fn unique_values<'a, I>(cells: I) -> Vec<UniqueValueEntry>
where
    I: IntoIterator<Item = &'a CellValue>,
{
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, (String, usize)> = HashMap::new();

    for cell in cells {
        let display = cell.display();
        let key = display.trim().to_lowercase();
        counts
            .entry(key.clone())
            .and_modify(|(_, count)| *count += 1)
            .or_insert_with(|| {
                order.push(key);
                (display, 1)
            });
    }

    let mut entries: Vec<UniqueValueEntry> = order
        .into_iter()
        .filter_map(|k| counts.remove(&k))
        .map(|(display, count)| UniqueValueEntry { display, count })
        .collect();

    // Stable: equal counts keep first-seen order
    entries.sort_by(|a, b| b.count.cmp(&a.count));
    entries
}
