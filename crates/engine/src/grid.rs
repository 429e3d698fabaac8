//! Grid engine: sort, filter and inline edit over a transformed dataset.
//!
//! The grid never removes rows. Sorting and filtering only rebuild the
//! `RowView`; edits write through to the dataset and the store.

use std::collections::BTreeMap;
use std::fmt;

use crate::cell::CellValue;
use crate::dataset::{Dataset, DatasetError, SortDirection, SortSpec};
use crate::filter::{compare_cells, unique_values, ColumnClass, FilterCondition, UniqueValueEntry};
use crate::navigation::{Cursor, EditBuffer};
use crate::view::RowView;

/// Sink that persists the dataset after every committed edit
pub trait DatasetStore {
    fn save(&mut self, dataset: &Dataset) -> Result<(), String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    UnknownColumn(String),
    Dataset(DatasetError),
    Store(String),
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownColumn(c) => write!(f, "unknown column: {c}"),
            Self::Dataset(e) => write!(f, "{e}"),
            Self::Store(e) => write!(f, "failed to persist dataset: {e}"),
        }
    }
}

impl std::error::Error for GridError {}

impl From<DatasetError> for GridError {
    fn from(e: DatasetError) -> Self {
        GridError::Dataset(e)
    }
}

pub struct Grid {
    dataset: Dataset,
    sort: Option<SortSpec>,
    /// Keyed by column; BTreeMap keeps listing order stable
    filters: BTreeMap<String, FilterCondition>,
    view: RowView,
    pub(crate) cursor: Cursor,
    pub(crate) edit: Option<EditBuffer>,
    store: Option<Box<dyn DatasetStore>>,
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grid")
            .field("rows", &self.dataset.len())
            .field("sort", &self.sort)
            .field("filters", &self.filters)
            .field("cursor", &self.cursor)
            .field("editing", &self.edit.is_some())
            .finish()
    }
}

impl Grid {
    pub fn new(dataset: Dataset) -> Self {
        let sort = dataset.initial_sort.clone();
        let mut grid = Self {
            view: RowView::new(dataset.len()),
            dataset,
            sort,
            filters: BTreeMap::new(),
            cursor: Cursor::default(),
            edit: None,
            store: None,
        };
        grid.rebuild_view();
        grid
    }

    pub fn with_store(mut self, store: Box<dyn DatasetStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn headers(&self) -> &[String] {
        self.dataset.headers()
    }

    pub fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    pub fn filters(&self) -> impl Iterator<Item = (&str, &FilterCondition)> {
        self.filters.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn view(&self) -> &RowView {
        &self.view
    }

    /// Data row indices in display order (filtered, sorted)
    pub fn visible_rows(&self) -> &[usize] {
        self.view.visible_rows()
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn is_editing(&self) -> bool {
        self.edit.is_some()
    }

    pub fn edit_text(&self) -> Option<&str> {
        self.edit.as_ref().map(|e| e.text.as_str())
    }

    fn require_column(&self, column: &str) -> Result<(), GridError> {
        if self.dataset.has_column(column) {
            Ok(())
        } else {
            Err(GridError::UnknownColumn(column.to_string()))
        }
    }

    /// Sort by `column`; a second call on the same column flips direction
    pub fn apply_sort(&mut self, column: &str) -> Result<SortSpec, GridError> {
        self.require_column(column)?;
        let direction = match &self.sort {
            Some(current) if current.column == column => current.direction.toggled(),
            _ => SortDirection::Ascending,
        };
        let spec = SortSpec { column: column.to_string(), direction };
        log::debug!("grid sort: {} {:?}", spec.column, spec.direction);
        self.sort = Some(spec.clone());
        self.rebuild_view();
        Ok(spec)
    }

    /// Set the column's filter, replacing any previous one
    pub fn apply_filter(&mut self, column: &str, condition: FilterCondition) -> Result<(), GridError> {
        self.require_column(column)?;
        log::debug!("grid filter: {column} {:?} {:?}", condition.kind, condition.value);
        self.filters.insert(column.to_string(), condition);
        self.rebuild_view();
        Ok(())
    }

    pub fn clear_filter(&mut self, column: &str) {
        if self.filters.remove(column).is_some() {
            self.rebuild_view();
        }
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
        self.rebuild_view();
    }

    /// Overwrite one cell of a data row. Flags stay as they are.
    /// Returns the previous value.
    pub fn edit_cell(&mut self, data_row: usize, column: &str, input: &str) -> Result<CellValue, GridError> {
        self.require_column(column)?;
        let value = match ColumnClass::classify(column) {
            ColumnClass::Numeric => CellValue::from_input(input),
            _ if input.trim().is_empty() => CellValue::Empty,
            _ => CellValue::text(input),
        };

        let previous = self.dataset.row_mut(data_row)?.set(column, value);
        log::debug!("grid edit: row {data_row} column {column}");

        if let Some(store) = self.store.as_mut() {
            if let Err(e) = store.save(&self.dataset) {
                // Not persisted: put the old value back
                self.dataset.row_mut(data_row)?.set(column, previous);
                return Err(GridError::Store(e));
            }
        }
        self.rebuild_view();
        Ok(previous)
    }

    pub fn unique_values(&self, column: &str) -> Result<Vec<UniqueValueEntry>, GridError> {
        self.require_column(column)?;
        Ok(unique_values(self.dataset.rows().iter().map(|r| r.get(column))))
    }

    /// Rebuild sort permutation and filter mask from the full row set
    fn rebuild_view(&mut self) {
        let rows = self.dataset.rows();
        let mut view = RowView::new(rows.len());

        if let Some(spec) = &self.sort {
            let class = ColumnClass::classify(&spec.column);
            let mut order: Vec<usize> = (0..rows.len()).collect();
            order.sort_by(|&a, &b| {
                let ord = compare_cells(rows[a].get(&spec.column), rows[b].get(&spec.column), class);
                match spec.direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                }
            });
            view.apply_sort(order);
        }

        if !self.filters.is_empty() {
            let conditions: Vec<(&str, ColumnClass, &FilterCondition)> = self
                .filters
                .iter()
                .map(|(col, cond)| (col.as_str(), ColumnClass::classify(col), cond))
                .collect();
            let mask = rows
                .iter()
                .map(|row| conditions.iter().all(|(col, class, cond)| cond.passes(row.get(col), *class)))
                .collect();
            view.apply_filter(mask);
        }

        self.view = view;
        self.clamp_cursor();
    }

    pub(crate) fn clamp_cursor(&mut self) {
        let rows = self.view.visible_count();
        let cols = self.dataset.headers().len();
        self.cursor.row = self.cursor.row.min(rows.saturating_sub(1));
        self.cursor.col = self.cursor.col.min(cols.saturating_sub(1));
    }
}
