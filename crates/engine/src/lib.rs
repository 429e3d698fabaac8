pub mod cell;
pub mod dataset;
pub mod filter;
pub mod grid;
pub mod navigation;
pub mod view;

pub use cell::CellValue;
pub use dataset::{ColumnConfig, Dataset, DatasetError, Row, RowFlags, SortDirection, SortSpec};
pub use filter::{ColumnClass, FilterCondition, FilterKind};
pub use grid::{DatasetStore, Grid, GridError};
