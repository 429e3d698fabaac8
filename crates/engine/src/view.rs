//! Row view layer
//!
//! Maps between:
//! - View space (what the preview shows, affected by sort/filter)
//! - Data space (dataset row order, row 0..N-1)
//!
//! Key invariants:
//! - Edits address data rows; the cursor addresses visible view positions
//! - visible_mask is indexed by DATA row (not view row)
//! - The view is rebuilt from the full row set, never patched

/// Row view: permutation plus visibility mask
#[derive(Debug, Clone, Default)]
pub struct RowView {
    /// view_row -> data_row
    row_order: Vec<usize>,

    /// Indexed by data row; true = passes all filters
    visible_mask: Vec<bool>,

    /// Data rows in view order, filtered (the rendered list)
    visible_rows: Vec<usize>,
}

impl RowView {
    /// Identity mapping for N rows, all visible
    pub fn new(row_count: usize) -> Self {
        Self {
            row_order: (0..row_count).collect(),
            visible_mask: vec![true; row_count],
            visible_rows: (0..row_count).collect(),
        }
    }

    pub fn visible_count(&self) -> usize {
        self.visible_rows.len()
    }

    /// Data rows in display order, hidden rows skipped
    pub fn visible_rows(&self) -> &[usize] {
        &self.visible_rows
    }

    /// Data row shown at the nth visible position
    pub fn nth_visible(&self, n: usize) -> Option<usize> {
        self.visible_rows.get(n).copied()
    }

    /// Apply a sort permutation (new_view_row -> data_row)
    pub fn apply_sort(&mut self, permutation: Vec<usize>) {
        self.row_order = permutation;
        self.rebuild_visible_cache();
    }

    /// Apply filter visibility (mask indexed by data row)
    pub fn apply_filter(&mut self, visible_mask: Vec<bool>) {
        self.visible_mask = visible_mask;
        self.rebuild_visible_cache();
    }

    fn rebuild_visible_cache(&mut self) {
        let mask = &self.visible_mask;
        self.visible_rows = self
            .row_order
            .iter()
            .copied()
            .filter(|&data_row| mask.get(data_row).copied().unwrap_or(false))
            .collect();
    }
}
