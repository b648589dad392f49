//! Numeric table with a parallel "is set" mask

use nalgebra::DMatrix;

/// Row-per-timestep, column-per-name numeric storage
///
/// Unset entries hold NaN in `values` but are tracked by `set`, so NaN is
/// never used to decide whether an entry was written.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedTable {
    values: DMatrix<f64>,
    set: DMatrix<bool>,
}

impl MaskedTable {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            values: DMatrix::from_element(rows, cols, f64::NAN),
            set: DMatrix::from_element(rows, cols, false),
        }
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if self.set[(row, col)] {
            Some(self.values[(row, col)])
        } else {
            None
        }
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.values[(row, col)] = value;
        self.set[(row, col)] = true;
    }

    /// Write `value` into every row of `col`
    pub fn fill_column(&mut self, col: usize, value: f64) {
        self.values.column_mut(col).fill(value);
        self.set.column_mut(col).fill(true);
    }

    /// Rows of `col` that were never written, in ascending order
    pub fn unset_rows(&self, col: usize) -> Vec<usize> {
        self.set
            .column(col)
            .iter()
            .enumerate()
            .filter(|(_, is_set)| !**is_set)
            .map(|(row, _)| row)
            .collect()
    }

    /// Values of one row, NaN where unset
    pub fn row_values(&self, row: usize) -> Vec<f64> {
        self.values.row(row).iter().copied().collect()
    }

    pub fn is_complete(&self) -> bool {
        self.set.iter().all(|s| *s)
    }

    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }
}
