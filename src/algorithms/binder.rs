//! Data binding for the fitting driver.
//!
//! ## Purpose
//!
//! This module materializes the input slots of a built model into a dense
//! row-major design matrix `X` and the target variable into a vector `y`,
//! both restricted to the selected rows.
//!
//! ## Design notes
//!
//! * **Row-major**: The driver evaluates the graph one row at a time, so each
//!   row of `X` is a contiguous slice.
//! * **Indicators**: Factor input slots become `1.0` when the row's category
//!   matches and `0.0` otherwise.
//!
//! ## Invariants
//!
//! * `X` has one row per selected row and one column per input slot.
//! * `y.len()` equals the number of rows of `X`.

use crate::algorithms::builder::InputSlot;
use crate::primitives::errors::FitError;
use crate::tree::dataset::{Dataset, VariableType};

/// Dense row-major matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct RowMatrix {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl RowMatrix {
    /// Wrap row-major data.
    pub fn new(data: Vec<f64>, rows: usize, cols: usize) -> Result<Self, FitError> {
        if data.len() != rows * cols {
            return Err(FitError::ColumnLengthMismatch {
                variable: "X".to_string(),
                expected: rows * cols,
                got: data.len(),
            });
        }
        Ok(Self { data, rows, cols })
    }

    /// Build a matrix from rows of equal length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, FitError> {
        let cols = rows.first().map_or(0, Vec::len);
        let data: Vec<f64> = rows.iter().flatten().copied().collect();
        Self::new(data, rows.len(), cols)
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Row `i` as a slice.
    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }
}

/// Build `X` from input slots and `y` from `target` over `rows`.
pub fn bind<D: Dataset + ?Sized>(
    dataset: &D,
    inputs: &[InputSlot],
    target: &str,
    rows: &[usize],
) -> Result<(RowMatrix, Vec<f64>), FitError> {
    if rows.is_empty() {
        return Err(FitError::EmptyRows);
    }

    let mut data = Vec::with_capacity(rows.len() * inputs.len());
    for &row in rows {
        for slot in inputs {
            data.push(input_value(dataset, slot, row)?);
        }
    }
    let x = RowMatrix::new(data, rows.len(), inputs.len())?;
    let y = dataset.double_values(target, rows)?;
    Ok((x, y))
}

fn input_value<D: Dataset + ?Sized>(
    dataset: &D,
    slot: &InputSlot,
    row: usize,
) -> Result<f64, FitError> {
    let rows = dataset.row_count();
    let lagged = row as i64 + i64::from(slot.lag);
    if lagged < 0 || lagged >= rows as i64 {
        return Err(FitError::RowOutOfRange { row: lagged, rows });
    }
    let row = lagged as usize;

    if let Some(category) = &slot.category {
        let level = dataset.string_value(&slot.variable, row)?;
        return Ok(if level == category { 1.0 } else { 0.0 });
    }

    match (dataset.variable_type(&slot.variable), slot.index) {
        (Some(VariableType::DoubleVector), Some(index)) => {
            let v = dataset.double_vector_value(&slot.variable, row)?;
            v.get(index)
                .copied()
                .ok_or_else(|| FitError::IndexOutOfRange {
                    variable: slot.variable.clone(),
                    index,
                    len: v.len(),
                })
        }
        _ => dataset.double_value(&slot.variable, row),
    }
}
