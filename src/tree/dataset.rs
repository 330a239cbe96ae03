//! Dataset access for binding tree variables to data.
//!
//! ## Purpose
//!
//! This module defines the [`Dataset`] trait, the read-only interface through
//! which the interpreter and the data binder access columns, and
//! [`InMemoryDataset`], a column store implementing it.
//!
//! ## Design notes
//!
//! * **Read-only**: Nothing in the crate mutates a dataset.
//! * **Typed columns**: A column holds doubles, strings (factor levels), or
//!   double vectors. Type queries replace runtime type tests.
//!
//! ## Invariants
//!
//! * All columns of an `InMemoryDataset` have the same number of rows.

use crate::primitives::errors::FitError;

/// Storage type of a dataset column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableType {
    /// One `f64` per row.
    Double,
    /// One category label per row.
    String,
    /// One `Vec<f64>` per row.
    DoubleVector,
}

impl VariableType {
    /// Type name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            VariableType::Double => "double",
            VariableType::String => "string",
            VariableType::DoubleVector => "double vector",
        }
    }
}

/// Read access to named dataset columns.
pub trait Dataset {
    /// Number of rows.
    fn row_count(&self) -> usize;

    /// Storage type of a variable, or `None` if it does not exist.
    fn variable_type(&self, variable: &str) -> Option<VariableType>;

    /// Numeric value of a variable at a row.
    fn double_value(&self, variable: &str, row: usize) -> Result<f64, FitError>;

    /// Category label of a variable at a row.
    fn string_value(&self, variable: &str, row: usize) -> Result<&str, FitError>;

    /// Vector value of a variable at a row.
    fn double_vector_value(&self, variable: &str, row: usize) -> Result<&[f64], FitError>;

    /// Whether a variable exists with the given storage type.
    fn has_type(&self, variable: &str, ty: VariableType) -> bool {
        self.variable_type(variable) == Some(ty)
    }

    /// Numeric values of a variable for a set of rows.
    fn double_values(&self, variable: &str, rows: &[usize]) -> Result<Vec<f64>, FitError> {
        rows.iter()
            .map(|&row| self.double_value(variable, row))
            .collect()
    }

    /// Distinct category labels of a string variable, in order of first appearance.
    fn categories(&self, variable: &str) -> Result<Vec<String>, FitError> {
        let mut seen: Vec<String> = Vec::new();
        for row in 0..self.row_count() {
            let value = self.string_value(variable, row)?;
            if !seen.iter().any(|s| s == value) {
                seen.push(value.to_string());
            }
        }
        Ok(seen)
    }
}

// ============================================================================
// In-memory dataset
// ============================================================================

/// Column payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Numeric column.
    Double(Vec<f64>),
    /// Categorical column.
    String(Vec<String>),
    /// Vector-valued column.
    DoubleVector(Vec<Vec<f64>>),
}

impl Column {
    fn len(&self) -> usize {
        match self {
            Column::Double(v) => v.len(),
            Column::String(v) => v.len(),
            Column::DoubleVector(v) => v.len(),
        }
    }

    fn variable_type(&self) -> VariableType {
        match self {
            Column::Double(_) => VariableType::Double,
            Column::String(_) => VariableType::String,
            Column::DoubleVector(_) => VariableType::DoubleVector,
        }
    }
}

/// Column-oriented dataset held in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InMemoryDataset {
    rows: Option<usize>,
    columns: Vec<(String, Column)>,
}

impl InMemoryDataset {
    /// Create an empty dataset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column, replacing any existing column of the same name.
    pub fn insert(&mut self, name: impl Into<String>, column: Column) -> Result<(), FitError> {
        let name = name.into();
        let len = column.len();
        match self.rows {
            Some(rows) if rows != len => {
                return Err(FitError::ColumnLengthMismatch {
                    variable: name,
                    expected: rows,
                    got: len,
                });
            }
            _ => self.rows = Some(len),
        }
        if let Some(slot) = self.columns.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = column;
        } else {
            self.columns.push((name, column));
        }
        Ok(())
    }

    /// Builder-style [`insert`](Self::insert) of a numeric column.
    pub fn with_doubles(mut self, name: impl Into<String>, values: Vec<f64>) -> Result<Self, FitError> {
        self.insert(name, Column::Double(values))?;
        Ok(self)
    }

    /// Builder-style [`insert`](Self::insert) of a categorical column.
    pub fn with_strings<S: Into<String>>(
        mut self,
        name: impl Into<String>,
        values: Vec<S>,
    ) -> Result<Self, FitError> {
        let values = values.into_iter().map(Into::into).collect();
        self.insert(name, Column::String(values))?;
        Ok(self)
    }

    /// Builder-style [`insert`](Self::insert) of a vector-valued column.
    pub fn with_vectors(
        mut self,
        name: impl Into<String>,
        values: Vec<Vec<f64>>,
    ) -> Result<Self, FitError> {
        self.insert(name, Column::DoubleVector(values))?;
        Ok(self)
    }

    fn column(&self, variable: &str) -> Result<&Column, FitError> {
        self.columns
            .iter()
            .find(|(n, _)| n == variable)
            .map(|(_, c)| c)
            .ok_or_else(|| FitError::UnknownVariable(variable.to_string()))
    }

    fn check_row(&self, row: usize) -> Result<(), FitError> {
        let rows = self.row_count();
        if row >= rows {
            return Err(FitError::RowOutOfRange {
                row: row as i64,
                rows,
            });
        }
        Ok(())
    }
}

impl Dataset for InMemoryDataset {
    fn row_count(&self) -> usize {
        self.rows.unwrap_or(0)
    }

    fn variable_type(&self, variable: &str) -> Option<VariableType> {
        self.column(variable).ok().map(Column::variable_type)
    }

    fn double_value(&self, variable: &str, row: usize) -> Result<f64, FitError> {
        self.check_row(row)?;
        match self.column(variable)? {
            Column::Double(values) => Ok(values[row]),
            _ => Err(FitError::VariableTypeMismatch {
                variable: variable.to_string(),
                expected: VariableType::Double.name(),
            }),
        }
    }

    fn string_value(&self, variable: &str, row: usize) -> Result<&str, FitError> {
        self.check_row(row)?;
        match self.column(variable)? {
            Column::String(values) => Ok(values[row].as_str()),
            _ => Err(FitError::VariableTypeMismatch {
                variable: variable.to_string(),
                expected: VariableType::String.name(),
            }),
        }
    }

    fn double_vector_value(&self, variable: &str, row: usize) -> Result<&[f64], FitError> {
        self.check_row(row)?;
        match self.column(variable)? {
            Column::DoubleVector(values) => Ok(values[row].as_slice()),
            _ => Err(FitError::VariableTypeMismatch {
                variable: variable.to_string(),
                expected: VariableType::DoubleVector.name(),
            }),
        }
    }
}
