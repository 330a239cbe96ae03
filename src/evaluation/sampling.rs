//! Row sampling for optimization and evaluation.
//!
//! ## Purpose
//!
//! This module selects a fraction of the training rows without replacement.
//!
//! ## Invariants
//!
//! * At least one row is selected from a non-empty input.
//! * Selected rows are returned in ascending order.
//! * A fraction of `1` returns every row.

use rand::seq::index;
use rand::Rng;

use crate::primitives::errors::FitError;

/// Number of rows a fraction selects from `n`: `⌊fraction · n⌋`, at least one.
pub fn sample_size(fraction: f64, n: usize) -> usize {
    ((fraction * n as f64).floor() as usize).clamp(1, n.max(1))
}

/// Select `⌊fraction · rows.len()⌋` rows without replacement, sorted ascending.
pub fn sample_rows<R: Rng + ?Sized>(
    rows: &[usize],
    fraction: f64,
    rng: &mut R,
) -> Result<Vec<usize>, FitError> {
    if rows.is_empty() {
        return Err(FitError::EmptyRows);
    }
    let count = sample_size(fraction, rows.len());

    let mut selected: Vec<usize> = if count >= rows.len() {
        rows.to_vec()
    } else {
        index::sample(rng, rows.len(), count)
            .into_iter()
            .map(|i| rows[i])
            .collect()
    };
    selected.sort_unstable();
    Ok(selected)
}
