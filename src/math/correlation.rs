//! Squared Pearson correlation used as the fit quality measure.
//!
//! ## Purpose
//!
//! This module computes the coefficient of determination of a model as the
//! squared Pearson correlation between estimated and observed values.
//!
//! ## Design notes
//!
//! * **Scale-free**: The squared correlation is invariant to affine rescaling
//!   of the estimates, so it needs no explicit linear-scaling step.
//! * **Single pass**: Uses Welford-style running co-moments for numerical
//!   stability.
//! * **Generics**: Generic over `Float` types.
//!
//! ## Invariants
//!
//! * The result, when defined, lies in `[0, 1]`.
//!
//! ## Non-goals
//!
//! * This module does not clamp or sanitize estimates (handled by `evaluation`).

use num_traits::Float;

/// Squared Pearson correlation of `estimated` against `observed`.
///
/// Returns `None` when the inputs are empty, of different length, contain
/// non-finite values, or when either side has zero variance.
pub fn pearson_r_squared<T: Float>(estimated: &[T], observed: &[T]) -> Option<T> {
    if estimated.is_empty() || estimated.len() != observed.len() {
        return None;
    }

    let mut n = T::zero();
    let mut mean_e = T::zero();
    let mut mean_o = T::zero();
    let mut var_e = T::zero();
    let mut var_o = T::zero();
    let mut cov = T::zero();

    for (&e, &o) in estimated.iter().zip(observed) {
        if !e.is_finite() || !o.is_finite() {
            return None;
        }
        n = n + T::one();
        let de = e - mean_e;
        let d_o = o - mean_o;
        mean_e = mean_e + de / n;
        mean_o = mean_o + d_o / n;
        var_e = var_e + de * (e - mean_e);
        var_o = var_o + d_o * (o - mean_o);
        cov = cov + de * (o - mean_o);
    }

    if var_e <= T::zero() || var_o <= T::zero() {
        return None;
    }

    let r = cov / (var_e.sqrt() * var_o.sqrt());
    let r2 = r * r;
    Some(r2.min(T::one()))
}
