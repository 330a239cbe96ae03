//! Linear algebra backend for the damped Gauss–Newton step.
//!
//! ## Purpose
//!
//! This module solves the Levenberg–Marquardt normal equations
//! `(JᵀJ + λ·D) δ = −Jᵀr` on top of nalgebra.
//!
//! ## Design notes
//!
//! * Uses QR decomposition (Householder reflections) instead of Cholesky for better
//!   numerical stability with ill-conditioned systems.
//! * Falls back to SVD for rank-deficient matrices (over-parameterized trees
//!   such as `a·b·x` are common in genetic programming).
//! * Damping is scaled by the diagonal of `JᵀJ` (Marquardt scaling), floored so
//!   that parameters with a zero Jacobian column still receive damping.

use nalgebra::{DMatrix, DVector};

/// Smallest diagonal entry used for Marquardt scaling.
const MIN_DIAGONAL: f64 = 1e-12;

/// Assemble `JᵀJ` and `Jᵀr` from a row-major Jacobian.
pub fn normal_equations(jacobian: &DMatrix<f64>, residuals: &[f64]) -> (DMatrix<f64>, DVector<f64>) {
    let r = DVector::from_column_slice(residuals);
    let jt = jacobian.transpose();
    let jtj = &jt * jacobian;
    let jtr = &jt * r;
    (jtj, jtr)
}

/// Solve `(JᵀJ + λ·diag(JᵀJ)) δ = −Jᵀr` for the step `δ`.
///
/// Returns `None` if neither QR nor SVD produce a finite solution.
pub fn solve_damped(jtj: &DMatrix<f64>, jtr: &DVector<f64>, lambda: f64) -> Option<DVector<f64>> {
    let n = jtj.nrows();
    let mut matrix = jtj.clone();
    for i in 0..n {
        let d = jtj[(i, i)].max(MIN_DIAGONAL);
        matrix[(i, i)] += lambda * d;
    }
    let rhs = -jtr;

    let qr = matrix.clone().qr();
    if let Some(solution) = qr.solve(&rhs) {
        if solution.iter().all(|v| v.is_finite()) {
            return Some(solution);
        }
    }

    matrix
        .svd(true, true)
        .solve(&rhs, f64::EPSILON * 100.0)
        .ok()
        .filter(|s: &DVector<f64>| s.iter().all(|v| v.is_finite()))
}
