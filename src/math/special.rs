//! Special functions and their closed-form derivatives.
//!
//! ## Purpose
//!
//! This module provides the transcendental functions that have no `std`
//! counterpart (error function, standard normal density) together with the
//! derivatives the differentiable graph needs.
//!
//! ## Design notes
//!
//! * **Approximation**: `erf` uses the Chebyshev-fitted complementary error
//!   function with fractional error below 1.2e-7 everywhere.
//! * **Exact derivatives**: Derivatives use the analytic formulas, not the
//!   derivative of the approximation.
//! * **Generics**: Generic over `Float` types.
//!
//! ## Invariants
//!
//! * `erf` is odd and bounded in `[-1, 1]`.
//! * `normal_density` is even and positive.

use num_traits::Float;

#[inline]
fn constant<T: Float>(v: f64) -> T {
    T::from(v).unwrap_or_else(T::nan)
}

/// Complementary error function `1 - erf(x)`.
pub fn erfc<T: Float>(x: T) -> T {
    let z = x.abs();
    let t = T::one() / (T::one() + constant::<T>(0.5) * z);

    const COEFFS: [f64; 9] = [
        1.000_023_68,
        0.374_091_96,
        0.096_784_18,
        -0.186_288_06,
        0.278_868_07,
        -1.135_203_98,
        1.488_515_87,
        -0.822_152_23,
        0.170_872_77,
    ];

    // Horner evaluation from the innermost coefficient outward
    let mut poly = T::zero();
    for &c in COEFFS.iter().rev() {
        poly = t * (constant::<T>(c) + poly);
    }

    let ans = t * (-z * z - constant::<T>(1.265_512_23) + poly).exp();
    if x >= T::zero() {
        ans
    } else {
        constant::<T>(2.0) - ans
    }
}

/// Error function.
#[inline]
pub fn erf<T: Float>(x: T) -> T {
    T::one() - erfc(x)
}

/// Derivative of the error function: `2 e^(-x²) / √π`.
#[inline]
pub fn erf_derivative<T: Float>(x: T) -> T {
    constant::<T>(core::f64::consts::FRAC_2_SQRT_PI) * (-x * x).exp()
}

/// Standard normal probability density.
#[inline]
pub fn normal_density<T: Float>(x: T) -> T {
    let inv_sqrt_2pi = constant::<T>(1.0 / (2.0 * core::f64::consts::PI).sqrt());
    inv_sqrt_2pi * (-(x * x) / constant::<T>(2.0)).exp()
}

/// Derivative of the standard normal density: `-x φ(x)`.
#[inline]
pub fn normal_density_derivative<T: Float>(x: T) -> T {
    -x * normal_density(x)
}

/// Real `n`-th root `x^(1/n)`.
///
/// Negative bases follow `powf` and yield NaN.
#[inline]
pub fn integer_root<T: Float>(x: T, n: i32) -> T {
    x.powf(T::one() / constant::<T>(n as f64))
}

