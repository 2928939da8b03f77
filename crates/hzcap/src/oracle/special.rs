//! Fixed oracle instances for bodies with known derivatives.
//!
//! - `unit_ball`: `H = |x|²`, `∇H = 2x`, `∇G(y) = y/2`; capacity π.
//! - `ellipsoid`: `H = Σ_k (q_k² + p_k²)/a_k²`; capacity `π·min_k a_k²`.
//! - `lp_ball`: `H = ‖x‖_p²`, conjugate `G = ‖y‖_q²/4` with `1/p + 1/q = 1`.
//!
//! All three are 2-homogeneous with analytic `∇G`. Closures return NaN (or an
//! empty vector) on dimension mismatch so the oracle reports a `NumericFailure`.

use std::f64::consts::PI;

use nalgebra::DVector;

use super::ConstraintOracle;
use crate::error::HzError;

/// Euclidean unit ball in any dimension.
pub fn unit_ball() -> ConstraintOracle {
    ConstraintOracle::new(|x: &DVector<f64>| x.norm_squared(), |x: &DVector<f64>| x * 2.0)
        .with_conjugate_gradient(|y: &DVector<f64>| y * 0.5)
}

/// Ellipsoid with semi-axis `a_k` in the (q_k, p_k) plane.
pub fn ellipsoid(axes: &[f64]) -> Result<ConstraintOracle, HzError> {
    let w = ellipsoid_weights(axes)?;
    let (w_h, w_dh, w_dg) = (w.clone(), w.clone(), w);
    Ok(ConstraintOracle::new(
        move |x: &DVector<f64>| {
            if x.len() != w_h.len() {
                return f64::NAN;
            }
            x.component_mul(x).dot(&w_h)
        },
        move |x: &DVector<f64>| {
            if x.len() != w_dh.len() {
                return DVector::zeros(0);
            }
            x.component_mul(&w_dh) * 2.0
        },
    )
    .with_conjugate_gradient(move |y: &DVector<f64>| {
        if y.len() != w_dg.len() {
            return DVector::zeros(0);
        }
        y.component_div(&w_dg) * 0.5
    }))
}

/// Same ellipsoid with the numeric `∇G` fallback.
pub fn ellipsoid_numeric(axes: &[f64]) -> Result<ConstraintOracle, HzError> {
    Ok(ellipsoid(axes)?.without_conjugate_gradient())
}

/// Capacity of the ellipsoid with semi-axes `axes`: `π · min a_k²`.
pub fn ellipsoid_capacity(axes: &[f64]) -> f64 {
    let a = axes.iter().copied().fold(f64::INFINITY, f64::min);
    PI * a * a
}

fn ellipsoid_weights(axes: &[f64]) -> Result<DVector<f64>, HzError> {
    if axes.is_empty() {
        return Err(HzError::config("ellipsoid needs at least one semi-axis"));
    }
    if let Some(a) = axes.iter().find(|a| !(a.is_finite() && **a > 0.0)) {
        return Err(HzError::config(format!("semi-axes must be > 0, got {a}")));
    }
    let n = axes.len();
    Ok(DVector::from_fn(2 * n, |j, _| {
        let a = axes[j % n];
        1.0 / (a * a)
    }))
}

/// Unit ball of the ℓ^p norm, `H = ‖x‖_p²`, for `p > 1`.
pub fn lp_ball(p: f64) -> Result<ConstraintOracle, HzError> {
    if !(p.is_finite() && p > 1.0) {
        return Err(HzError::config(format!("lp_ball needs p > 1, got {p}")));
    }
    let q = p / (p - 1.0);
    Ok(ConstraintOracle::new(
        move |x: &DVector<f64>| power_sum(x, p).powf(2.0 / p),
        move |x: &DVector<f64>| scaled_signed_power(x, p, 2.0),
    )
    .with_conjugate_gradient(move |y: &DVector<f64>| scaled_signed_power(y, q, 0.5)))
}

#[inline]
fn power_sum(x: &DVector<f64>, p: f64) -> f64 {
    x.iter().map(|t| t.abs().powf(p)).sum()
}

/// `c · S^{2/p - 1} · |x_j|^{p-1} sign(x_j)` with `S = Σ|x_j|^p`; zero at the origin.
fn scaled_signed_power(x: &DVector<f64>, p: f64, c: f64) -> DVector<f64> {
    let s = power_sum(x, p);
    if s == 0.0 {
        return DVector::zeros(x.len());
    }
    let k = c * s.powf(2.0 / p - 1.0);
    x.map(|t| k * t.abs().powf(p - 1.0) * t.signum())
}
