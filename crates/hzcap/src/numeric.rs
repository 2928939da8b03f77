//! Centered finite differences and a damped Newton root finder.
//!
//! Purpose
//! - Back the oracle's fallback for `∇G` when the caller has no analytic conjugate
//!   gradient: `∇G(y)` is the root of `∇H(x) = y`, whose Jacobian we difference.
//! - Provide `central_gradient` to sanity-check user-supplied `∇H` against `H`.
//!
//! Conventions
//! - Step per coordinate is `FD_EPS * max(1, |x_j|)`; the perturbed points are
//!   `x ± h e_j` and the difference quotient is centered.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use crate::cfg::{FD_EPS, NEWTON_MAX_ITERS, NEWTON_MIN_DAMPING, NEWTON_TOL};

#[derive(Clone, Debug, Error, PartialEq)]
pub enum RootError {
    #[error("residual is not finite")]
    NonFinite,
    #[error("finite-difference Jacobian is singular")]
    Singular,
    #[error("no convergence (residual {residual:.3e})")]
    NoConvergence { residual: f64 },
}

#[inline]
fn fd_step(x: f64) -> f64 {
    FD_EPS * x.abs().max(1.0)
}

/// Centered-difference gradient of a scalar function.
pub fn central_gradient<F>(f: F, x: &DVector<f64>) -> DVector<f64>
where
    F: Fn(&DVector<f64>) -> f64,
{
    let mut probe = x.clone();
    DVector::from_fn(x.len(), |j, _| {
        let h = fd_step(x[j]);
        probe[j] = x[j] + h;
        let fp = f(&probe);
        probe[j] = x[j] - h;
        let fm = f(&probe);
        probe[j] = x[j];
        (fp - fm) / (2.0 * h)
    })
}

/// Centered-difference Jacobian of a vector function; column `j` is `∂g/∂x_j`.
pub fn central_jacobian<G>(g: G, x: &DVector<f64>) -> DMatrix<f64>
where
    G: Fn(&DVector<f64>) -> DVector<f64>,
{
    let d = x.len();
    let mut jac = DMatrix::zeros(d, d);
    let mut probe = x.clone();
    for j in 0..d {
        let h = fd_step(x[j]);
        probe[j] = x[j] + h;
        let gp = g(&probe);
        probe[j] = x[j] - h;
        let gm = g(&probe);
        probe[j] = x[j];
        if gp.len() != d || gm.len() != d {
            // Caller-side dimension bug; let the residual check report it.
            return DMatrix::from_element(d, d, f64::NAN);
        }
        jac.set_column(j, &((gp - gm) / (2.0 * h)));
    }
    jac
}

/// Solve `g(x) = target` by Newton's method with a differenced Jacobian.
///
/// Steps are halved until the residual norm decreases (down to `NEWTON_MIN_DAMPING`).
/// Converged when `|g(x) - target| <= NEWTON_TOL * max(1, |target|)`.
pub fn newton_root<G>(
    g: G,
    target: &DVector<f64>,
    guess: DVector<f64>,
) -> Result<DVector<f64>, RootError>
where
    G: Fn(&DVector<f64>) -> DVector<f64>,
{
    let tol = NEWTON_TOL * target.norm().max(1.0);
    let residual = |x: &DVector<f64>| -> Option<DVector<f64>> {
        let gx = g(x);
        (gx.len() == target.len()).then(|| gx - target)
    };
    let mut x = guess;
    let mut r = residual(&x).ok_or(RootError::NonFinite)?;
    let mut res = r.norm();
    for _ in 0..NEWTON_MAX_ITERS {
        if !res.is_finite() {
            return Err(RootError::NonFinite);
        }
        if res <= tol {
            return Ok(x);
        }
        let jac = central_jacobian(&g, &x);
        let dx = jac.lu().solve(&(-&r)).ok_or(RootError::Singular)?;
        let mut t = 1.0;
        loop {
            let cand = &x + &dx * t;
            let rc = residual(&cand).ok_or(RootError::NonFinite)?;
            let rn = rc.norm();
            if rn < res || t < NEWTON_MIN_DAMPING {
                x = cand;
                r = rc;
                res = rn;
                break;
            }
            t *= 0.5;
        }
    }
    if res <= tol {
        Ok(x)
    } else if res.is_finite() {
        Err(RootError::NoConvergence { residual: res })
    } else {
        Err(RootError::NonFinite)
    }
}
