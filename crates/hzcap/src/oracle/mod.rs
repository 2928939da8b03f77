//! Constraint Oracle: batched evaluation of `H`, `∇H` and `∇G`.
//!
//! Purpose
//! - Wrap the caller's Hamiltonian `H` (with `∂K = {H = 1}`), its gradient, and
//!   optionally the gradient of the convex conjugate `G = H*`.
//! - Evaluate them row by row over an (m × 2n) batch and turn any non-finite or
//!   mis-shaped output into `HzError::NumericFailure` naming the row.
//!
//! Conjugate fallback
//! - Without an analytic `∇G`, `∇G(y)` is the root of `∇H(x) = y` (convex duality),
//!   found by `numeric::newton_root` from the radial guess `s·y`,
//!   `s = |y|² / ⟨∇H(y), y⟩`. It is slower and noisier near the boundary of the
//!   effective domain of `G`; supply `∇G` whenever it is derivable.
//!
//! Assumptions
//! - `H` is positively 2-homogeneous, strictly convex, C¹ away from the origin.
//!   Nothing here checks this.

pub mod special;
mod types;

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use crate::error::{Eval, HzError};
use crate::numeric::{central_gradient, newton_root, RootError};

pub use types::{ConjugateGradient, GradientFn, ValueFn};

#[derive(Clone)]
pub struct ConstraintOracle {
    h: ValueFn,
    dh: GradientFn,
    dg: ConjugateGradient,
}

impl std::fmt::Debug for ConstraintOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintOracle")
            .field("dg", &self.dg)
            .finish_non_exhaustive()
    }
}

impl ConstraintOracle {
    /// Oracle with a numeric `∇G` fallback; add an analytic one with
    /// [`with_conjugate_gradient`](Self::with_conjugate_gradient).
    pub fn new<H, DH>(h: H, dh: DH) -> Self
    where
        H: Fn(&DVector<f64>) -> f64 + Send + Sync + 'static,
        DH: Fn(&DVector<f64>) -> DVector<f64> + Send + Sync + 'static,
    {
        Self {
            h: Arc::new(h),
            dh: Arc::new(dh),
            dg: ConjugateGradient::Numeric,
        }
    }

    pub fn with_conjugate_gradient<DG>(mut self, dg: DG) -> Self
    where
        DG: Fn(&DVector<f64>) -> DVector<f64> + Send + Sync + 'static,
    {
        self.dg = ConjugateGradient::Analytic(Arc::new(dg));
        self
    }

    /// Same body with the numeric `∇G` fallback.
    pub fn without_conjugate_gradient(mut self) -> Self {
        self.dg = ConjugateGradient::Numeric;
        self
    }

    /// Build from shared closures; `dg = None` selects the numeric fallback.
    pub fn from_parts(h: ValueFn, dh: GradientFn, dg: Option<GradientFn>) -> Self {
        let dg = match dg {
            Some(g) => ConjugateGradient::Analytic(g),
            None => ConjugateGradient::Numeric,
        };
        Self { h, dh, dg }
    }

    #[inline]
    pub fn conjugate(&self) -> &ConjugateGradient {
        &self.dg
    }

    /// Oracle of the dilated body `c·K`: `H_c(x) = H(x/c)`, `∇H_c(x) = ∇H(x/c)/c`,
    /// `∇G_c(y) = c·∇G(c·y)`.
    pub fn dilate(&self, c: f64) -> Result<Self, HzError> {
        if !(c.is_finite() && c > 0.0) {
            return Err(HzError::config(format!(
                "dilation factor must be > 0, got {c}"
            )));
        }
        let h = Arc::clone(&self.h);
        let dh = Arc::clone(&self.dh);
        let dg = match &self.dg {
            ConjugateGradient::Analytic(g) => {
                let g = Arc::clone(g);
                ConjugateGradient::Analytic(Arc::new(move |y: &DVector<f64>| g(&(y * c)) * c))
            }
            ConjugateGradient::Numeric => ConjugateGradient::Numeric,
        };
        Ok(Self {
            h: Arc::new(move |x: &DVector<f64>| h(&(x / c))),
            dh: Arc::new(move |x: &DVector<f64>| dh(&(x / c)) / c),
            dg,
        })
    }

    pub fn value_at(&self, x: &DVector<f64>) -> Result<f64, HzError> {
        self.eval_value(x, 0)
    }

    pub fn gradient_at(&self, x: &DVector<f64>) -> Result<DVector<f64>, HzError> {
        self.eval_gradient(x, 0)
    }

    pub fn conjugate_gradient_at(&self, y: &DVector<f64>) -> Result<DVector<f64>, HzError> {
        self.eval_conjugate(y, 0)
    }

    /// `H` at every row.
    pub fn value(&self, points: &DMatrix<f64>) -> Result<DVector<f64>, HzError> {
        let mut out = DVector::zeros(points.nrows());
        for (i, row) in points.row_iter().enumerate() {
            out[i] = self.eval_value(&row.transpose(), i)?;
        }
        Ok(out)
    }

    /// `∇H` at every row.
    pub fn gradient(&self, points: &DMatrix<f64>) -> Result<DMatrix<f64>, HzError> {
        self.map_rows(points, |x, i| self.eval_gradient(x, i))
    }

    /// `∇G` at every row (analytic or numeric, as configured).
    pub fn conjugate_gradient(&self, points: &DMatrix<f64>) -> Result<DMatrix<f64>, HzError> {
        self.map_rows(points, |y, i| self.eval_conjugate(y, i))
    }

    /// Largest deviation between `∇H` and a centered difference of `H` over a batch.
    pub fn gradient_mismatch(&self, points: &DMatrix<f64>) -> Result<f64, HzError> {
        let mut worst = 0.0_f64;
        for (i, row) in points.row_iter().enumerate() {
            let x = row.transpose();
            let analytic = self.eval_gradient(&x, i)?;
            let numeric = central_gradient(|z| (self.h)(z), &x);
            let diff = (analytic - numeric).amax();
            if !diff.is_finite() {
                return Err(HzError::numeric(Eval::Value, i, "non-finite difference quotient"));
            }
            worst = worst.max(diff);
        }
        Ok(worst)
    }

    fn map_rows<F>(&self, points: &DMatrix<f64>, f: F) -> Result<DMatrix<f64>, HzError>
    where
        F: Fn(&DVector<f64>, usize) -> Result<DVector<f64>, HzError>,
    {
        let mut out = DMatrix::zeros(points.nrows(), points.ncols());
        for (i, row) in points.row_iter().enumerate() {
            let v = f(&row.transpose(), i)?;
            out.set_row(i, &v.transpose());
        }
        Ok(out)
    }

    fn eval_value(&self, x: &DVector<f64>, index: usize) -> Result<f64, HzError> {
        let v = (self.h)(x);
        if v.is_finite() {
            Ok(v)
        } else {
            Err(HzError::numeric(Eval::Value, index, format!("H = {v}")))
        }
    }

    fn eval_gradient(&self, x: &DVector<f64>, index: usize) -> Result<DVector<f64>, HzError> {
        check_vector((self.dh)(x), x.len(), Eval::Gradient, index)
    }

    fn eval_conjugate(&self, y: &DVector<f64>, index: usize) -> Result<DVector<f64>, HzError> {
        match &self.dg {
            ConjugateGradient::Analytic(g) => {
                check_vector(g(y), y.len(), Eval::ConjugateGradient, index)
            }
            ConjugateGradient::Numeric => {
                let x = self
                    .numeric_conjugate(y)
                    .map_err(|e| HzError::numeric(Eval::ConjugateGradient, index, e.to_string()))?;
                check_vector(x, y.len(), Eval::ConjugateGradient, index)
            }
        }
    }

    fn numeric_conjugate(&self, y: &DVector<f64>) -> Result<DVector<f64>, RootError> {
        if y.iter().all(|v| *v == 0.0) {
            return Ok(DVector::zeros(y.len()));
        }
        let gy = (self.dh)(y);
        if gy.len() != y.len() {
            return Err(RootError::NonFinite);
        }
        let s = y.norm_squared() / gy.dot(y);
        let guess = if s.is_finite() && s > 0.0 { y * s } else { y.clone() };
        newton_root(|x| (self.dh)(x), y, guess)
    }
}

fn check_vector(
    v: DVector<f64>,
    dim: usize,
    eval: Eval,
    index: usize,
) -> Result<DVector<f64>, HzError> {
    if v.len() != dim {
        return Err(HzError::numeric(
            eval,
            index,
            format!("expected length {dim}, got {}", v.len()),
        ));
    }
    if v.iter().all(|t| t.is_finite()) {
        Ok(v)
    } else {
        Err(HzError::numeric(eval, index, "non-finite component"))
    }
}
