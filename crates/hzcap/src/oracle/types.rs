//! Collaborator function types.

use std::fmt;
use std::sync::Arc;

use nalgebra::DVector;

/// Scalar collaborator: `H`.
pub type ValueFn = Arc<dyn Fn(&DVector<f64>) -> f64 + Send + Sync>;
/// Vector collaborator: `∇H` or `∇G`.
pub type GradientFn = Arc<dyn Fn(&DVector<f64>) -> DVector<f64> + Send + Sync>;

/// How `∇G` is obtained; fixed when the oracle is built.
#[derive(Clone)]
pub enum ConjugateGradient {
    /// Caller-supplied analytic `∇G`.
    Analytic(GradientFn),
    /// Invert `∇H` by Newton's method with a centered-difference Jacobian.
    Numeric,
}

impl ConjugateGradient {
    #[inline]
    pub fn is_analytic(&self) -> bool {
        matches!(self, ConjugateGradient::Analytic(_))
    }
}

impl fmt::Debug for ConjugateGradient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConjugateGradient::Analytic(_) => f.write_str("Analytic"),
            ConjugateGradient::Numeric => f.write_str("Numeric"),
        }
    }
}
