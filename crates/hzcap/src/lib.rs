//! Hofer–Zehnder capacity of convex bodies by discretized loop optimisation.
//!
//! A strictly convex body `K ⊂ R^{2n}` is described by `H` with `∂K = {H = 1}`
//! (positively 2-homogeneous), its gradient, and optionally the gradient of the
//! convex conjugate `G = H*`. The solver moves a closed polygon on `∂K` towards a
//! closed characteristic and reports its symplectic action.
//!
//! Layout
//! - `numeric`: centered differences and a damped Newton root finder.
//! - `symplectic`: the complex structure `J`.
//! - `oracle`: batched `H`/`∇H`/`∇G` evaluation, built-in bodies in `oracle::special`.
//! - `solver`: action functionals, KKT projection, the iteration itself.
//!
//! API Policy
//! - Project-internal; no stable public API.

mod cfg;
pub mod error;
pub mod numeric;
pub mod oracle;
pub mod solver;
pub mod symplectic;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use error::{Eval, HzError};
pub use oracle::ConstraintOracle;
pub use solver::{Estimate, EstimateCfg, Solver, SolverCfg, Termination};

/// Common exports for callers.
pub mod prelude {
    pub use crate::error::{Eval, HzError};
    pub use crate::oracle::special::{
        ellipsoid, ellipsoid_capacity, ellipsoid_numeric, lp_ball, unit_ball,
    };
    pub use crate::oracle::{ConjugateGradient, ConstraintOracle};
    pub use crate::solver::{
        Estimate, EstimateCfg, IterationRecord, NullSink, ProgressSink, Solver, SolverCfg,
        Termination, TracingSink,
    };
    pub use nalgebra::{DMatrix, DVector};
}
