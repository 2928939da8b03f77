//! Tolerance defaults for the numeric helpers (internal).
//!
//! Policy
//! - These are fixed constants, independent of the solver's convergence epsilon.
//!   Solver-facing knobs live in `solver::SolverCfg`.

/// Relative step for centered differences: `h = FD_EPS * max(1, |x_j|)`.
pub(crate) const FD_EPS: f64 = 1e-6;
/// Residual tolerance for the conjugate-gradient Newton root, relative to `max(1, |y|)`.
pub(crate) const NEWTON_TOL: f64 = 1e-12;
/// Iteration cap for the conjugate-gradient Newton root.
pub(crate) const NEWTON_MAX_ITERS: usize = 50;
/// Smallest damping factor tried before a Newton step is taken as is.
pub(crate) const NEWTON_MIN_DAMPING: f64 = 1e-4;
/// Seed for the perturbation of the canonical starting loop.
pub(crate) const START_SEED: u64 = 0;
/// Half-width of the uniform per-coordinate perturbation of the starting loop.
pub(crate) const START_JITTER: f64 = 0.025;
