//! Configuration, per-iteration records and results of `Solver::estimate`.

/// Step control for the projected-gradient iteration.
///
/// The step scale `τ` starts at `initial_step` on every call to `estimate`, is
/// multiplied by `backtrack_factor` on each rejected trial and carries over between
/// iterations (it never grows), so accepted steps settle into a monotone decay.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolverCfg {
    pub initial_step: f64,
    pub backtrack_factor: f64,
    pub max_backtracks: usize,
    /// Armijo constant `c` in `Φ(X') ≤ Φ(X) − c·τ·⟨∇Φ, T⟩`.
    pub armijo: f64,
    /// Accept a corrected point when `|H − 1|` is at most this.
    pub feasibility_tol: f64,
    /// Newton corrections along `∇H` when the one-shot correction misses.
    pub newton_corrections: usize,
}

impl Default for SolverCfg {
    fn default() -> Self {
        Self {
            initial_step: 1.0,
            backtrack_factor: 0.5,
            max_backtracks: 40,
            armijo: 1e-4,
            feasibility_tol: 1e-9,
            newton_corrections: 3,
        }
    }
}

/// Per-call parameters of `Solver::estimate`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EstimateCfg {
    pub iterations: usize,
    /// Stop once the largest per-point displacement falls below this.
    pub epsilon: f64,
    /// Log every iteration through `tracing` at INFO level.
    pub verbose: bool,
}

impl Default for EstimateCfg {
    fn default() -> Self {
        Self {
            iterations: 100,
            epsilon: 1e-12,
            verbose: true,
        }
    }
}

/// One accepted update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IterationRecord {
    /// 1-based iteration index within the current `estimate` call.
    pub iteration: usize,
    /// Action of the updated loop (the capacity estimate).
    pub action: f64,
    /// Dual quotient `Φ = F/A` of the updated loop; equals the action at a
    /// closed characteristic.
    pub quotient: f64,
    /// Largest per-point displacement of this update.
    pub step: f64,
    /// Step scale `τ` that was accepted.
    pub scale: f64,
    pub backtracks: usize,
    /// Largest `|H(x_i) − 1|` after the update.
    pub violation: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// Step magnitude fell below epsilon.
    Converged,
    /// The projected gradient vanished; no descent direction.
    Stationary,
    /// Backtracking exhausted without an acceptable trial.
    Stalled,
    /// Iteration budget used up.
    Budget,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Estimate {
    pub capacity: f64,
    /// Accepted updates performed by this call.
    pub iterations: usize,
    pub termination: Termination,
    /// Step magnitude of the last accepted update (`None` if there was none).
    pub last_step: Option<f64>,
}
