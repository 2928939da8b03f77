//! Capacity Solver: minimise the dual action quotient over loops on `∂K`.
//!
//! Purpose
//! - Own a discretized closed loop `X` (m × 2n) on `{H = 1}` and drive it towards a
//!   closed characteristic; report its action as the HZ capacity estimate.
//!
//! Iteration (one accepted update)
//! - `Φ = F/A` and `∇Φ = (∇F − Φ∇A)/A` (see `action`).
//! - Precondition with the cyclic operator `(L + δI)`, project each row onto the
//!   tangent space of `{H = 1}` (KKT), step by `τ`, correct back onto the level set.
//! - Accept on Armijo decrease of `Φ` with positive action; otherwise halve `τ`.
//!   `τ` persists across iterations of one call and never grows.
//!
//! Guarantees
//! - The loop is replaced only by an accepted, feasible trial. A `NumericFailure`
//!   leaves the last accepted loop in place.
//! - Fully deterministic: the starting perturbation uses a fixed seed.
//!
//! References
//! - Clarke's dual action principle for convex Hamiltonian systems; Ekeland,
//!   "Convexity Methods in Hamiltonian Mechanics", ch. V.

pub mod action;
mod project;
mod sink;
mod types;

use nalgebra::DMatrix;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::cfg::{START_JITTER, START_SEED};
use crate::error::{Eval, HzError};
use crate::oracle::ConstraintOracle;
use crate::symplectic::j_matrix;

use self::action::{action, action_gradient, dual_action, dual_action_gradient};
use self::project::{place_on_level_set, CyclicLaplacian};

pub use project::{correct_onto_level_set, kkt_multipliers, tangent_project};
pub use sink::{NullSink, ProgressSink, TracingSink};
pub use types::{Estimate, EstimateCfg, IterationRecord, SolverCfg, Termination};

#[derive(Clone, Debug)]
pub struct Solver {
    n: usize,
    m: usize,
    oracle: ConstraintOracle,
    cfg: SolverCfg,
    j: DMatrix<f64>,
    precond: CyclicLaplacian,
    points: DMatrix<f64>,
}

enum Outcome {
    Accepted {
        points: DMatrix<f64>,
        record: IterationRecord,
    },
    Stationary,
    Stalled,
}

impl Solver {
    /// Solver for a body in R^{2n} with an m-point loop, default step control.
    pub fn new(n: usize, m: usize, oracle: ConstraintOracle) -> Result<Self, HzError> {
        Self::with_cfg(n, m, oracle, SolverCfg::default())
    }

    pub fn with_cfg(
        n: usize,
        m: usize,
        oracle: ConstraintOracle,
        cfg: SolverCfg,
    ) -> Result<Self, HzError> {
        if n < 1 {
            return Err(HzError::config(format!("half-dimension n must be >= 1, got {n}")));
        }
        if m < 3 {
            return Err(HzError::config(format!("segment count m must be >= 3, got {m}")));
        }
        validate_cfg(&cfg)?;
        let start = canonical_start(n, m);
        let points =
            place_on_level_set(&oracle, &start, cfg.feasibility_tol, cfg.newton_corrections)?;
        Ok(Self {
            n,
            m,
            oracle,
            cfg,
            j: j_matrix(n),
            precond: CyclicLaplacian::for_loop(m),
            points,
        })
    }

    #[inline]
    pub fn half_dim(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn segments(&self) -> usize {
        self.m
    }

    #[inline]
    pub fn cfg(&self) -> &SolverCfg {
        &self.cfg
    }

    #[inline]
    pub fn oracle(&self) -> &ConstraintOracle {
        &self.oracle
    }

    /// Standard complex structure on R^{2n}.
    #[inline]
    pub fn complex_structure(&self) -> &DMatrix<f64> {
        &self.j
    }

    /// Current loop, one row per point.
    #[inline]
    pub fn loop_points(&self) -> &DMatrix<f64> {
        &self.points
    }

    /// Action of the current loop.
    pub fn action(&self) -> f64 {
        action(&self.points)
    }

    /// Dual quotient `Φ = F/A` of the current loop.
    pub fn dual_quotient(&self) -> Result<f64, HzError> {
        Ok(dual_action(&self.points, &self.oracle)? / self.action())
    }

    /// Largest `|H(x_i) − 1|` over the current loop.
    pub fn constraint_violation(&self) -> Result<f64, HzError> {
        let h = self.oracle.value(&self.points)?;
        Ok(h.iter().fold(0.0_f64, |w, v| w.max((v - 1.0).abs())))
    }

    /// Replace the loop. Rows are corrected onto `{H = 1}`; the corrected loop must
    /// be positively oriented (positive action).
    pub fn set_loop(&mut self, points: DMatrix<f64>) -> Result<(), HzError> {
        if points.shape() != (self.m, 2 * self.n) {
            return Err(HzError::config(format!(
                "loop must be {} x {}, got {} x {}",
                self.m,
                2 * self.n,
                points.nrows(),
                points.ncols()
            )));
        }
        let placed = place_on_level_set(
            &self.oracle,
            &points,
            self.cfg.feasibility_tol,
            self.cfg.newton_corrections,
        )?;
        let a = action(&placed);
        if !(a > 0.0) {
            return Err(HzError::config(format!(
                "loop must have positive action after correction, got {a}"
            )));
        }
        self.points = placed;
        Ok(())
    }

    /// Run up to `cfg.iterations` updates and return the action of the final loop.
    /// With `cfg.verbose` every update is logged at INFO level.
    pub fn estimate(&mut self, cfg: EstimateCfg) -> Result<f64, HzError> {
        let est = if cfg.verbose {
            self.estimate_with(cfg, &mut TracingSink)?
        } else {
            self.estimate_with(cfg, &mut NullSink)?
        };
        Ok(est.capacity)
    }

    /// As [`estimate`](Self::estimate), handing every record to `sink` and reporting
    /// why the iteration stopped.
    pub fn estimate_with<S>(&mut self, cfg: EstimateCfg, sink: &mut S) -> Result<Estimate, HzError>
    where
        S: ProgressSink + ?Sized,
    {
        if !(cfg.epsilon.is_finite() && cfg.epsilon >= 0.0) {
            return Err(HzError::config(format!(
                "epsilon must be finite and >= 0, got {}",
                cfg.epsilon
            )));
        }
        let mut tau = self.cfg.initial_step;
        let mut done = 0;
        let mut last_step = None;
        let mut termination = Termination::Budget;
        for it in 1..=cfg.iterations {
            match self.iterate(&mut tau)? {
                Outcome::Accepted { points, mut record } => {
                    record.iteration = it;
                    self.points = points;
                    done = it;
                    last_step = Some(record.step);
                    sink.record(&record);
                    if record.step < cfg.epsilon {
                        termination = Termination::Converged;
                        break;
                    }
                }
                Outcome::Stationary => {
                    termination = Termination::Stationary;
                    break;
                }
                Outcome::Stalled => {
                    termination = Termination::Stalled;
                    break;
                }
            }
        }
        let capacity = self.action();
        tracing::debug!(?termination, iterations = done, capacity, "hz_estimate_done");
        Ok(Estimate {
            capacity,
            iterations: done,
            termination,
            last_step,
        })
    }

    fn iterate(&self, tau: &mut f64) -> Result<Outcome, HzError> {
        let x = &self.points;
        let a = action(x);
        if !(a > 0.0) {
            return Err(HzError::numeric(Eval::Action, 0, format!("action = {a}")));
        }
        let (f, grad_f) = dual_action_gradient(x, &self.oracle)?;
        let phi = f / a;
        let grad_phi = (grad_f - action_gradient(x) * phi) / a;
        let normals = self.oracle.gradient(x)?;

        let mut dir = tangent_project(&self.precond.solve(&grad_phi), &normals);
        let mut slope = grad_phi.dot(&dir);
        if !(slope > 0.0) {
            // Preconditioned step lost descent after projection; use the plain one.
            dir = tangent_project(&grad_phi, &normals);
            slope = grad_phi.dot(&dir);
        }
        if !(slope > 0.0 && slope.is_finite()) || dir.amax() == 0.0 {
            return Ok(Outcome::Stationary);
        }

        for backtracks in 0..=self.cfg.max_backtracks {
            let trial = x - &dir * *tau;
            if let Some((next, violation)) = correct_onto_level_set(
                &self.oracle,
                &trial,
                self.cfg.feasibility_tol,
                self.cfg.newton_corrections,
            )? {
                let a_next = action(&next);
                if a_next > 0.0 {
                    let phi_next = dual_action(&next, &self.oracle)? / a_next;
                    if phi_next <= phi - self.cfg.armijo * *tau * slope {
                        let step = max_row_norm(&(&next - x));
                        let record = IterationRecord {
                            iteration: 0,
                            action: a_next,
                            quotient: phi_next,
                            step,
                            scale: *tau,
                            backtracks,
                            violation,
                        };
                        return Ok(Outcome::Accepted {
                            points: next,
                            record,
                        });
                    }
                }
            }
            tracing::debug!(backtracks, tau = *tau, "hz_trial_rejected");
            if backtracks < self.cfg.max_backtracks {
                *tau *= self.cfg.backtrack_factor;
            }
        }
        Ok(Outcome::Stalled)
    }
}

fn validate_cfg(cfg: &SolverCfg) -> Result<(), HzError> {
    if !(cfg.initial_step.is_finite() && cfg.initial_step > 0.0) {
        return Err(HzError::config(format!(
            "initial_step must be > 0, got {}",
            cfg.initial_step
        )));
    }
    if !(cfg.backtrack_factor > 0.0 && cfg.backtrack_factor < 1.0) {
        return Err(HzError::config(format!(
            "backtrack_factor must lie in (0, 1), got {}",
            cfg.backtrack_factor
        )));
    }
    if !(cfg.armijo >= 0.0 && cfg.armijo < 1.0) {
        return Err(HzError::config(format!("armijo must lie in [0, 1), got {}", cfg.armijo)));
    }
    if !(cfg.feasibility_tol.is_finite() && cfg.feasibility_tol > 0.0) {
        return Err(HzError::config(format!(
            "feasibility_tol must be > 0, got {}",
            cfg.feasibility_tol
        )));
    }
    Ok(())
}

/// Perturbed great circle spread over all n symplectic planes, before correction.
///
/// Plane k carries `w_k (cos θ_i, sin θ_i)` with `w_k = 1/√(k+1)`, so the starting
/// loop is not an eigenloop of any particular body; every coordinate gets a seeded
/// uniform jitter of half-width `START_JITTER`.
fn canonical_start(n: usize, m: usize) -> DMatrix<f64> {
    let mut rng = StdRng::seed_from_u64(START_SEED);
    let mut x = DMatrix::zeros(m, 2 * n);
    for i in 0..m {
        let theta = 2.0 * std::f64::consts::PI * i as f64 / m as f64;
        for k in 0..n {
            let w = 1.0 / ((k + 1) as f64).sqrt();
            x[(i, k)] = w * theta.cos() + rng.gen_range(-START_JITTER..START_JITTER);
            x[(i, n + k)] = w * theta.sin() + rng.gen_range(-START_JITTER..START_JITTER);
        }
    }
    x
}

#[inline]
fn max_row_norm(d: &DMatrix<f64>) -> f64 {
    d.row_iter().map(|r| r.norm()).fold(0.0, f64::max)
}

#[cfg(test)]
mod tests;
