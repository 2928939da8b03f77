//! Preconditioning, tangent projection and the level-set correction.
//!
//! KKT step per point (the constraint `H(x_i) = 1` couples nothing across points):
//! - direction `d_i` (preconditioned `∇Φ`), normal `n_i = ∇H(x_i)`;
//! - multiplier `λ_i = −⟨d_i, n_i⟩ / |n_i|²`, tangent step `t_i = d_i + λ_i n_i`;
//! - trial `p_i = x_i − τ t_i`, corrected in one shot to `p_i / √H(p_i)`, which lands
//!   on `{H = 1}` exactly when `H` is 2-homogeneous (Euler/duality). A bounded number
//!   of Newton corrections along `∇H` covers the remaining cases.

use nalgebra::{DMatrix, DVector};

use crate::error::{Eval, HzError};
use crate::oracle::ConstraintOracle;

/// Factored cyclic tridiagonal operator `L + δI` with `L` the cyclic second
/// difference (2 on the diagonal, −1 on both cyclic neighbours).
///
/// Thomas elimination plus a Sherman–Morrison rank-one fix for the two corner
/// entries; factorization once, O(m) per right-hand side.
#[derive(Clone, Debug)]
pub(crate) struct CyclicLaplacian {
    off: f64,
    gamma: f64,
    c_prime: Vec<f64>,
    denom: Vec<f64>,
    z: Vec<f64>,
    sm_denom: f64,
}

impl CyclicLaplacian {
    pub(crate) fn new(m: usize, shift: f64) -> Self {
        debug_assert!(m >= 3, "cyclic system needs m >= 3");
        let diag = 2.0 + shift;
        let off = -1.0;
        let gamma = -diag;
        let mut denom = vec![0.0; m];
        let mut c_prime = vec![0.0; m];
        for i in 0..m {
            let b = if i == 0 {
                diag - gamma
            } else if i == m - 1 {
                diag - off * off / gamma
            } else {
                diag
            };
            denom[i] = if i == 0 { b } else { b - off * c_prime[i - 1] };
            c_prime[i] = off / denom[i];
        }
        let mut this = Self {
            off,
            gamma,
            c_prime,
            denom,
            z: Vec::new(),
            sm_denom: 1.0,
        };
        let mut u = vec![0.0; m];
        u[0] = gamma;
        u[m - 1] = off;
        let z = this.thomas(&u);
        this.sm_denom = 1.0 + z[0] + off * z[m - 1] / gamma;
        this.z = z;
        this
    }

    /// Default shift for an m-gon: `(2π/m)²`, the first Fourier eigenvalue of `L`.
    pub(crate) fn for_loop(m: usize) -> Self {
        let k = 2.0 * std::f64::consts::PI / m as f64;
        Self::new(m, k * k)
    }

    fn thomas(&self, rhs: &[f64]) -> Vec<f64> {
        let m = rhs.len();
        let mut x = vec![0.0; m];
        x[0] = rhs[0] / self.denom[0];
        for i in 1..m {
            x[i] = (rhs[i] - self.off * x[i - 1]) / self.denom[i];
        }
        for i in (0..m - 1).rev() {
            x[i] -= self.c_prime[i] * x[i + 1];
        }
        x
    }

    /// Solve column by column.
    pub(crate) fn solve(&self, rhs: &DMatrix<f64>) -> DMatrix<f64> {
        let m = rhs.nrows();
        let mut out = DMatrix::zeros(m, rhs.ncols());
        for (j, col) in rhs.column_iter().enumerate() {
            let y = self.thomas(col.as_slice());
            let fact = (y[0] + self.off * y[m - 1] / self.gamma) / self.sm_denom;
            for i in 0..m {
                out[(i, j)] = y[i] - fact * self.z[i];
            }
        }
        out
    }
}

#[inline]
fn row_dots(a: &DMatrix<f64>, b: &DMatrix<f64>) -> DVector<f64> {
    DVector::from_iterator(
        a.nrows(),
        a.row_iter().zip(b.row_iter()).map(|(x, y)| x.dot(&y)),
    )
}

/// KKT multipliers `λ_i = −⟨d_i, n_i⟩ / |n_i|²`.
pub fn kkt_multipliers(direction: &DMatrix<f64>, normals: &DMatrix<f64>) -> DVector<f64> {
    let num = row_dots(direction, normals);
    let den = row_dots(normals, normals);
    num.zip_map(&den, |a, b| if b > 0.0 { -a / b } else { 0.0 })
}

/// Component of `direction` tangent to the level set at each point.
pub fn tangent_project(direction: &DMatrix<f64>, normals: &DMatrix<f64>) -> DMatrix<f64> {
    let lambda = kkt_multipliers(direction, normals);
    let mut out = direction.clone();
    for (i, mut row) in out.row_iter_mut().enumerate() {
        row += normals.row(i) * lambda[i];
    }
    out
}

/// Place every row of `trial` on `{H = 1}`.
///
/// Returns `Ok(None)` when some point cannot be corrected (non-positive `H`, or still
/// off the level set after `newton_corrections` steps); the caller rejects the trial.
/// Collaborator failures propagate as errors. On success also returns the largest
/// remaining `|H − 1|`.
pub fn correct_onto_level_set(
    oracle: &ConstraintOracle,
    trial: &DMatrix<f64>,
    feasibility_tol: f64,
    newton_corrections: usize,
) -> Result<Option<(DMatrix<f64>, f64)>, HzError> {
    let h = oracle.value(trial)?;
    if h.iter().any(|v| *v <= 0.0) {
        return Ok(None);
    }
    let mut out = trial.clone();
    for (i, mut row) in out.row_iter_mut().enumerate() {
        row /= h[i].sqrt();
    }
    let h = oracle.value(&out)?;
    let mut worst = 0.0_f64;
    for i in 0..out.nrows() {
        let mut viol = (h[i] - 1.0).abs();
        if viol > feasibility_tol {
            let mut x = out.row(i).transpose();
            for _ in 0..newton_corrections {
                let g = oracle.gradient_at(&x).map_err(|e| reindex(e, i))?;
                let gg = g.norm_squared();
                if gg == 0.0 {
                    break;
                }
                let hx = oracle.value_at(&x).map_err(|e| reindex(e, i))?;
                x -= g * ((hx - 1.0) / gg);
                viol = (oracle.value_at(&x).map_err(|e| reindex(e, i))? - 1.0).abs();
                if viol <= feasibility_tol {
                    break;
                }
            }
            if viol > feasibility_tol {
                return Ok(None);
            }
            out.set_row(i, &x.transpose());
        }
        worst = worst.max(viol);
    }
    Ok(Some((out, worst)))
}

/// Pointwise oracle errors report index 0; restore the row index.
fn reindex(err: HzError, index: usize) -> HzError {
    match err {
        HzError::NumericFailure { eval, reason, .. } => HzError::NumericFailure {
            eval,
            index,
            reason,
        },
        other => other,
    }
}

/// Radially project a fresh loop onto `{H = 1}`, failing hard if impossible.
pub(crate) fn place_on_level_set(
    oracle: &ConstraintOracle,
    points: &DMatrix<f64>,
    feasibility_tol: f64,
    newton_corrections: usize,
) -> Result<DMatrix<f64>, HzError> {
    correct_onto_level_set(oracle, points, feasibility_tol, newton_corrections)?
        .map(|(x, _)| x)
        .ok_or_else(|| {
            HzError::numeric(
                Eval::LevelSet,
                0,
                "loop cannot be placed on {H = 1} (H not positive along some ray)",
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::special::{ellipsoid, unit_ball};
    use proptest::prelude::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn dense_cyclic(m: usize, shift: f64) -> DMatrix<f64> {
        DMatrix::from_fn(m, m, |i, j| {
            if i == j {
                2.0 + shift
            } else if (i + 1) % m == j || (j + 1) % m == i {
                -1.0
            } else {
                0.0
            }
        })
    }

    #[test]
    fn cyclic_solver_matches_dense_lu() {
        let mut rng = StdRng::seed_from_u64(11);
        for &m in &[3usize, 4, 9, 64] {
            let shift = 0.05;
            let op = CyclicLaplacian::new(m, shift);
            let rhs = DMatrix::from_fn(m, 3, |_, _| rng.gen_range(-1.0..1.0));
            let x = op.solve(&rhs);
            let expected = dense_cyclic(m, shift).lu().solve(&rhs).unwrap();
            assert!((x - expected).amax() < 1e-10, "m={m}");
        }
    }

    #[test]
    fn level_set_correction_is_exact_for_homogeneous_h() {
        let oracle = ellipsoid(&[1.0, 2.5]).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let trial = DMatrix::from_fn(20, 4, |_, _| rng.gen_range(-2.0..2.0));
        let (x, worst) = correct_onto_level_set(&oracle, &trial, 1e-9, 3)
            .unwrap()
            .expect("all rays hit the boundary");
        assert!(worst < 1e-12);
        for v in oracle.value(&x).unwrap().iter() {
            assert!((v - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn newton_corrections_handle_non_homogeneous_h() {
        // H = |x|² + 0.1|x|⁴: radial rescale misses, Newton finishes the job.
        let oracle = ConstraintOracle::new(
            |x: &DVector<f64>| {
                let r2 = x.norm_squared();
                r2 + 0.1 * r2 * r2
            },
            |x: &DVector<f64>| x * (2.0 + 0.4 * x.norm_squared()),
        );
        let trial = DMatrix::from_row_slice(2, 2, &[1.3, 0.2, -0.4, 0.9]);
        let (x, worst) = correct_onto_level_set(&oracle, &trial, 1e-9, 5)
            .unwrap()
            .expect("converges in a few steps");
        assert!(worst <= 1e-9);
        assert!((oracle.value(&x).unwrap().amax() - 1.0).abs() <= 1e-9);
        // With no corrections allowed the trial is rejected.
        assert!(correct_onto_level_set(&oracle, &trial, 1e-9, 0)
            .unwrap()
            .is_none());
    }

    #[test]
    fn non_positive_h_rejects_the_trial() {
        let oracle = ConstraintOracle::new(|x: &DVector<f64>| x[0], |x: &DVector<f64>| x * 0.0);
        let trial = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, -1.0, 0.0]);
        assert!(correct_onto_level_set(&oracle, &trial, 1e-9, 3)
            .unwrap()
            .is_none());
        assert!(matches!(
            place_on_level_set(&oracle, &trial, 1e-9, 3),
            Err(HzError::NumericFailure {
                eval: Eval::LevelSet,
                ..
            })
        ));
    }

    proptest! {
        #[test]
        fn tangent_step_is_orthogonal_to_normals(
            seed in 0u64..1000,
            rows in 3usize..12,
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let x = DMatrix::from_fn(rows, 4, |_, _| rng.gen_range(-1.0..1.0));
            let d = DMatrix::from_fn(rows, 4, |_, _| rng.gen_range(-1.0..1.0));
            let normals = unit_ball().gradient(&x).unwrap();
            let t = tangent_project(&d, &normals);
            for (ti, ni) in t.row_iter().zip(normals.row_iter()) {
                prop_assert!(ti.dot(&ni).abs() < 1e-12 * (1.0 + ni.norm_squared()));
            }
        }
    }
}
