//! Discrete action functional, dual action and their gradients.
//!
//! Loop `X` is (m × 2n), row i = x_i, indices cyclic.
//!
//! - Action: `A(X) = ¼ Σ ⟨J x_i, x_{i+1} − x_{i−1}⟩`, the midpoint rule for
//!   `½∮⟨Jx, dx⟩`. For a polygon this is exactly `½ Σ ⟨J x_i, x_{i+1}⟩`, its
//!   symplectic area. Gradient: `∇_i A = ½ J (x_{i−1} − x_{i+1})`.
//! - Dual action: with `w_i = m (x_{i+1} − x_i)` and `u_i = −J w_i`,
//!   `F(X) = (1/m) Σ G(u_i)`, `G(u) = ½⟨∇G(u), u⟩` (Euler, 2-homogeneous G).
//!   Gradient: `∇_i F = J (∇G(u_{i−1}) − ∇G(u_i))`.
//! - Quotient `Φ = F/A` is invariant under dilation of the loop; on loops confined
//!   to `∂K` its minimum is the capacity, attained at a closed characteristic where
//!   `Φ = A`.

use nalgebra::DMatrix;

use crate::error::HzError;
use crate::oracle::ConstraintOracle;
use crate::symplectic::apply_j;

/// Cyclic row shift: row `i` of the result is row `(i + shift) mod m` of `x`.
pub(crate) fn roll(x: &DMatrix<f64>, shift: isize) -> DMatrix<f64> {
    let m = x.nrows() as isize;
    DMatrix::from_fn(x.nrows(), x.ncols(), |i, j| {
        x[((i as isize + shift).rem_euclid(m) as usize, j)]
    })
}

#[inline]
fn central_difference(x: &DMatrix<f64>) -> DMatrix<f64> {
    roll(x, 1) - roll(x, -1)
}

/// Discrete symplectic action of the closed polygon `x`.
pub fn action(x: &DMatrix<f64>) -> f64 {
    0.25 * apply_j(x).dot(&central_difference(x))
}

/// `∇A`, one row per point.
pub fn action_gradient(x: &DMatrix<f64>) -> DMatrix<f64> {
    apply_j(&central_difference(x)) * -0.5
}

/// Dual velocities `u_i = −J m (x_{i+1} − x_i)` and `∇G(u_i)`.
fn conjugate_samples(
    x: &DMatrix<f64>,
    oracle: &ConstraintOracle,
) -> Result<(DMatrix<f64>, DMatrix<f64>), HzError> {
    let m = x.nrows() as f64;
    let w = (roll(x, 1) - x) * m;
    let u = -apply_j(&w);
    let g = oracle.conjugate_gradient(&u)?;
    Ok((u, g))
}

/// Dual action `F(X)`.
pub fn dual_action(x: &DMatrix<f64>, oracle: &ConstraintOracle) -> Result<f64, HzError> {
    let (u, g) = conjugate_samples(x, oracle)?;
    Ok(0.5 * g.dot(&u) / x.nrows() as f64)
}

/// Dual action `F(X)` together with `∇F`.
pub fn dual_action_gradient(
    x: &DMatrix<f64>,
    oracle: &ConstraintOracle,
) -> Result<(f64, DMatrix<f64>), HzError> {
    let (u, g) = conjugate_samples(x, oracle)?;
    let value = 0.5 * g.dot(&u) / x.nrows() as f64;
    let grad = apply_j(&(roll(&g, -1) - &g));
    Ok((value, grad))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::central_gradient;
    use crate::oracle::special::unit_ball;
    use nalgebra::DVector;
    use std::f64::consts::PI;

    fn circle(m: usize, radius: f64) -> DMatrix<f64> {
        DMatrix::from_fn(m, 2, |i, j| {
            let t = 2.0 * PI * i as f64 / m as f64;
            radius * if j == 0 { t.cos() } else { t.sin() }
        })
    }

    fn wobbly_loop(m: usize) -> DMatrix<f64> {
        DMatrix::from_fn(m, 4, |i, j| {
            let t = 2.0 * PI * i as f64 / m as f64;
            match j {
                0 => t.cos() + 0.2 * (2.0 * t).cos(),
                1 => 0.5 * t.cos() + 0.1 * (3.0 * t).sin(),
                2 => t.sin(),
                _ => 0.5 * t.sin() - 0.3 * (2.0 * t).sin(),
            }
        })
    }

    fn flatten(x: &DMatrix<f64>) -> DVector<f64> {
        DVector::from_column_slice(x.as_slice())
    }

    fn unflatten(v: &DVector<f64>, m: usize, d: usize) -> DMatrix<f64> {
        DMatrix::from_column_slice(m, d, v.as_slice())
    }

    #[test]
    fn roll_wraps_both_ways() {
        let x = DMatrix::from_fn(3, 1, |i, _| i as f64);
        assert_eq!(roll(&x, 1).as_slice(), &[1.0, 2.0, 0.0]);
        assert_eq!(roll(&x, -1).as_slice(), &[2.0, 0.0, 1.0]);
    }

    #[test]
    fn regular_polygon_action_is_its_area() {
        for &m in &[3usize, 4, 10, 500] {
            let a = action(&circle(m, 1.0));
            let area = 0.5 * m as f64 * (2.0 * PI / m as f64).sin();
            assert!((a - area).abs() < 1e-12, "m={m}: {a} vs {area}");
        }
        // Orientation reversal flips the sign; dilation scales quadratically.
        let x = wobbly_loop(64);
        let rev = DMatrix::from_fn(64, 4, |i, j| x[(63 - i, j)]);
        assert!((action(&rev) + action(&x)).abs() < 1e-12);
        assert!((action(&(&x * 3.0)) - 9.0 * action(&x)).abs() < 1e-10);
    }

    #[test]
    fn action_is_shift_and_translation_invariant() {
        let x = wobbly_loop(50);
        let a = action(&x);
        assert!((action(&roll(&x, 7)) - a).abs() < 1e-12);
        let mut moved = x.clone();
        for mut row in moved.row_iter_mut() {
            row[0] += 0.4;
            row[3] -= 1.1;
        }
        assert!((action(&moved) - a).abs() < 1e-12);
    }

    #[test]
    fn action_gradient_matches_differences() {
        let x = wobbly_loop(12);
        let (m, d) = x.shape();
        let numeric = central_gradient(|v| action(&unflatten(v, m, d)), &flatten(&x));
        let analytic = flatten(&action_gradient(&x));
        assert!((numeric - analytic).amax() < 1e-8);
    }

    #[test]
    fn dual_gradient_matches_differences() {
        let oracle = unit_ball();
        let x = wobbly_loop(12);
        let (m, d) = x.shape();
        let numeric = central_gradient(
            |v| dual_action(&unflatten(v, m, d), &oracle).unwrap(),
            &flatten(&x),
        );
        let (value, grad) = dual_action_gradient(&x, &oracle).unwrap();
        assert!((value - dual_action(&x, &oracle).unwrap()).abs() < 1e-14);
        let scale = grad.amax().max(1.0);
        assert!((numeric - flatten(&grad)).amax() < 1e-6 * scale);
    }

    #[test]
    fn circle_quotient_is_pi() {
        // Ball: G(u) = |u|²/4 and a round circle gives F/A = π·(sin-correction).
        let oracle = unit_ball();
        let x = circle(400, 1.0);
        let q = dual_action(&x, &oracle).unwrap() / action(&x);
        assert!((q - PI).abs() < 1e-3);
    }
}
