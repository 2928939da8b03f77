//! Standard complex structure `J` on R^{2n}.
//!
//! Convention: coordinates ordered as (q₁..qₙ, p₁..pₙ) and `J = [[0, -I], [I, 0]]`,
//! so `J² = -I` and `ω(a, b) = ⟨J a, b⟩` is positive on counterclockwise loops in
//! every (q_k, p_k) plane.

use nalgebra::{DMatrix, DVector};

/// Return `J = [[0, -I],[I, 0]]` of size 2n × 2n.
pub fn j_matrix(n: usize) -> DMatrix<f64> {
    let mut j = DMatrix::zeros(2 * n, 2 * n);
    for k in 0..n {
        j[(k, n + k)] = -1.0;
        j[(n + k, k)] = 1.0;
    }
    j
}

/// Apply `J` to every row of an (m × 2n) batch: `(q, p) ↦ (-p, q)`.
pub fn apply_j(points: &DMatrix<f64>) -> DMatrix<f64> {
    let n = points.ncols() / 2;
    let mut out = DMatrix::zeros(points.nrows(), points.ncols());
    out.columns_mut(0, n).copy_from(&(-points.columns(n, n)));
    out.columns_mut(n, n).copy_from(&points.columns(0, n));
    out
}

/// Symplectic pairing `ω(a, b) = ⟨J a, b⟩`.
pub fn omega(a: &DVector<f64>, b: &DVector<f64>) -> f64 {
    (j_matrix(a.len() / 2) * a).dot(b)
}
