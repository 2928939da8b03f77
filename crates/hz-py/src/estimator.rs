//! `HZCapacityEstimator`: a `Solver` owned by a Python object.

use hzcap::{EstimateCfg, HzError, Solver};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::callables::oracle_from_py;

fn map_err(err: HzError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// Capacity estimator for the body `{H <= 1}` in R^{2n} with an m-point loop.
///
/// `H` must be positively 2-homogeneous. Without `dG` the conjugate gradient is
/// solved for numerically, which is slower and less accurate.
#[pyclass(name = "HZCapacityEstimator", module = "hz_native")]
pub struct HzCapacityEstimator {
    solver: Solver,
}

#[pymethods]
impl HzCapacityEstimator {
    #[new]
    #[pyo3(signature = (n, m, h, dh, dg = None))]
    fn new(
        py: Python<'_>,
        n: usize,
        m: usize,
        h: PyObject,
        dh: PyObject,
        dg: Option<PyObject>,
    ) -> PyResult<Self> {
        let oracle = oracle_from_py(py, h, dh, dg)?;
        let solver = Solver::new(n, m, oracle).map_err(map_err)?;
        Ok(Self { solver })
    }

    /// Run up to `iterations` updates; return the action of the final loop.
    #[pyo3(signature = (iterations = 100, epsilon = 1e-12, verbose = true))]
    fn estimate(&mut self, iterations: usize, epsilon: f64, verbose: bool) -> PyResult<f64> {
        let cfg = EstimateCfg {
            iterations,
            epsilon,
            verbose,
        };
        self.solver.estimate(cfg).map_err(map_err)
    }

    /// Current loop as a list of m points (rows of length 2n).
    #[pyo3(name = "loop")]
    fn loop_points(&self) -> Vec<Vec<f64>> {
        self.solver
            .loop_points()
            .row_iter()
            .map(|r| r.iter().copied().collect())
            .collect()
    }

    /// Action of the current loop.
    fn action(&self) -> f64 {
        self.solver.action()
    }

    /// Largest `|H(x_i) - 1|` on the current loop.
    fn constraint_violation(&self) -> PyResult<f64> {
        self.solver.constraint_violation().map_err(map_err)
    }

    #[getter]
    fn n(&self) -> usize {
        self.solver.half_dim()
    }

    #[getter]
    fn m(&self) -> usize {
        self.solver.segments()
    }

    fn __repr__(&self) -> String {
        format!(
            "HZCapacityEstimator(n={}, m={}, action={:.6})",
            self.solver.half_dim(),
            self.solver.segments(),
            self.solver.action()
        )
    }
}

pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<HzCapacityEstimator>()?;
    Ok(())
}
