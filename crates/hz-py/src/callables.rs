//! Adapt Python callables to the oracle's closure types.

use std::sync::Arc;

use hzcap::oracle::{GradientFn, ValueFn};
use hzcap::ConstraintOracle;
use nalgebra::DVector;
use pyo3::exceptions::PyTypeError;
use pyo3::prelude::*;
use pyo3::types::PyList;

/// `numpy.asarray`, if NumPy is available.
fn asarray(py: Python<'_>) -> Option<PyObject> {
    py.import_bound("numpy")
        .and_then(|np| np.getattr("asarray"))
        .ok()
        .map(Bound::unbind)
}

/// A Python callable invoked with one point at a time.
struct PointFn {
    func: PyObject,
    asarray: Option<PyObject>,
}

impl PointFn {
    fn call<'py>(&self, py: Python<'py>, x: &DVector<f64>) -> PyResult<Bound<'py, PyAny>> {
        let list = PyList::new_bound(py, x.iter().copied());
        let arg = match &self.asarray {
            Some(conv) => conv.bind(py).call1((list,))?,
            None => list.into_any(),
        };
        self.func.bind(py).call1((arg,))
    }

    fn scalar(&self, x: &DVector<f64>) -> f64 {
        Python::with_gil(|py| {
            self.call(py, x)
                .and_then(|v| v.extract::<f64>())
                .unwrap_or(f64::NAN)
        })
    }

    /// An empty vector marks failure; the oracle rejects it by length.
    fn vector(&self, x: &DVector<f64>) -> DVector<f64> {
        Python::with_gil(|py| {
            self.call(py, x)
                .and_then(|v| v.extract::<Vec<f64>>())
                .map(DVector::from_vec)
                .unwrap_or_else(|_| DVector::zeros(0))
        })
    }
}

fn point_fn(py: Python<'_>, name: &str, func: PyObject) -> PyResult<Arc<PointFn>> {
    if !func.bind(py).is_callable() {
        return Err(PyTypeError::new_err(format!("{name} must be callable")));
    }
    Ok(Arc::new(PointFn {
        func,
        asarray: asarray(py),
    }))
}

pub fn oracle_from_py(
    py: Python<'_>,
    h: PyObject,
    dh: PyObject,
    dg: Option<PyObject>,
) -> PyResult<ConstraintOracle> {
    let h = point_fn(py, "H", h)?;
    let dh = point_fn(py, "dH", dh)?;
    let h: ValueFn = Arc::new(move |x: &DVector<f64>| h.scalar(x));
    let dh: GradientFn = Arc::new(move |x: &DVector<f64>| dh.vector(x));
    let dg = match dg {
        Some(g) => {
            let g = point_fn(py, "dG", g)?;
            let g: GradientFn = Arc::new(move |y: &DVector<f64>| g.vector(y));
            Some(g)
        }
        None => None,
    };
    Ok(ConstraintOracle::from_parts(h, dh, dg))
}
