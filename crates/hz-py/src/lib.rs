//! PyO3 bindings for the `hzcap` capacity solver.
//!
//! Notes
//! - Python callables stand in for `H`, `dH` and optionally `dG`. Each receives one
//!   phase-space point (a NumPy array when NumPy is importable, a list otherwise).
//! - A callable that raises or returns something unusable yields NaN, which the
//!   solver reports as a numeric failure; that surfaces here as `ValueError`.

use pyo3::prelude::*;

mod callables;
mod estimator;

#[pymodule]
fn hz_native(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Per-iteration progress goes through `tracing`; a host may have installed its own.
    let _ = tracing_subscriber::fmt().with_target(false).try_init();
    m.add("__version__", hzcap::VERSION)?;
    estimator::register(m)?;
    Ok(())
}
