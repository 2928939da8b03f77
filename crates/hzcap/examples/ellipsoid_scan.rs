//! Ellipsoid scan: estimate vs `π·min a_k²`, plus one non-ellipsoidal body.
//!
//! Purpose
//! - Exercise bodies with unequal axes, where the minimal characteristic lives in a
//!   single symplectic plane, and compare against the closed form.
//! - Report the ℓ⁴ ball for contrast (no closed form; analytic and numeric `∇G`).
//!
//! Run: `cargo run -p hzcap --example ellipsoid_scan`

use hzcap::prelude::*;

fn quiet() -> EstimateCfg {
    EstimateCfg {
        verbose: false,
        ..EstimateCfg::default()
    }
}

fn main() -> Result<(), HzError> {
    let m = 300;
    for axes in [vec![1.0, 1.5], vec![1.5, 1.0], vec![1.0, 2.0], vec![0.8, 1.0, 1.3]] {
        let mut solver = Solver::new(axes.len(), m, ellipsoid(&axes)?)?;
        let c = solver.estimate(quiet())?;
        let exact = ellipsoid_capacity(&axes);
        println!(
            "axes={axes:?} capacity={c:.6} exact={exact:.6} rel_err={:.2e}",
            (c - exact).abs() / exact
        );
    }

    let body = lp_ball(4.0)?;
    let mut analytic = Solver::new(2, 150, body.clone())?;
    let ca = analytic.estimate(quiet())?;
    let numeric_body = ConstraintOracle::new(
        |x: &DVector<f64>| x.iter().map(|t| t.powi(4)).sum::<f64>().sqrt(),
        |x: &DVector<f64>| {
            let s = x.iter().map(|t| t.powi(4)).sum::<f64>().sqrt();
            x.map(|t| 2.0 * t.powi(3) / s)
        },
    );
    let mut numeric = Solver::new(2, 150, numeric_body)?;
    let cn = numeric.estimate(quiet())?;
    println!("l4 ball: analytic dG {ca:.6}, numeric dG {cn:.6}");
    Ok(())
}
