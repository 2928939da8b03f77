//! Ground-truth probe: capacity of the unit ball in R^{2n} for a few loop sizes.
//!
//! Purpose
//! - Show how the discretization error shrinks with m (expected value π for all n).
//!
//! Run: `cargo run -p hzcap --example ball_capacity`

use std::f64::consts::PI;
use std::time::Instant;

use hzcap::prelude::*;

fn main() -> Result<(), HzError> {
    for n in 1..=3 {
        for m in [50usize, 200, 500] {
            let mut solver = Solver::new(n, m, unit_ball())?;
            let start = Instant::now();
            let est = solver.estimate_with(
                EstimateCfg {
                    verbose: false,
                    ..EstimateCfg::default()
                },
                &mut NullSink,
            )?;
            println!(
                "n={n} m={m:4} capacity={:.8} err={:.2e} iters={} stop={:?} ms={:.1}",
                est.capacity,
                (est.capacity - PI).abs(),
                est.iterations,
                est.termination,
                start.elapsed().as_secs_f64() * 1e3
            );
        }
    }
    Ok(())
}
