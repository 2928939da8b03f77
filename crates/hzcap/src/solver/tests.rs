use std::f64::consts::PI;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use super::*;
use crate::oracle::special::{ellipsoid, ellipsoid_capacity, ellipsoid_numeric, unit_ball};

fn quiet(iterations: usize) -> EstimateCfg {
    EstimateCfg {
        iterations,
        epsilon: 0.0,
        verbose: false,
    }
}

/// Unit ball whose `∇G` counts calls and turns NaN once `limit` is reached.
fn counting_ball(limit: usize) -> (ConstraintOracle, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let oracle = ConstraintOracle::new(
        |x: &DVector<f64>| x.norm_squared(),
        |x: &DVector<f64>| x * 2.0,
    )
    .with_conjugate_gradient(move |y: &DVector<f64>| {
        if counter.fetch_add(1, Ordering::SeqCst) >= limit {
            DVector::from_element(y.len(), f64::NAN)
        } else {
            y * 0.5
        }
    });
    (oracle, calls)
}

#[test]
fn rejects_bad_configuration() {
    assert!(matches!(
        Solver::new(0, 10, unit_ball()),
        Err(HzError::Configuration(_))
    ));
    assert!(matches!(
        Solver::new(2, 2, unit_ball()),
        Err(HzError::Configuration(_))
    ));
    let cfg = SolverCfg {
        backtrack_factor: 1.0,
        ..SolverCfg::default()
    };
    assert!(matches!(
        Solver::with_cfg(1, 10, unit_ball(), cfg),
        Err(HzError::Configuration(_))
    ));

    let mut s = Solver::new(1, 10, unit_ball()).unwrap();
    let before = s.loop_points().clone();
    for eps in [f64::NAN, -1.0, f64::INFINITY] {
        let cfg = EstimateCfg {
            epsilon: eps,
            ..quiet(5)
        };
        assert!(matches!(s.estimate(cfg), Err(HzError::Configuration(_))));
    }
    assert!(matches!(
        s.set_loop(DMatrix::zeros(9, 2)),
        Err(HzError::Configuration(_))
    ));
    assert_eq!(s.loop_points(), &before);
}

#[test]
fn start_loop_is_feasible_and_positively_oriented() {
    for n in 1..4 {
        let s = Solver::new(n, 40, ellipsoid(&vec![1.3; n]).unwrap()).unwrap();
        assert_eq!(s.loop_points().shape(), (40, 2 * n));
        assert!(s.constraint_violation().unwrap() < 1e-12);
        assert!(s.action() > 0.0);
        let j = s.complex_structure();
        assert!((j * j + DMatrix::identity(2 * n, 2 * n)).amax() < 1e-15);
    }
}

#[test]
fn ball_capacity_is_pi() {
    for n in [1usize, 2] {
        let mut s = Solver::new(n, 500, unit_ball()).unwrap();
        let c = s.estimate(quiet(100)).unwrap();
        assert!((c - PI).abs() < 1e-2, "n={n}: {c}");
    }
}

#[test]
fn ellipsoid_capacity_is_smallest_disc() {
    let axes = [1.0, 1.5];
    let mut s = Solver::new(2, 300, ellipsoid(&axes).unwrap()).unwrap();
    let c = s.estimate(quiet(100)).unwrap();
    assert!((c - ellipsoid_capacity(&axes)).abs() < 1e-2, "{c}");
    // At a closed characteristic the dual quotient equals the action.
    assert!((s.dual_quotient().unwrap() - c).abs() < 1e-2);
}

#[test]
fn every_update_stays_on_the_level_set() {
    let mut s = Solver::new(2, 120, ellipsoid(&[1.0, 1.5]).unwrap()).unwrap();
    let mut records: Vec<IterationRecord> = Vec::new();
    s.estimate_with(quiet(30), &mut records).unwrap();
    assert!(!records.is_empty());
    for r in &records {
        assert!(r.violation <= 1e-6, "iteration {}: {}", r.iteration, r.violation);
    }
    // Independent check of the stored loop between single-step calls.
    for _ in 0..10 {
        s.estimate(quiet(1)).unwrap();
        assert!(s.constraint_violation().unwrap() <= 1e-6);
    }
}

#[test]
fn step_sizes_decay_after_warm_up() {
    let mut s = Solver::new(2, 300, unit_ball()).unwrap();
    let mut records: Vec<IterationRecord> = Vec::new();
    s.estimate_with(quiet(40), &mut records).unwrap();
    assert!(records.len() > 10);
    for w in records.windows(2) {
        let (prev, next) = (&w[0], &w[1]);
        if next.iteration > 10 && next.step > 1e-12 {
            assert!(
                next.step <= prev.step,
                "step grew at iteration {}: {} > {}",
                next.iteration,
                next.step,
                prev.step
            );
        }
    }
}

#[test]
fn reruns_are_bit_identical() {
    let run = || {
        let mut s = Solver::new(2, 80, ellipsoid(&[1.0, 1.2]).unwrap()).unwrap();
        let c = s.estimate(quiet(25)).unwrap();
        (c, s.loop_points().clone())
    };
    let (c1, x1) = run();
    let (c2, x2) = run();
    assert_eq!(c1.to_bits(), c2.to_bits());
    assert_eq!(x1, x2);
}

#[test]
fn numeric_dual_agrees_with_analytic() {
    let axes = [1.0, 1.5];
    let mut analytic = Solver::new(2, 150, ellipsoid(&axes).unwrap()).unwrap();
    let mut numeric = Solver::new(2, 150, ellipsoid_numeric(&axes).unwrap()).unwrap();
    assert!(!numeric.oracle().conjugate().is_analytic());
    let ca = analytic.estimate(quiet(40)).unwrap();
    let cn = numeric.estimate(quiet(40)).unwrap();
    assert!((ca - cn).abs() < 1e-3, "{ca} vs {cn}");
}

#[test]
fn single_iteration_budget() {
    let mut s = Solver::new(2, 60, unit_ball()).unwrap();
    let a0 = s.action();
    let mut records: Vec<IterationRecord> = Vec::new();
    let est = s.estimate_with(quiet(1), &mut records).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(est.iterations, 1);
    assert_eq!(est.termination, Termination::Budget);
    assert_eq!(records[0].iteration, 1);
    assert!(s.action() != a0);
    assert_eq!(est.capacity, records[0].action);
}

#[test]
fn zero_budget_reports_current_action() {
    let mut s = Solver::new(1, 30, unit_ball()).unwrap();
    let est = s.estimate_with(quiet(0), &mut NullSink).unwrap();
    assert_eq!(est.iterations, 0);
    assert_eq!(est.last_step, None);
    assert_eq!(est.capacity, s.action());
}

#[test]
fn numeric_failure_keeps_last_accepted_loop() {
    let m = 50;
    let (healthy, calls) = counting_ball(usize::MAX);
    let mut reference = Solver::new(2, m, healthy).unwrap();
    reference.estimate(quiet(3)).unwrap();
    let used = calls.load(Ordering::SeqCst);

    // Fail halfway through the gradient evaluation of the fourth update.
    let (flaky, _) = counting_ball(used + m / 2);
    let mut s = Solver::new(2, m, flaky).unwrap();
    let mut records: Vec<IterationRecord> = Vec::new();
    let err = s.estimate_with(quiet(10), &mut records).unwrap_err();
    assert!(matches!(
        err,
        HzError::NumericFailure {
            eval: Eval::ConjugateGradient,
            ..
        }
    ));
    assert_eq!(records.len(), 3);
    assert_eq!(s.loop_points(), reference.loop_points());
    assert_eq!(s.action(), records[2].action);
    assert!(s.constraint_violation().unwrap() <= 1e-6);
}

#[test]
fn dilation_scales_capacity_quadratically() {
    let c = 1.5;
    let base = ellipsoid(&[1.0, 1.5]).unwrap();
    let mut small = Solver::new(2, 200, base.clone()).unwrap();
    let mut large = Solver::new(2, 200, base.dilate(c).unwrap()).unwrap();
    let a = small.estimate(quiet(60)).unwrap();
    let b = large.estimate(quiet(60)).unwrap();
    assert!((b / a - c * c).abs() < 1e-4 * c * c, "{a} {b}");
}

#[test]
fn repeated_calls_keep_improving() {
    let mut s = Solver::new(2, 200, unit_ball()).unwrap();
    s.estimate(quiet(5)).unwrap();
    let q1 = s.dual_quotient().unwrap();
    s.estimate(quiet(30)).unwrap();
    let q2 = s.dual_quotient().unwrap();
    assert!(q2 <= q1);
}

#[test]
fn closure_sink_sees_every_update() {
    let mut s = Solver::new(1, 64, unit_ball()).unwrap();
    let mut seen = Vec::new();
    let mut sink = |r: &IterationRecord| seen.push(r.iteration);
    let est = s.estimate_with(quiet(7), &mut sink).unwrap();
    assert_eq!(seen.len(), est.iterations);
    assert_eq!(seen, (1..=est.iterations).collect::<Vec<_>>());
}

#[test]
fn verbose_estimate_returns_the_action() {
    let mut s = Solver::new(1, 32, unit_ball()).unwrap();
    let c = s
        .estimate(EstimateCfg {
            iterations: 3,
            ..EstimateCfg::default()
        })
        .unwrap();
    assert_eq!(c, s.action());
}

#[test]
fn set_loop_projects_and_checks_orientation() {
    let m = 48;
    let mut s = Solver::new(2, m, unit_ball()).unwrap();
    let circle = DMatrix::from_fn(m, 4, |i, j| {
        let t = 2.0 * PI * i as f64 / m as f64;
        match j {
            0 => 2.0 * t.cos(),
            2 => 2.0 * t.sin(),
            _ => 0.0,
        }
    });
    s.set_loop(circle.clone()).unwrap();
    assert!(s.constraint_violation().unwrap() < 1e-12);
    let area = 0.5 * m as f64 * (2.0 * PI / m as f64).sin();
    assert!((s.action() - area).abs() < 1e-12);

    let reversed = DMatrix::from_fn(m, 4, |i, j| circle[(m - 1 - i, j)]);
    assert!(matches!(
        s.set_loop(reversed),
        Err(HzError::Configuration(_))
    ));
}

#[test]
fn kkt_multipliers_remove_normal_component() {
    let d = DMatrix::from_row_slice(1, 2, &[1.0, 1.0]);
    let n = DMatrix::from_row_slice(1, 2, &[2.0, 0.0]);
    let lambda = kkt_multipliers(&d, &n);
    assert!((lambda[0] + 0.5).abs() < 1e-15);
    let t = tangent_project(&d, &n);
    assert_eq!(t, DMatrix::from_row_slice(1, 2, &[0.0, 1.0]));
}
