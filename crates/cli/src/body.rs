//! Built-in bodies selectable from the command line.

use anyhow::{bail, Result};
use clap::ValueEnum;
use hzcap::oracle::special::{ellipsoid, ellipsoid_capacity, lp_ball, unit_ball};
use hzcap::ConstraintOracle;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BodyKind {
    /// Euclidean unit ball.
    Ball,
    /// Ellipsoid with semi-axes `--axes`.
    Ellipsoid,
    /// Unit ball of the ℓ^p norm, `--p`.
    Lp,
}

impl BodyKind {
    pub fn name(self) -> &'static str {
        match self {
            BodyKind::Ball => "ball",
            BodyKind::Ellipsoid => "ellipsoid",
            BodyKind::Lp => "lp",
        }
    }
}

/// Resolved body: oracle plus its closed-form capacity when one is known.
pub struct Body {
    pub oracle: ConstraintOracle,
    pub reference: Option<f64>,
}

pub fn build(
    kind: BodyKind,
    half_dim: usize,
    axes: &[f64],
    p: f64,
    numeric_dual: bool,
) -> Result<Body> {
    let (oracle, reference) = match kind {
        BodyKind::Ball => (unit_ball(), Some(std::f64::consts::PI)),
        BodyKind::Ellipsoid => {
            let axes = if axes.is_empty() {
                vec![1.0; half_dim]
            } else {
                axes.to_vec()
            };
            if axes.len() != half_dim {
                bail!(
                    "--axes has {} entries but --half-dim is {half_dim}",
                    axes.len()
                );
            }
            (ellipsoid(&axes)?, Some(ellipsoid_capacity(&axes)))
        }
        BodyKind::Lp => (lp_ball(p)?, None),
    };
    let oracle = if numeric_dual {
        oracle.without_conjugate_gradient()
    } else {
        oracle
    };
    Ok(Body { oracle, reference })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ellipsoid_axes_must_match_dimension() {
        assert!(build(BodyKind::Ellipsoid, 2, &[1.0], 4.0, false).is_err());
        let body = build(BodyKind::Ellipsoid, 2, &[1.0, 0.5], 4.0, false).unwrap();
        let expected = std::f64::consts::PI * 0.25;
        assert!((body.reference.unwrap() - expected).abs() < 1e-15);
    }

    #[test]
    fn numeric_dual_drops_the_analytic_conjugate() {
        let body = build(BodyKind::Ball, 1, &[], 4.0, true).unwrap();
        assert!(!body.oracle.conjugate().is_analytic());
        let lp = build(BodyKind::Lp, 2, &[], 3.0, false).unwrap();
        assert!(lp.oracle.conjugate().is_analytic());
        assert!(lp.reference.is_none());
        assert!(build(BodyKind::Lp, 2, &[], 1.0, false).is_err());
    }
}
