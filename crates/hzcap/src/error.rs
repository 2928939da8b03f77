//! Error type shared by the oracle and the solver.

use std::fmt;

use thiserror::Error;

/// Which collaborator evaluation (or derived quantity) failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Eval {
    /// `H(x)`.
    Value,
    /// `∇H(x)`.
    Gradient,
    /// `∇G(y)`, analytic or numeric.
    ConjugateGradient,
    /// Placing a point on `{H = 1}`.
    LevelSet,
    /// The discrete action of the loop.
    Action,
}

impl fmt::Display for Eval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Eval::Value => "H",
            Eval::Gradient => "dH",
            Eval::ConjugateGradient => "dG",
            Eval::LevelSet => "level-set correction",
            Eval::Action => "action",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum HzError {
    /// Invalid construction or call parameters; nothing was built or mutated.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// A collaborator could not be evaluated at a query point.
    #[error("numeric failure in {eval} at point {index}: {reason}")]
    NumericFailure {
        eval: Eval,
        index: usize,
        reason: String,
    },
}

impl HzError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }

    pub(crate) fn numeric(eval: Eval, index: usize, reason: impl Into<String>) -> Self {
        Self::NumericFailure {
            eval,
            index,
            reason: reason.into(),
        }
    }
}
