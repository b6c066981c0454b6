//! Error types for graph construction and rank computation.

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RankError>;

/// Fatal conditions that abort a ranking run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RankError {
    #[error("graph has no rank-bearing pages")]
    EmptyGraph,

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// The iteration cap was reached before every page converged.
///
/// Not an error: the ranks computed so far are still returned alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonConvergenceWarning {
    pub iterations: usize,
    pub unconverged_pages: usize,
}

impl fmt::Display for NonConvergenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stopped after {} iterations with {} pages not converged",
            self.iterations, self.unconverged_pages
        )
    }
}
