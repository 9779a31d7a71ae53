//! Error type shared by goal construction, the numeric routines and the
//! background runner.
//!
//! Construction-time problems (wrong node counts, bad parameters) are reported
//! immediately. Numerical degeneracy during iteration is never an error: goals
//! absorb it by contributing zero weight for that iteration.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error("{goal} requires at least {required} nodes, got {got}")]
    TooFewNodes {
        goal: &'static str,
        required: usize,
        got: usize,
    },

    #[error("{goal} requires an even number of nodes, got {got}")]
    OddNodeCount { goal: &'static str, got: usize },

    #[error("invalid parameter for {goal}: {reason}")]
    InvalidParameter { goal: &'static str, reason: String },

    #[error("goal {goal} has inconsistent buffers: {reason}")]
    InconsistentGoal { goal: &'static str, reason: String },

    #[error("face {face} references vertex {vertex}, but only {count} vertices exist")]
    FaceOutOfRange {
        face: usize,
        vertex: usize,
        count: usize,
    },

    #[error("svd needs at least as many rows as columns, got {rows}x{cols}")]
    SvdShape { rows: usize, cols: usize },

    #[error("svd did not converge for singular value {index} within {max_sweeps} sweeps")]
    SvdNoConvergence { index: usize, max_sweeps: usize },

    #[error("node index {0} is out of range")]
    UnknownNode(usize),

    #[error("background execution did not stop within {0:?}")]
    StopTimeout(Duration),
}

pub type Result<T> = std::result::Result<T, SolverError>;
