use crate::state::SolverState;
use thiserror::Error;

/// Rejected solver or line-search configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("parameter {name} = {value} is outside its valid range {range}")]
    OutOfRange {
        name: String,
        value: f64,
        range: String,
    },
    #[error("line-search tolerances must satisfy 0 < c1 < c2 < 1 (c1 < 0.5 for cgdescent), got c1={c1}, c2={c2}")]
    Tolerance { c1: f64, c2: f64 },
    #[error("unknown {kind} id <{id}>")]
    UnknownId { kind: &'static str, id: String },
    #[error("unknown parameter <{0}>")]
    UnknownParameter(String),
}

/// A failed optimization run, for callers that prefer `Result` over inspecting the status.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error(
        "The line search failed to find a suitable step after {iterations} iterations. The last valid state is returned."
    )]
    LineSearchFailed {
        /// The last valid state before the line search failed.
        last_state: Box<SolverState>,
        /// Iterations completed before the failure.
        iterations: usize,
    },
    #[error("The function value or gradient became NaN or infinity, indicating numerical instability.")]
    Diverged { last_state: Box<SolverState> },
    #[error(
        "Maximum number of iterations reached without converging. The last state is returned."
    )]
    MaxIterationsReached { last_state: Box<SolverState> },
    #[error(
        "Maximum number of function evaluations reached without converging. The last state is returned."
    )]
    MaxEvaluationsReached { last_state: Box<SolverState> },
}
