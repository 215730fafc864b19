// tandem_core/src/error.rs

use thiserror::Error;

/// Errors surfaced to callers of the planner.
///
/// Only malformed inputs and infeasible configurations are ever reported. Non-convergence of the
/// solver is part of a normal `SolveOutcome` and missing derivatives degrade to zero blocks.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlannerError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("module '{module}' cannot be used here: {reason}")]
    InfeasibleConfiguration { module: String, reason: String },

    #[error("unknown optimization module '{0}'")]
    UnknownModule(String),

    #[error("the environment has no ego agent")]
    MissingEgo,

    #[error("QP subproblem could not be set up: {0}")]
    QpSubproblem(String),
}
