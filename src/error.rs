use thiserror::Error;

pub type Result<T> = std::result::Result<T, TimetableError>;

/// Everything that can go wrong between loading an instance and returning a timetable.
///
/// None of these are retried; the caller decides whether to re-run with another
/// encoding, a larger slot bound or a longer time limit.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TimetableError {
    #[error("invalid instance: {0}")]
    InvalidInstance(String),

    #[error("the problem is infeasible: no assignment satisfies all hard constraints")]
    InfeasibleProblem,

    #[error("no solution found within the time limit")]
    NoSolutionWithinBudget,

    #[error("inconsistent solution: {0}")]
    InconsistentSolution(String),

    #[error("solver error: {0}")]
    SolverError(String),
}

impl TimetableError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        TimetableError::InvalidInstance(message.into())
    }

    pub(crate) fn inconsistent(message: impl Into<String>) -> Self {
        TimetableError::InconsistentSolution(message.into())
    }
}
