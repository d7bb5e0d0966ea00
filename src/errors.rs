use num_dual::linalg::LinAlgError;
use thiserror::Error;

/// Error type for improperly posed conditions and failures during the
/// iteration.
///
/// Running out of iterations is deliberately not an error: the solver
/// reports it through the `converged` flag of the returned
/// [EquilibriumSolution](crate::EquilibriumSolution) and leaves the
/// decision to the caller.
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("{0}")]
    Error(String),
    #[error("The imposed conditions violate the Gibbs phase rule: {0} equations for {1} unknowns.")]
    GibbsPhaseRule(usize, usize),
    #[error("The internal constraint system of phase `{0}` is singular.")]
    SingularPhaseMatrix(String),
    #[error("Phase `{0}` returned a non-finite {1}.")]
    NumericFault(String, &'static str),
    #[error(transparent)]
    LinAlgError(#[from] LinAlgError),
}

/// Convenience type for `Result<T, SolverError>`.
pub type SolverResult<T> = Result<T, SolverError>;
