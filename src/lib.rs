#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

//! Multi-phase chemical equilibrium solver for sublattice thermodynamic
//! models.
//!
//! Given a list of candidate phases ([CompositionSet]s) and a set of
//! imposed conditions ([EquilibriumConditions]), [find_solution] iterates
//! the two-step block Newton scheme of Sundman et al. (2015): a
//! constrained Newton step on the internal site fractions of every phase,
//! followed by a global correction of the chemical potentials, phase
//! amounts, and free state variables. Phases are added to and removed
//! from the set of stable phases during the iteration based on their
//! driving forces and amounts.

/// Print messages with level `Verbosity::Iter` or higher.
#[macro_export]
macro_rules! log_iter {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= Verbosity::Iter {
            println!($($arg)*);
        }
    }
}

/// Print messages with level `Verbosity::Result` or higher.
#[macro_export]
macro_rules! log_result {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= Verbosity::Result {
            println!($($arg)*);
        }
    }
}

mod composition_set;
mod conditions;
mod errors;
pub mod models;
mod phase_model;
mod solver;

pub use composition_set::CompositionSet;
pub use conditions::EquilibriumConditions;
pub use errors::{SolverError, SolverResult};
pub use phase_model::PhaseModel;
pub use solver::{find_solution, EquilibriumSolution};

/// Universal gas constant in J/(mol K).
pub const RGAS: f64 = 8.31446261815324;

/// Smallest value an internal site fraction can take.
///
/// Site fractions are clipped to `[MIN_SITE_FRACTION, 1]` after every
/// internal update and phases whose amount falls below this threshold are
/// removed from the set of stable phases. Models have to use the same
/// floor internally to avoid clipping oscillation against the solver.
pub const MIN_SITE_FRACTION: f64 = 1e-12;

/// Level of detail in the iteration output.
#[derive(Copy, Clone, PartialOrd, PartialEq, Eq)]
pub enum Verbosity {
    /// Do not print output.
    None,
    /// Print information about the success or failure of the iteration.
    Result,
    /// Print a detailed output for every iteration.
    Iter,
}

impl Default for Verbosity {
    fn default() -> Self {
        Self::None
    }
}

/// Options for the equilibrium solver.
///
/// If the values are [None], solver specific default
/// values are used.
#[derive(Copy, Clone, Default)]
pub struct SolverOptions {
    /// Maximum number of iterations.
    pub max_iter: Option<usize>,
    /// Iteration output indicated by the [Verbosity] enum.
    pub verbosity: Verbosity,
}

impl SolverOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = Some(max_iter);
        self
    }

    pub fn verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn unwrap_or(self, max_iter: usize) -> (usize, Verbosity) {
        (self.max_iter.unwrap_or(max_iter), self.verbosity)
    }
}
