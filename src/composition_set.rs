use crate::phase_model::PhaseModel;
use ndarray::{s, Array1, ArrayView1};
use std::sync::Arc;

/// A phase together with its mutable state in an equilibrium calculation.
///
/// Several composition sets of the same phase can take part in one
/// calculation, each with its own site fractions (e.g. the two sides of a
/// miscibility gap). The solver updates `dof` and `phase_amount` in
/// place; after a successful call to
/// [find_solution](crate::find_solution) they hold the solution.
#[derive(Clone)]
pub struct CompositionSet {
    /// The thermodynamic model of the phase.
    pub model: Arc<dyn PhaseModel>,
    /// State variables followed by the internal site fractions.
    pub dof: Array1<f64>,
    /// Amount of the phase in moles of formula units.
    pub phase_amount: f64,
}

impl CompositionSet {
    pub fn new(model: Arc<dyn PhaseModel>, dof: Array1<f64>, phase_amount: f64) -> Self {
        Self {
            model,
            dof,
            phase_amount,
        }
    }

    pub fn name(&self) -> &str {
        self.model.name()
    }

    /// The internal site fractions of this composition set.
    pub fn site_fractions(&self, num_statevars: usize) -> ArrayView1<f64> {
        self.dof.slice(s![num_statevars..])
    }
}
