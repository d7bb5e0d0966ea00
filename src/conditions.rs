use crate::errors::{SolverError, SolverResult};
use ndarray::Array1;

/// The conditions imposed on an equilibrium calculation.
///
/// Chemical potentials and state variables are partitioned into free
/// (solved for) and fixed (imposed) indices. Mass balance is prescribed
/// per element together with the total system amount. The partitions must
/// close the system of equations: with `E` prescribed elemental amounts,
/// the Gibbs phase rule requires exactly `E + 1` free chemical potentials
/// and state variables combined, independent of how many phases turn out
/// to be stable.
#[derive(Clone, Debug)]
pub struct EquilibriumConditions {
    /// Number of state variables at the front of every dof vector.
    pub num_statevars: usize,
    /// Number of components in the system.
    pub num_components: usize,
    /// Components whose chemical potentials are unknowns.
    pub free_chemical_potential_indices: Vec<usize>,
    /// Components whose chemical potentials are imposed.
    pub fixed_chemical_potential_indices: Vec<usize>,
    /// State variables solved for by the global system.
    pub free_statevar_indices: Vec<usize>,
    /// State variables imposed by the caller.
    pub fixed_statevar_indices: Vec<usize>,
    /// Components with a prescribed elemental amount.
    pub prescribed_element_indices: Vec<usize>,
    /// Prescribed amount in moles for each entry of
    /// `prescribed_element_indices`.
    pub prescribed_elemental_amounts: Vec<f64>,
    /// Prescribed total system amount in moles.
    pub prescribed_system_amount: f64,
    /// Starting chemical potentials for all components; entries at fixed
    /// indices hold the imposed values.
    pub initial_chemical_potentials: Array1<f64>,
}

impl EquilibriumConditions {
    /// Check that the conditions close the system of equations.
    pub fn validate(&self) -> SolverResult<()> {
        if self.prescribed_element_indices.len() != self.prescribed_elemental_amounts.len() {
            return Err(SolverError::Error(format!(
                "{} prescribed elements but {} prescribed amounts",
                self.prescribed_element_indices.len(),
                self.prescribed_elemental_amounts.len()
            )));
        }
        if self.initial_chemical_potentials.len() != self.num_components {
            return Err(SolverError::Error(format!(
                "{} initial chemical potentials for {} components",
                self.initial_chemical_potentials.len(),
                self.num_components
            )));
        }
        let equations = self.prescribed_element_indices.len() + 1;
        let unknowns =
            self.free_chemical_potential_indices.len() + self.free_statevar_indices.len();
        if equations != unknowns {
            return Err(SolverError::GibbsPhaseRule(equations, unknowns));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SolverError;
    use ndarray::arr1;

    fn binary_conditions() -> EquilibriumConditions {
        EquilibriumConditions {
            num_statevars: 2,
            num_components: 2,
            free_chemical_potential_indices: vec![0, 1],
            fixed_chemical_potential_indices: vec![],
            free_statevar_indices: vec![],
            fixed_statevar_indices: vec![0, 1],
            prescribed_element_indices: vec![1],
            prescribed_elemental_amounts: vec![0.3],
            prescribed_system_amount: 1.0,
            initial_chemical_potentials: arr1(&[-1.0, -1.0]),
        }
    }

    #[test]
    fn closed_conditions_validate() {
        assert!(binary_conditions().validate().is_ok());
    }

    #[test]
    fn overdetermined_conditions_are_rejected() {
        let mut conditions = binary_conditions();
        conditions.prescribed_element_indices = vec![0, 1];
        conditions.prescribed_elemental_amounts = vec![0.7, 0.3];
        assert!(matches!(
            conditions.validate(),
            Err(SolverError::GibbsPhaseRule(3, 2))
        ));
    }

    #[test]
    fn mismatched_amounts_are_rejected() {
        let mut conditions = binary_conditions();
        conditions.prescribed_elemental_amounts = vec![];
        assert!(matches!(
            conditions.validate(),
            Err(SolverError::Error(_))
        ));
    }
}
