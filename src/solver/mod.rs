use crate::composition_set::CompositionSet;
use crate::conditions::EquilibriumConditions;
use crate::errors::{SolverError, SolverResult};
use crate::{SolverOptions, Verbosity, MIN_SITE_FRACTION};
use ndarray::prelude::*;
use std::fmt;

mod global_system;
mod phase_system;

const MAX_ITER_EQUILIBRIUM: usize = 100;
const MASS_RESIDUAL_TOL: f64 = 1e-5;
const INTERNAL_CONS_TOL: f64 = 1e-10;
const INTERNAL_DOF_TOL: f64 = 1e-11;
const PHASE_AMT_TOL: f64 = 1e-10;
const STATEVAR_TOL: f64 = 1e-1;
const DRIVING_FORCE_TOL: f64 = -1e-5;

/// Result of an equilibrium calculation.
///
/// A calculation that runs out of iterations is reported through
/// `converged` rather than an error; the final iterate is returned either
/// way and the caller decides whether to accept it.
pub struct EquilibriumSolution {
    /// Whether the convergence criteria were satisfied.
    pub converged: bool,
    /// Number of iterations performed.
    pub iterations: usize,
    /// State variables of the first composition set, followed by the
    /// site fractions of every composition set, followed by the phase
    /// amounts.
    pub x: Array1<f64>,
    /// Chemical potentials of all components.
    pub chemical_potentials: Array1<f64>,
}

impl fmt::Display for EquilibriumSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.converged {
            writeln!(f, "converged in {} iteration(s)", self.iterations)?;
        } else {
            writeln!(f, "not converged after {} iteration(s)", self.iterations)?;
        }
        write!(f, "chemical potentials: {:.8}", self.chemical_potentials)
    }
}

/// Find the phase amounts, site fractions, chemical potentials and free
/// state variables that satisfy the imposed conditions.
///
/// Every iteration advances the site fractions of all composition sets
/// (stable and metastable alike) by a constrained Newton step, then
/// corrects the free chemical potentials, the amounts of the stable
/// phases and the free state variables through a global least-squares
/// solve. Once the iterate is feasible, phases whose amount fell below
/// [MIN_SITE_FRACTION] are removed from the stable set and phases with a
/// non-negative driving force are added to it.
///
/// The composition sets are updated in place and hold the final state on
/// return.
pub fn find_solution(
    compsets: &mut [CompositionSet],
    conditions: &EquilibriumConditions,
    options: SolverOptions,
) -> SolverResult<EquilibriumSolution> {
    let (max_iter, verbosity) = options.unwrap_or(MAX_ITER_EQUILIBRIUM);
    conditions.validate()?;
    if compsets.is_empty() {
        return Err(SolverError::Error(
            "at least one composition set is required".to_owned(),
        ));
    }
    let num_statevars = conditions.num_statevars;
    let num_components = conditions.num_components;

    let mut chemical_potentials = conditions.initial_chemical_potentials.clone();
    let mut phase_amt = Array1::from_iter(compsets.iter().map(|c| c.phase_amount));
    let mut free_stable: Vec<usize> = (0..compsets.len())
        .filter(|&idx| phase_amt[idx] > MIN_SITE_FRACTION)
        .collect();
    let mut delta_statevars = Array1::zeros(num_statevars);

    log_iter!(verbosity, " iter |  mass residual | max(|constr.|) | stable phases");
    log_iter!(verbosity, "{:-<52}", "");

    let mut converged = false;
    let mut iterations = 0;
    for _ in 0..max_iter {
        iterations += 1;
        let mut largest_internal_dof_change = 0.0f64;
        let mut largest_cons_residual = 0.0f64;

        // internal update of every composition set
        let mut phases = Vec::with_capacity(compsets.len());
        for compset in compsets.iter_mut() {
            let phase = phase_system::update_phase(
                compset,
                num_statevars,
                num_components,
                &delta_statevars,
                &chemical_potentials,
            )?;
            largest_internal_dof_change = largest_internal_dof_change.max(phase.dof_change);
            largest_cons_residual = largest_cons_residual.max(phase.max_cons_residual);
            phases.push(phase);
        }

        // current mass of the stable phases
        let mut current_elemental_amounts = Array1::zeros(num_components);
        let mut current_system_amount = 0.0;
        for &idx in &free_stable {
            for comp in 0..num_components {
                let amount = phase_amt[idx] * phases[idx].masses[comp];
                current_elemental_amounts[comp] += amount;
                current_system_amount += amount;
            }
        }

        let rows = free_stable.len() + conditions.prescribed_element_indices.len() + 1;
        let cols = conditions.free_chemical_potential_indices.len()
            + free_stable.len()
            + conditions.free_statevar_indices.len();
        if rows != cols {
            return Err(SolverError::GibbsPhaseRule(rows, cols));
        }

        let system = global_system::assemble(
            &phases,
            &free_stable,
            &phase_amt,
            conditions,
            &chemical_potentials,
            &current_elemental_amounts,
            current_system_amount,
        );
        let mass_residual = system.mass_residual;
        let solution = system.solve()?;
        let tracking = global_system::apply_solution(
            &solution,
            compsets,
            &free_stable,
            &mut phase_amt,
            &mut chemical_potentials,
            &mut delta_statevars,
            conditions,
        );

        log_iter!(
            verbosity,
            " {:4} | {:14.8e} | {:14.8e} | {:13}",
            iterations,
            mass_residual,
            largest_cons_residual,
            free_stable.len()
        );

        // the iterate has to be feasible before phases are added or
        // removed and before convergence can be declared
        if mass_residual < MASS_RESIDUAL_TOL && largest_cons_residual < INTERNAL_CONS_TOL {
            let mut new_stable: Vec<usize> = (0..compsets.len())
                .filter(|&idx| phase_amt[idx] > MIN_SITE_FRACTION)
                .collect();
            for (idx, phase) in phases.iter().enumerate() {
                let driving_force = chemical_potentials.dot(&phase.masses) - phase.energy;
                if driving_force > DRIVING_FORCE_TOL && !new_stable.contains(&idx) {
                    new_stable.push(idx);
                }
            }
            new_stable.sort_unstable();
            let unchanged = new_stable == free_stable;
            free_stable = new_stable;
            if unchanged
                && largest_internal_dof_change < INTERNAL_DOF_TOL
                && tracking.largest_phase_amt_change < PHASE_AMT_TOL
                && tracking.largest_statevar_change < STATEVAR_TOL
            {
                converged = true;
                break;
            }
        }
    }

    for (idx, compset) in compsets.iter_mut().enumerate() {
        compset.phase_amount = phase_amt[idx];
    }
    if converged {
        log_result!(
            verbosity,
            "Equilibrium: calculation converged in {} iteration(s)\n",
            iterations
        );
    } else {
        log_result!(
            verbosity,
            "Equilibrium: calculation did not converge within {} iteration(s)\n",
            iterations
        );
    }

    let mut x = Vec::with_capacity(
        compsets.iter().map(|c| c.dof.len()).sum::<usize>() + compsets.len(),
    );
    x.extend(compsets[0].dof.iter().copied());
    for compset in &compsets[1..] {
        x.extend(compset.dof.slice(s![num_statevars..]).iter().copied());
    }
    x.extend(phase_amt.iter().copied());

    Ok(EquilibriumSolution {
        converged,
        iterations,
        x: Array1::from_vec(x),
        chemical_potentials,
    })
}
