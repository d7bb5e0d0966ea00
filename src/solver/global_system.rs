use super::phase_system::CondensedPhase;
use crate::composition_set::CompositionSet;
use crate::conditions::EquilibriumConditions;
use crate::errors::{SolverError, SolverResult};
use nalgebra::{DMatrix, DVector};
use ndarray::prelude::*;

/// Singular values below this cutoff are dropped in the least-squares
/// solve. The system is nominally square but becomes rank deficient when
/// two stable phases degenerate into one; the pseudo-inverse absorbs this
/// instead of failing.
const LSTSQ_RCOND: f64 = 1e-21;

/// The global Newton system in the unknowns
/// `[δμ_free | δN_stable_phases | δs_free]`.
///
/// Rows are, in order: one linearized `G = Σ_c μ_c m_c` relation per
/// stable phase, one mass-balance correction per prescribed element, and
/// the total-system-amount balance.
pub(crate) struct GlobalSystem {
    matrix: DMatrix<f64>,
    rhs: DVector<f64>,
    /// Relative elemental imbalances plus the absolute system-amount
    /// imbalance of the current iterate.
    pub mass_residual: f64,
}

pub(crate) fn assemble(
    phases: &[CondensedPhase],
    free_stable: &[usize],
    phase_amt: &Array1<f64>,
    conditions: &EquilibriumConditions,
    chemical_potentials: &Array1<f64>,
    current_elemental_amounts: &Array1<f64>,
    current_system_amount: f64,
) -> GlobalSystem {
    let num_free_mu = conditions.free_chemical_potential_indices.len();
    let num_stable = free_stable.len();
    let num_free_sv = conditions.free_statevar_indices.len();
    let rows = num_stable + conditions.prescribed_element_indices.len() + 1;
    let cols = num_free_mu + num_stable + num_free_sv;
    let mut matrix = DMatrix::zeros(rows, cols);
    let mut rhs = DVector::zeros(rows);

    for (stable_idx, &idx) in free_stable.iter().enumerate() {
        let phase = &phases[idx];
        let amount = phase_amt[idx];

        // stable phase row: G = Σ_c μ_c m_c, linearized in the free
        // chemical potentials and state variables
        for (col, &comp) in conditions
            .free_chemical_potential_indices
            .iter()
            .enumerate()
        {
            matrix[(stable_idx, col)] = phase.masses[comp];
        }
        for (col, &sv) in conditions.free_statevar_indices.iter().enumerate() {
            matrix[(stable_idx, num_free_mu + num_stable + col)] = -phase.grad_statevars[sv];
        }
        let mut r = phase.energy;
        for &comp in &conditions.fixed_chemical_potential_indices {
            r -= phase.masses[comp] * chemical_potentials[comp];
        }
        rhs[stable_idx] = r;

        // one mass-balance row per prescribed element, and the final row
        // balancing the total system amount over every component
        for (fc, &comp) in conditions.prescribed_element_indices.iter().enumerate() {
            fill_mass_row(
                &mut matrix,
                &mut rhs,
                num_stable + fc,
                comp,
                phase,
                amount,
                stable_idx,
                num_stable,
                conditions,
                chemical_potentials,
            );
        }
        for comp in 0..conditions.num_components {
            fill_mass_row(
                &mut matrix,
                &mut rhs,
                rows - 1,
                comp,
                phase,
                amount,
                stable_idx,
                num_stable,
                conditions,
                chemical_potentials,
            );
        }
    }

    let mut mass_residual = 0.0;
    for (fc, &comp) in conditions.prescribed_element_indices.iter().enumerate() {
        let imbalance =
            current_elemental_amounts[comp] - conditions.prescribed_elemental_amounts[fc];
        rhs[num_stable + fc] -= imbalance;
        mass_residual += imbalance.abs() / conditions.prescribed_elemental_amounts[fc].abs();
    }
    let imbalance = current_system_amount - conditions.prescribed_system_amount;
    rhs[rows - 1] -= imbalance;
    mass_residual += imbalance.abs();

    GlobalSystem {
        matrix,
        rhs,
        mass_residual,
    }
}

/// Contributions of one stable phase to a mass-balance row: the
/// composition response to the free chemical potentials and state
/// variables through the condensed blocks, the phase-amount column, and
/// the gradient relaxation on the right-hand side.
fn fill_mass_row(
    matrix: &mut DMatrix<f64>,
    rhs: &mut DVector<f64>,
    row: usize,
    comp: usize,
    phase: &CondensedPhase,
    amount: f64,
    stable_idx: usize,
    num_stable: usize,
    conditions: &EquilibriumConditions,
    chemical_potentials: &Array1<f64>,
) {
    let num_free_mu = conditions.free_chemical_potential_indices.len();
    let mass_jac = phase.mass_jac.row(comp);

    for (col, &chempot_idx) in conditions
        .free_chemical_potential_indices
        .iter()
        .enumerate()
    {
        matrix[(row, col)] += amount * mass_jac.dot(&phase.c_component.row(chempot_idx));
    }
    matrix[(row, num_free_mu + stable_idx)] += phase.masses[comp];
    for (col, &sv) in conditions.free_statevar_indices.iter().enumerate() {
        matrix[(row, num_free_mu + num_stable + col)] +=
            amount * mass_jac.dot(&phase.c_statevars.column(sv));
    }
    rhs[row] -= amount * mass_jac.dot(&phase.c_g);
    for &chempot_idx in &conditions.fixed_chemical_potential_indices {
        rhs[row] -= amount
            * chemical_potentials[chempot_idx]
            * mass_jac.dot(&phase.c_component.row(chempot_idx));
    }
}

impl GlobalSystem {
    /// Solve by SVD least squares. Rank-deficient systems fall back to
    /// the pseudo-inverse solution instead of failing.
    pub fn solve(self) -> SolverResult<DVector<f64>> {
        let svd = self.matrix.svd(true, true);
        svd.solve(&self.rhs, LSTSQ_RCOND)
            .map_err(|e| SolverError::Error(e.to_owned()))
    }
}

pub(crate) struct SolutionTracking {
    /// Largest relative change of any chemical potential or state
    /// variable in this step.
    pub largest_statevar_change: f64,
    /// Largest absolute phase-amount increment in this step.
    pub largest_phase_amt_change: f64,
}

/// Unpack the global solution vector: absolute chemical potentials,
/// phase-amount increments clipped to `[0, 1]`, and state-variable
/// increments applied to every composition set.
pub(crate) fn apply_solution(
    solution: &DVector<f64>,
    compsets: &mut [CompositionSet],
    free_stable: &[usize],
    phase_amt: &mut Array1<f64>,
    chemical_potentials: &mut Array1<f64>,
    delta_statevars: &mut Array1<f64>,
    conditions: &EquilibriumConditions,
) -> SolutionTracking {
    let num_free_mu = conditions.free_chemical_potential_indices.len();
    let num_stable = free_stable.len();
    let mut largest_statevar_change = 0.0f64;
    let mut largest_phase_amt_change = 0.0f64;

    for (col, &comp) in conditions
        .free_chemical_potential_indices
        .iter()
        .enumerate()
    {
        let new = solution[col];
        let relative = ((new - chemical_potentials[comp]) / chemical_potentials[comp]).abs();
        largest_statevar_change = largest_statevar_change.max(relative);
        chemical_potentials[comp] = new;
    }

    for (col, &idx) in free_stable.iter().enumerate() {
        let delta = solution[num_free_mu + col];
        phase_amt[idx] = (phase_amt[idx] + delta).clamp(0.0, 1.0);
        largest_phase_amt_change = largest_phase_amt_change.max(delta.abs());
    }

    delta_statevars.fill(0.0);
    for (col, &sv) in conditions.free_statevar_indices.iter().enumerate() {
        delta_statevars[sv] = solution[num_free_mu + num_stable + col];
    }
    for sv in 0..conditions.num_statevars {
        let relative = (delta_statevars[sv] / compsets[0].dof[sv]).abs();
        if !relative.is_nan() {
            largest_statevar_change = largest_statevar_change.max(relative);
        }
    }
    for compset in compsets.iter_mut() {
        for sv in 0..conditions.num_statevars {
            compset.dof[sv] += delta_statevars[sv];
        }
    }

    SolutionTracking {
        largest_statevar_change,
        largest_phase_amt_change,
    }
}
