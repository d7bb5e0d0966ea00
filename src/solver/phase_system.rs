use crate::composition_set::CompositionSet;
use crate::errors::{SolverError, SolverResult};
use crate::MIN_SITE_FRACTION;
use ndarray::prelude::*;
use num_dual::linalg::LU;

/// Derivatives of one phase model at its current degree-of-freedom
/// vector.
struct Derivatives {
    grad: Array1<f64>,
    hess: Array2<f64>,
    mass_jac: Array2<f64>,
    cons_jac: Array2<f64>,
}

/// Linearization of one composition set, condensed through its internal
/// constraints (Sundman 2015, Eq. 44).
///
/// The condensed vectors project responses of the internal degrees of
/// freedom onto changes of the chemical potentials (`c_component`), the
/// state variables (`c_statevars`) and the Gibbs energy gradient (`c_g`).
/// They are consumed by the global equilibrium system.
pub(crate) struct CondensedPhase {
    /// Molar Gibbs energy at the updated site fractions.
    pub energy: f64,
    /// Moles of every component per mole of formula units.
    pub masses: Array1<f64>,
    /// State-variable part of the Gibbs energy gradient.
    pub grad_statevars: Array1<f64>,
    /// Internal columns of the mass Jacobian, one row per component.
    pub mass_jac: Array2<f64>,
    pub c_g: Array1<f64>,
    pub c_statevars: Array2<f64>,
    pub c_component: Array2<f64>,
    /// Largest absolute internal-constraint residual before the update.
    pub max_cons_residual: f64,
    /// Largest site-fraction step actually applied.
    pub dof_change: f64,
}

fn evaluate_derivatives(
    compset: &CompositionSet,
    num_components: usize,
) -> SolverResult<Derivatives> {
    let n = compset.dof.len();
    let num_cons = compset.model.num_internal_cons();
    let x = compset.dof.view();

    let mut grad = Array1::zeros(n);
    compset.model.gradient(x, grad.view_mut());
    let mut hess = Array2::zeros((n, n));
    compset.model.hessian(x, hess.view_mut());
    let mut mass_jac = Array2::zeros((num_components, n));
    for comp in 0..num_components {
        compset.model.moles_gradient(x, comp, mass_jac.row_mut(comp));
    }
    let mut cons_jac = Array2::zeros((num_cons, n));
    compset.model.internal_constraints_jacobian(x, cons_jac.view_mut());

    if !grad.iter().all(|g| g.is_finite()) {
        return Err(SolverError::NumericFault(
            compset.name().to_owned(),
            "gradient",
        ));
    }
    if !hess.iter().all(|h| h.is_finite()) {
        return Err(SolverError::NumericFault(
            compset.name().to_owned(),
            "Hessian",
        ));
    }
    Ok(Derivatives {
        grad,
        hess,
        mass_jac,
        cons_jac,
    })
}

fn solve_phase_system(
    matrix: &Array2<f64>,
    rhs: &Array1<f64>,
    name: &str,
) -> SolverResult<Array1<f64>> {
    Ok(LU::new(matrix.clone())
        .map_err(|_| SolverError::SingularPhaseMatrix(name.to_owned()))?
        .solve(rhs))
}

/// The symmetric saddle-point matrix coupling the internal block of the
/// Hessian with the internal columns of the constraint Jacobian.
fn phase_matrix(
    deriv: &Derivatives,
    num_statevars: usize,
    phase_dof: usize,
    num_cons: usize,
) -> Array2<f64> {
    let mut matrix = Array2::zeros((phase_dof + num_cons, phase_dof + num_cons));
    for i in 0..phase_dof {
        for j in 0..phase_dof {
            matrix[[i, j]] = deriv.hess[[num_statevars + i, num_statevars + j]];
        }
        for c in 0..num_cons {
            matrix[[i, phase_dof + c]] = deriv.cons_jac[[c, num_statevars + i]];
            matrix[[phase_dof + c, i]] = deriv.cons_jac[[c, num_statevars + i]];
        }
    }
    matrix
}

/// Advance the site fractions of one composition set by one constrained
/// Newton step and return its condensed linearization.
///
/// The step solves the saddle-point system
/// ```text
/// [ H_yy  Jᵀ ] [ δy ]   [ -g_y - H_ys δs + Σ_c μ_c ∂m_c/∂y ]
/// [ J     0  ] [ λ  ] = [ -c(y)                            ]
/// ```
/// and applies `δy` clipped to `[MIN_SITE_FRACTION, 1]`. The condensed
/// blocks are evaluated at the updated site fractions so that they are
/// consistent with the masses and energies seen by the global system.
pub(crate) fn update_phase(
    compset: &mut CompositionSet,
    num_statevars: usize,
    num_components: usize,
    delta_statevars: &Array1<f64>,
    chemical_potentials: &Array1<f64>,
) -> SolverResult<CondensedPhase> {
    let phase_dof = compset.model.phase_dof();
    let num_cons = compset.model.num_internal_cons();

    let deriv = evaluate_derivatives(compset, num_components)?;
    let mut cons = Array1::zeros(num_cons);
    compset
        .model
        .internal_constraints(compset.dof.view(), cons.view_mut());
    let max_cons_residual = cons.iter().fold(0.0f64, |acc, c| acc.max(c.abs()));

    let matrix = phase_matrix(&deriv, num_statevars, phase_dof, num_cons);
    let mut rhs = Array1::zeros(phase_dof + num_cons);
    for i in 0..phase_dof {
        let mut r = -deriv.grad[num_statevars + i];
        for sv in 0..num_statevars {
            r -= deriv.hess[[num_statevars + i, sv]] * delta_statevars[sv];
        }
        for comp in 0..num_components {
            r += chemical_potentials[comp] * deriv.mass_jac[[comp, num_statevars + i]];
        }
        rhs[i] = r;
    }
    for c in 0..num_cons {
        rhs[phase_dof + c] = -cons[c];
    }

    let step = solve_phase_system(&matrix, &rhs, compset.name())?;
    let mut dof_change = 0.0f64;
    for i in 0..phase_dof {
        let old = compset.dof[num_statevars + i];
        let new = (old + step[i]).clamp(MIN_SITE_FRACTION, 1.0);
        compset.dof[num_statevars + i] = new;
        dof_change = dof_change.max((new - old).abs());
    }

    // re-linearize at the updated site fractions
    let deriv = evaluate_derivatives(compset, num_components)?;
    let matrix = phase_matrix(&deriv, num_statevars, phase_dof, num_cons);

    // top-left block of the inverse saddle-point matrix, obtained from
    // solves against unit right-hand sides
    let mut e_matrix = Array2::zeros((phase_dof, phase_dof));
    for j in 0..phase_dof {
        let mut unit = Array1::zeros(phase_dof + num_cons);
        unit[j] = 1.0;
        let column = solve_phase_system(&matrix, &unit, compset.name())?;
        for i in 0..phase_dof {
            e_matrix[[i, j]] = column[i];
        }
    }

    let grad_y = deriv.grad.slice(s![num_statevars..]).to_owned();
    let hess_ys = deriv.hess.slice(s![num_statevars.., ..num_statevars]);
    let mass_jac_y = deriv.mass_jac.slice(s![.., num_statevars..]).to_owned();
    let c_g = -e_matrix.dot(&grad_y);
    let c_statevars = -e_matrix.dot(&hess_ys);
    let c_component = mass_jac_y.dot(&e_matrix.t());

    let energy = compset.model.energy(compset.dof.view());
    if !energy.is_finite() {
        return Err(SolverError::NumericFault(
            compset.name().to_owned(),
            "energy",
        ));
    }
    let masses = Array1::from_shape_fn(num_components, |comp| {
        compset.model.moles(compset.dof.view(), comp)
    });

    Ok(CondensedPhase {
        energy,
        masses,
        grad_statevars: deriv.grad.slice(s![..num_statevars]).to_owned(),
        mass_jac: mass_jac_y,
        c_g,
        c_statevars,
        c_component,
        max_cons_residual,
        dof_change,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RegularSolution;
    use approx::assert_abs_diff_eq;
    use ndarray::arr1;
    use std::sync::Arc;

    fn ideal_compset(y: [f64; 2]) -> CompositionSet {
        let model = Arc::new(RegularSolution::ideal(
            "alpha",
            vec![-12000.0, -8000.0],
            vec![-10.0, -12.0],
        ));
        CompositionSet::new(model, arr1(&[1000.0, 1e5, y[0], y[1]]), 1.0)
    }

    #[test]
    fn update_preserves_site_fraction_balance() {
        let mut compset = ideal_compset([0.7, 0.3]);
        let delta_statevars = Array1::zeros(2);
        let chemical_potentials = arr1(&[-22000.0, -20000.0]);
        update_phase(&mut compset, 2, 2, &delta_statevars, &chemical_potentials).unwrap();
        assert_abs_diff_eq!(compset.site_fractions(2).sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn condensed_blocks_annihilate_the_constraint() {
        // rows of the E-matrix sum to zero against the site-fraction
        // balance, so every condensed vector does as well
        let mut compset = ideal_compset([0.6, 0.4]);
        let delta_statevars = Array1::zeros(2);
        let chemical_potentials = arr1(&[-22000.0, -20000.0]);
        let phase =
            update_phase(&mut compset, 2, 2, &delta_statevars, &chemical_potentials).unwrap();
        assert_abs_diff_eq!(phase.c_g.sum(), 0.0, epsilon = 1e-8);
        for comp in 0..2 {
            assert_abs_diff_eq!(phase.c_component.row(comp).sum(), 0.0, epsilon = 1e-12);
        }
        for sv in 0..2 {
            assert_abs_diff_eq!(phase.c_statevars.column(sv).sum(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn a_feasible_interior_point_stays_feasible() {
        let mut compset = ideal_compset([0.5, 0.5]);
        let delta_statevars = Array1::zeros(2);
        let chemical_potentials = arr1(&[-25000.0, -25000.0]);
        let phase =
            update_phase(&mut compset, 2, 2, &delta_statevars, &chemical_potentials).unwrap();
        assert_abs_diff_eq!(phase.max_cons_residual, 0.0, epsilon = 1e-12);
        assert!(compset
            .site_fractions(2)
            .iter()
            .all(|&y| (MIN_SITE_FRACTION..=1.0).contains(&y)));
    }
}
