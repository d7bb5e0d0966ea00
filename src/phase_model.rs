use ndarray::{ArrayView1, ArrayViewMut1, ArrayViewMut2};

/// Thermodynamic model of a single phase.
///
/// All evaluations take the full degree-of-freedom vector of the phase:
/// the state variables (shared across all phases of the system) followed
/// by the internal site fractions. With `S` state variables, `D` internal
/// degrees of freedom and `K` internal constraints, the vector has length
/// `S + D` and derivative buffers are shaped accordingly. Output buffers
/// are caller-owned and overwritten.
///
/// The solver consumes models behind `Arc<dyn PhaseModel>`, so one
/// calculation can mix phases described by entirely different models.
pub trait PhaseModel {
    /// Name of the phase, used in error messages.
    fn name(&self) -> &str;

    /// Number of internal degrees of freedom (site fractions).
    fn phase_dof(&self) -> usize;

    /// Number of internal equality constraints binding the site fractions
    /// (one per sublattice for sublattice models, plus charge balance for
    /// ionic phases).
    fn num_internal_cons(&self) -> usize;

    /// Molar Gibbs energy per mole of formula units.
    fn energy(&self, x: ArrayView1<f64>) -> f64;

    /// Gradient of the molar Gibbs energy, length `S + D`.
    fn gradient(&self, x: ArrayView1<f64>, out: ArrayViewMut1<f64>);

    /// Hessian of the molar Gibbs energy, shape `(S + D, S + D)`. The
    /// output must be symmetric.
    fn hessian(&self, x: ArrayView1<f64>, out: ArrayViewMut2<f64>);

    /// Moles of component `comp` per mole of formula units.
    fn moles(&self, x: ArrayView1<f64>, comp: usize) -> f64;

    /// Gradient of [moles](PhaseModel::moles), length `S + D`.
    fn moles_gradient(&self, x: ArrayView1<f64>, comp: usize, out: ArrayViewMut1<f64>);

    /// Residuals of the internal equality constraints, length `K`.
    fn internal_constraints(&self, x: ArrayView1<f64>, out: ArrayViewMut1<f64>);

    /// Jacobian of the internal equality constraints, shape `(K, S + D)`.
    fn internal_constraints_jacobian(&self, x: ArrayView1<f64>, out: ArrayViewMut2<f64>);
}
