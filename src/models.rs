//! Closed-form solution models.
//!
//! These models are primarily useful for testing the solver against
//! equilibria with known analytic solutions. Database-driven sublattice
//! models live outside of this crate and only have to implement
//! [PhaseModel].
use crate::phase_model::PhaseModel;
use crate::RGAS;
use ndarray::{s, Array1, Array2, ArrayView1, ArrayViewMut1, ArrayViewMut2};

/// State variables expected by the models in this module: temperature and
/// pressure, in that order, ahead of the site fractions.
const NUM_STATEVARS: usize = 2;

/// A substitutional solution phase on a single sublattice.
///
/// The molar Gibbs energy per mole of formula units is
/// $$G = \sum_i y_i G_i^\circ(T) + RT \sum_i y_i \ln y_i
///     + \sum_{i<j} \omega_{ij} y_i y_j$$
/// with endmember energies linear in temperature,
/// $G_i^\circ(T) = a_i + b_i T$. The model is pressure independent,
/// expects the degree-of-freedom layout `[T, p, y_0, ..., y_{n-1}]` and
/// maps component `i` onto species `i`. With zero interaction energies it
/// reduces to an ideal solution.
pub struct RegularSolution {
    name: String,
    endmember_a: Array1<f64>,
    endmember_b: Array1<f64>,
    interaction: Array2<f64>,
}

impl RegularSolution {
    /// A regular solution with endmember energies `a + b * T` and a
    /// symmetric interaction matrix with zero diagonal.
    pub fn new(
        name: &str,
        endmember_a: Vec<f64>,
        endmember_b: Vec<f64>,
        interaction: Array2<f64>,
    ) -> Self {
        assert_eq!(endmember_a.len(), endmember_b.len());
        assert_eq!(interaction.nrows(), endmember_a.len());
        assert_eq!(interaction.ncols(), endmember_a.len());
        Self {
            name: name.to_owned(),
            endmember_a: Array1::from_vec(endmember_a),
            endmember_b: Array1::from_vec(endmember_b),
            interaction,
        }
    }

    /// An ideal solution: a regular solution without interactions.
    pub fn ideal(name: &str, endmember_a: Vec<f64>, endmember_b: Vec<f64>) -> Self {
        let n = endmember_a.len();
        Self::new(name, endmember_a, endmember_b, Array2::zeros((n, n)))
    }

    fn num_species(&self) -> usize {
        self.endmember_a.len()
    }
}

impl PhaseModel for RegularSolution {
    fn name(&self) -> &str {
        &self.name
    }

    fn phase_dof(&self) -> usize {
        self.num_species()
    }

    fn num_internal_cons(&self) -> usize {
        1
    }

    fn energy(&self, x: ArrayView1<f64>) -> f64 {
        let t = x[0];
        let y = x.slice(s![NUM_STATEVARS..]);
        let mut energy = 0.0;
        for i in 0..self.num_species() {
            energy += y[i] * (self.endmember_a[i] + self.endmember_b[i] * t);
            energy += RGAS * t * y[i] * y[i].ln();
            for j in i + 1..self.num_species() {
                energy += self.interaction[[i, j]] * y[i] * y[j];
            }
        }
        energy
    }

    fn gradient(&self, x: ArrayView1<f64>, mut out: ArrayViewMut1<f64>) {
        let t = x[0];
        let y = x.slice(s![NUM_STATEVARS..]);
        out.fill(0.0);
        for i in 0..self.num_species() {
            out[0] += y[i] * self.endmember_b[i] + RGAS * y[i] * y[i].ln();
            out[NUM_STATEVARS + i] = self.endmember_a[i]
                + self.endmember_b[i] * t
                + RGAS * t * (y[i].ln() + 1.0)
                + self.interaction.row(i).dot(&y);
        }
    }

    fn hessian(&self, x: ArrayView1<f64>, mut out: ArrayViewMut2<f64>) {
        let t = x[0];
        let y = x.slice(s![NUM_STATEVARS..]);
        out.fill(0.0);
        for i in 0..self.num_species() {
            let dt_dy = self.endmember_b[i] + RGAS * (y[i].ln() + 1.0);
            out[[0, NUM_STATEVARS + i]] = dt_dy;
            out[[NUM_STATEVARS + i, 0]] = dt_dy;
            for j in 0..self.num_species() {
                out[[NUM_STATEVARS + i, NUM_STATEVARS + j]] = self.interaction[[i, j]];
            }
            out[[NUM_STATEVARS + i, NUM_STATEVARS + i]] += RGAS * t / y[i];
        }
    }

    fn moles(&self, x: ArrayView1<f64>, comp: usize) -> f64 {
        x[NUM_STATEVARS + comp]
    }

    fn moles_gradient(&self, _x: ArrayView1<f64>, comp: usize, mut out: ArrayViewMut1<f64>) {
        out.fill(0.0);
        out[NUM_STATEVARS + comp] = 1.0;
    }

    fn internal_constraints(&self, x: ArrayView1<f64>, mut out: ArrayViewMut1<f64>) {
        out[0] = x.slice(s![NUM_STATEVARS..]).sum() - 1.0;
    }

    fn internal_constraints_jacobian(&self, _x: ArrayView1<f64>, mut out: ArrayViewMut2<f64>) {
        out.fill(0.0);
        for i in 0..self.num_species() {
            out[[0, NUM_STATEVARS + i]] = 1.0;
        }
    }
}
