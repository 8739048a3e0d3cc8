//! ODE systems integrated by the stiff solvers.
use crate::Chemistry::state_vector::N_STATE_HEADER;
use crate::Thermophysics::equation_of_state::{EquationOfState, EquationOfStateEnum};
use crate::Thermophysics::mechanism::{MechanismEnum, ReactionMechanism};
use crate::Thermophysics::species::SpeciesTable;
use nalgebra::DMatrix;
use std::cell::RefCell;

pub trait OdeSystem {
    fn n_eqns(&self) -> usize;

    fn derivatives(&self, x: f64, y: &[f64], dydx: &mut [f64]);

    /// Forward-difference Jacobian `d(dydx)/dy`.
    fn jacobian(&self, x: f64, y: &[f64], dfdy: &mut DMatrix<f64>) {
        let n = self.n_eqns();
        let mut f0 = vec![0.0; n];
        let mut f1 = vec![0.0; n];
        let mut y1 = y.to_vec();
        self.derivatives(x, y, &mut f0);
        for j in 0..n {
            let h = 1e-7 * y[j].abs().max(1e-3);
            y1[j] = y[j] + h;
            self.derivatives(x, &y1, &mut f1);
            for i in 0..n {
                dfdy[(i, j)] = (f1[i] - f0[i]) / h;
            }
            y1[j] = y[j];
        }
    }
}

/// Constant-pressure adiabatic reactor over the packed state
/// `[p, T, Y_0, ..., Y_{K-1}]`:
/// `dp/dt = 0`, `dY_i/dt = omega_i/rho`, `dT/dt = -sum(hf_i dY_i/dt)/cp`.
///
/// Tracked species beyond the first `n_active` are frozen at the values in
/// `frozen`; the last specie is `1 - sum` of the others.
pub struct ReactorOdeSystem<'a> {
    species: &'a SpeciesTable,
    eos: &'a EquationOfStateEnum,
    mechanism: &'a MechanismEnum,
    frozen: &'a [f64],
    n_active: usize,
    scratch: RefCell<(Vec<f64>, Vec<f64>)>,
}

impl<'a> ReactorOdeSystem<'a> {
    pub fn new(
        species: &'a SpeciesTable,
        eos: &'a EquationOfStateEnum,
        mechanism: &'a MechanismEnum,
        frozen: &'a [f64],
        n_active: usize,
    ) -> Self {
        let n = species.len();
        Self {
            species,
            eos,
            mechanism,
            frozen,
            n_active,
            scratch: RefCell::new((vec![0.0; n], vec![0.0; n])),
        }
    }
}

impl OdeSystem for ReactorOdeSystem<'_> {
    fn n_eqns(&self) -> usize {
        N_STATE_HEADER + self.n_active
    }

    fn derivatives(&self, _x: f64, y: &[f64], dydx: &mut [f64]) {
        let mut scratch = self.scratch.borrow_mut();
        let (mass_fractions, omega) = &mut *scratch;
        let n_last = mass_fractions.len() - 1;
        let (p, t) = (y[0], y[1]);

        let mut sum = 0.0;
        for i in 0..n_last {
            let value = if i < self.n_active {
                y[N_STATE_HEADER + i]
            } else {
                self.frozen[i]
            };
            mass_fractions[i] = value.max(0.0);
            sum += mass_fractions[i];
        }
        mass_fractions[n_last] = (1.0 - sum).max(0.0);

        let rho = self
            .eos
            .rho(p, t, self.species.mixture_molar_mass(mass_fractions));
        self.mechanism.omega(p, t, rho, mass_fractions, omega);

        let heat: f64 = omega
            .iter()
            .enumerate()
            .map(|(i, w)| self.species.hf(i) * w)
            .sum();
        dydx[0] = 0.0;
        dydx[1] = -heat / (rho * self.species.cp_mix(mass_fractions));
        for i in 0..self.n_active {
            dydx[N_STATE_HEADER + i] = omega[i] / rho;
        }
    }
}
