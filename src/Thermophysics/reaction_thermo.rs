//! # Reacting-mixture thermophysical state
//!
//! ## Purpose
//! `ReactionThermo` is the runtime composition of three independent
//! strategies: an equation of state, a transport model and a reaction
//! mechanism. On top of them it owns the thermodynamic fields of the flow:
//! pressure `p`, temperature `T`, the transported energy variable `he`
//! (sensible enthalpy `h` or sensible internal energy `e`), compressibility
//! `psi`, viscosity `mu`, thermal diffusivity `alpha` and the species mass
//! fractions `Y`.
//!
//! ## Energy
//! - `h = cp_mix (T - T_std)`
//! - `e = h - p/rho`
//!
//! `correct()` recovers `T` from the solved `he` cell by cell with a Newton
//! iteration and refreshes the derived fields.
//!
//! ## Boundary treatment
//! `he` follows `T`: a fixed-temperature patch gives a fixed-energy patch whose
//! values are evaluated from the boundary state; every other patch is
//! zero-gradient.
use crate::FiniteVolume::fields::{BoundaryCondition, PatchField, VolScalarField};
use crate::FiniteVolume::mesh::FvMesh;
use crate::Thermophysics::equation_of_state::{EquationOfState, EquationOfStateEnum};
use crate::Thermophysics::mechanism::MechanismEnum;
use crate::Thermophysics::species::SpeciesTable;
use crate::Thermophysics::transport::{TransportEnum, TransportModel};
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const T_LOW: f64 = 200.0;
const T_HIGH: f64 = 6000.0;
const MAX_T_ITER: usize = 100;
const T_TOL: f64 = 1e-9;

#[derive(Debug, Error)]
pub enum ThermoError {
    #[error("temperature inversion failed in cell {cell}: he = {target}, last T = {t_last} K")]
    TemperatureInversion { cell: usize, target: f64, t_last: f64 },
    #[error("invalid thermodynamic state: {0}")]
    InvalidState(String),
    #[error("thermo validation failed: {0}")]
    Validation(String),
    #[error("unknown {kind} '{name}'")]
    UnknownModel { kind: &'static str, name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnergyForm {
    #[serde(rename = "h")]
    Enthalpy,
    #[serde(rename = "e")]
    InternalEnergy,
}

impl EnergyForm {
    pub fn name(&self) -> &'static str {
        match self {
            EnergyForm::Enthalpy => "h",
            EnergyForm::InternalEnergy => "e",
        }
    }
}

#[allow(non_snake_case)]
#[derive(Debug, Clone)]
pub struct ReactionThermo {
    pub species: SpeciesTable,
    pub inert_index: usize,
    pub energy: EnergyForm,
    pub eos: EquationOfStateEnum,
    pub transport: TransportEnum,
    pub mechanism: MechanismEnum,
    pub p: VolScalarField,
    pub T: VolScalarField,
    pub he: VolScalarField,
    pub psi: VolScalarField,
    pub mu: VolScalarField,
    pub alpha: VolScalarField,
    pub Y: Vec<VolScalarField>,
    /// whether the energy equation needs `dp/dt`
    pub dpdt: bool,
}

impl ReactionThermo {
    #[allow(clippy::too_many_arguments)]
    #[allow(non_snake_case)]
    pub fn new(
        mesh: &FvMesh,
        species: SpeciesTable,
        inert_specie: &str,
        energy: EnergyForm,
        eos: EquationOfStateEnum,
        transport: TransportEnum,
        mechanism: MechanismEnum,
        p: VolScalarField,
        T: VolScalarField,
        Y: Vec<VolScalarField>,
    ) -> Result<Self, ThermoError> {
        if Y.len() != species.len() {
            return Err(ThermoError::Validation(format!(
                "{} mass-fraction fields for {} species",
                Y.len(),
                species.len()
            )));
        }
        let inert_index = species.index_of(inert_specie).ok_or_else(|| {
            ThermoError::Validation(format!("inert specie {} not found", inert_specie))
        })?;
        if inert_index + 1 != species.len() {
            warn!(
                "inert specie {} is not the last specie; chemistry closes the mass balance with {}",
                inert_specie,
                species.species[species.len() - 1].name
            );
        }

        let he_boundary = T
            .boundary
            .iter()
            .map(|pf| {
                if pf.condition.fixes_value() {
                    PatchField::fixed_value(0.0, pf.values.len())
                } else {
                    PatchField::zero_gradient(pf.values.len())
                }
            })
            .collect();
        let he = VolScalarField::uniform(energy.name(), mesh, 0.0, he_boundary);
        let psi = VolScalarField::calculated("psi", mesh, 0.0);
        let mu = VolScalarField::calculated("mu", mesh, 0.0);
        let alpha = VolScalarField::calculated("alpha", mesh, 0.0);

        let mut thermo = Self {
            species,
            inert_index,
            energy,
            eos,
            transport,
            mechanism,
            p,
            T,
            he,
            psi,
            mu,
            alpha,
            Y,
            dpdt: true,
        };
        let mut y = vec![0.0; thermo.species.len()];
        for cell in 0..mesh.n_cells() {
            thermo.cell_mass_fractions(cell, &mut y);
            thermo.he.internal[cell] =
                thermo.he_value(thermo.p.internal[cell], thermo.T.internal[cell], &y);
        }
        thermo.update_boundary(mesh);
        thermo.update_properties(mesh);
        Ok(thermo)
    }

    /// Checks that the transported energy variable is one the application solves for.
    pub fn validate(&self, application: &str, allowed: &[EnergyForm]) -> Result<(), ThermoError> {
        if allowed.contains(&self.energy) {
            Ok(())
        } else {
            Err(ThermoError::Validation(format!(
                "{} does not support energy variable {}",
                application,
                self.energy.name()
            )))
        }
    }

    pub fn n_species(&self) -> usize {
        self.species.len()
    }

    pub fn cell_mass_fractions(&self, cell: usize, y: &mut [f64]) {
        for (yi, field) in y.iter_mut().zip(&self.Y) {
            *yi = field.internal[cell];
        }
    }

    fn face_mass_fractions(&self, patch: usize, local: usize, y: &mut [f64]) {
        for (yi, field) in y.iter_mut().zip(&self.Y) {
            *yi = field.boundary[patch].values[local];
        }
    }

    pub fn rho_value(&self, p: f64, t: f64, y: &[f64]) -> f64 {
        self.eos.rho(p, t, self.species.mixture_molar_mass(y))
    }

    /// `h` or `e` of a mixture state, J/kg
    pub fn he_value(&self, p: f64, t: f64, y: &[f64]) -> f64 {
        let h = self.species.sensible_enthalpy(y, t);
        match self.energy {
            EnergyForm::Enthalpy => h,
            EnergyForm::InternalEnergy => h - p / self.rho_value(p, t, y),
        }
    }

    /// Newton inversion of `he(T) = target` starting from `t0`.
    pub fn temperature_from_he(&self, target: f64, p: f64, y: &[f64], t0: f64) -> Option<f64> {
        let mut t = t0.clamp(T_LOW, T_HIGH);
        for _ in 0..MAX_T_ITER {
            let dt = 1e-3 * t;
            let slope =
                (self.he_value(p, t + dt, y) - self.he_value(p, t - dt, y)) / (2.0 * dt);
            if !(slope.is_finite() && slope > 0.0) {
                return None;
            }
            let t_new = (t - (self.he_value(p, t, y) - target) / slope).clamp(T_LOW, T_HIGH);
            if (t_new - t).abs() <= T_TOL * t {
                return Some(t_new);
            }
            t = t_new;
        }
        None
    }

    /// Recovers `T` from `he` and refreshes the derived fields.
    pub fn correct(&mut self, mesh: &FvMesh) -> Result<(), ThermoError> {
        let mut y = vec![0.0; self.species.len()];
        for cell in 0..mesh.n_cells() {
            self.cell_mass_fractions(cell, &mut y);
            let target = self.he.internal[cell];
            let t0 = self.T.internal[cell];
            self.T.internal[cell] = self
                .temperature_from_he(target, self.p.internal[cell], &y, t0)
                .ok_or(ThermoError::TemperatureInversion {
                    cell,
                    target,
                    t_last: t0,
                })?;
        }
        self.T.correct_boundary_conditions(mesh);
        self.update_boundary(mesh);
        self.update_properties(mesh);
        Ok(())
    }

    /// Energy on fixed-temperature patches from the boundary state, others extrapolated.
    fn update_boundary(&mut self, mesh: &FvMesh) {
        let mut y = vec![0.0; self.species.len()];
        self.he.correct_boundary_conditions(mesh);
        for patch in 0..mesh.patches.len() {
            if self.he.boundary[patch].condition != BoundaryCondition::FixedValue {
                continue;
            }
            for local in 0..mesh.patches[patch].size {
                self.face_mass_fractions(patch, local, &mut y);
                let p = self.p.boundary[patch].values[local];
                let t = self.T.boundary[patch].values[local];
                self.he.boundary[patch].values[local] = self.he_value(p, t, &y);
            }
        }
    }

    fn update_properties(&mut self, mesh: &FvMesh) {
        let mut y = vec![0.0; self.species.len()];
        for cell in 0..mesh.n_cells() {
            self.cell_mass_fractions(cell, &mut y);
            let (p, t) = (self.p.internal[cell], self.T.internal[cell]);
            self.psi.internal[cell] = self.eos.psi(p, t, self.species.mixture_molar_mass(&y));
            self.mu.internal[cell] = self.transport.mu(t);
            self.alpha.internal[cell] = self.transport.alpha(t);
        }
        for patch in 0..mesh.patches.len() {
            for local in 0..mesh.patches[patch].size {
                self.face_mass_fractions(patch, local, &mut y);
                let p = self.p.boundary[patch].values[local];
                let t = self.T.boundary[patch].values[local];
                self.psi.boundary[patch].values[local] =
                    self.eos.psi(p, t, self.species.mixture_molar_mass(&y));
                self.mu.boundary[patch].values[local] = self.transport.mu(t);
                self.alpha.boundary[patch].values[local] = self.transport.alpha(t);
            }
        }
    }

    /// Density from the equation of state in cells and on boundary faces.
    pub fn rho(&self, mesh: &FvMesh) -> VolScalarField {
        let mut rho = VolScalarField::calculated("rho", mesh, 0.0);
        let mut y = vec![0.0; self.species.len()];
        for cell in 0..mesh.n_cells() {
            self.cell_mass_fractions(cell, &mut y);
            rho.internal[cell] = self.rho_value(self.p.internal[cell], self.T.internal[cell], &y);
        }
        for patch in 0..mesh.patches.len() {
            for local in 0..mesh.patches[patch].size {
                self.face_mass_fractions(patch, local, &mut y);
                rho.boundary[patch].values[local] = self.rho_value(
                    self.p.boundary[patch].values[local],
                    self.T.boundary[patch].values[local],
                    &y,
                );
            }
        }
        rho
    }

    /// Stores the old time level of every transported thermo field.
    pub fn store_old_time(&mut self) {
        self.he.store_old_time();
        self.p.store_old_time();
        self.psi.store_old_time();
        for y in self.Y.iter_mut() {
            y.store_old_time();
        }
    }
}
