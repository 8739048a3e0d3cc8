//! # Operator-split chemistry sub-step
//!
//! `OdeChemistrySolver::solve` advances one cell over `[0, delta_t]`:
//! 1. resize the state vector if the integrator reports a new problem size
//!    (mechanism reduction changes the number of active species);
//! 2. pack `[p, T, c_0, ..., c_{K-1}]`;
//! 3. integrate with the configured stiff integrator, which updates the
//!    suggested sub-step;
//! 4. unpack: `p` and `T` copied back, tracked species clamped at zero, the
//!    last specie set to `1 - sum`.
//!
//! Integrator failures are returned unchanged. A non-positive `delta_t`
//! leaves every value untouched.
use crate::Chemistry::ode_integrator::{
    OdeError, OdeIntegrator, OdeIntegratorEnum, OdeSettings, create_ode_integrator,
};
use crate::Chemistry::ode_system::ReactorOdeSystem;
use crate::Chemistry::state_vector::ChemistryStateVector;
use crate::Thermophysics::equation_of_state::EquationOfStateEnum;
use crate::Thermophysics::mechanism::{MechanismEnum, ReactionMechanism, ReactionSettings};
use crate::Thermophysics::species::SpeciesTable;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MechanismReductionSettings {
    pub active: bool,
    /// mass fraction below which a non-reacting specie is frozen
    pub threshold: f64,
}

impl Default for MechanismReductionSettings {
    fn default() -> Self {
        Self {
            active: false,
            threshold: 1e-10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChemistrySettings {
    #[serde(flatten)]
    pub ode: OdeSettings,
    /// first sub-step tried in every cell, s
    pub initial_chemical_time_step: f64,
    pub mechanism_reduction: MechanismReductionSettings,
    pub reactions: Vec<ReactionSettings>,
}

impl Default for ChemistrySettings {
    fn default() -> Self {
        Self {
            ode: OdeSettings::default(),
            initial_chemical_time_step: 1e-7,
            mechanism_reduction: MechanismReductionSettings::default(),
            reactions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OdeChemistrySolver {
    pub species: SpeciesTable,
    pub eos: EquationOfStateEnum,
    pub mechanism: MechanismEnum,
    pub integrator: OdeIntegratorEnum,
    /// `Some(threshold)` when mechanism reduction is on
    pub reduction: Option<f64>,
}

impl OdeChemistrySolver {
    pub fn new(
        species: SpeciesTable,
        eos: EquationOfStateEnum,
        mechanism: MechanismEnum,
        settings: &ChemistrySettings,
    ) -> Result<Self, OdeError> {
        let integrator = create_ode_integrator(&settings.ode)?;
        let reduction = settings
            .mechanism_reduction
            .active
            .then_some(settings.mechanism_reduction.threshold);
        Ok(Self {
            species,
            eos,
            mechanism,
            integrator,
            reduction,
        })
    }

    /// number of tracked species stored in the state vector
    pub fn n_tracked(&self) -> usize {
        self.species.len().saturating_sub(1)
    }

    /// Active tracked species for the composition `c`: all of them without
    /// reduction, otherwise up to the last one that is either above the
    /// threshold or takes part in a reaction.
    pub fn n_active(&self, c: &[f64]) -> usize {
        let n_tracked = self.n_tracked();
        match self.reduction {
            None => n_tracked,
            Some(threshold) => (0..n_tracked)
                .rev()
                .find(|&i| c[i] > threshold || self.mechanism.is_reactive(i))
                .map_or(0, |i| i + 1),
        }
    }

    /// Advances one cell by `delta_t`; `state` is caller-owned scratch reused
    /// between cells.
    pub fn solve(
        &self,
        c: &mut [f64],
        t: &mut f64,
        p: &mut f64,
        delta_t: &mut f64,
        sub_delta_t: &mut f64,
        state: &mut ChemistryStateVector,
    ) -> Result<(), OdeError> {
        if *delta_t <= 0.0 {
            return Ok(());
        }
        let n_active = self.n_active(c);
        {
            let system =
                ReactorOdeSystem::new(&self.species, &self.eos, &self.mechanism, c, n_active);
            if self.integrator.resize(&system, state) {
                self.integrator.resize_field(&system, state);
            }
            state.pack(*p, *t, c);
            self.integrator
                .solve(&system, 0.0, *delta_t, state.as_mut_slice(), sub_delta_t)?;
        }
        state.unpack(c, t, p);
        Ok(())
    }
}
