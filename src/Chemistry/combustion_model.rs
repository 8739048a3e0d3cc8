//! # Combustion models
//!
//! A combustion model turns the chemistry of the current flow state into the
//! species reaction rates `RR_i` (kg/(m^3 s)) and the heat release `Qdot`
//! (W/m^3) used as sources by the species and energy equations of the next
//! step.
//!
//! - `none`: no reactions, all sources zero.
//! - `laminar`: direct integration. Every cell is advanced independently by
//!   the operator-split ODE sub-step over `delta_t`, in parallel (rayon), each
//!   worker with its own state-vector scratch. Rates follow from the change
//!   of composition, `RR_i = rho (Y_i' - Y_i)/delta_t`, and
//!   `Qdot = -sum(hf_i RR_i)`. Temperature and pressure returned by the
//!   sub-step are discarded: the energy equation carries the heat release.
use crate::Chemistry::ode_chemistry::OdeChemistrySolver;
use crate::Chemistry::ode_integrator::OdeError;
use crate::Chemistry::state_vector::ChemistryStateVector;
use crate::Thermophysics::reaction_thermo::ReactionThermo;
use crate::settings::ConfigError;
use enum_dispatch::enum_dispatch;
use log::info;
use rayon::prelude::*;

#[enum_dispatch]
pub trait CombustionModel {
    fn name(&self) -> &'static str;

    /// Updates `Qdot` and the reaction rates from the current state.
    fn correct(
        &mut self,
        thermo: &ReactionThermo,
        rho: &[f64],
        delta_t: f64,
    ) -> Result<(), OdeError>;

    /// heat release per cell, W/m^3
    fn qdot(&self) -> &[f64];

    /// mass production rate of `specie` per cell, kg/(m^3 s)
    fn reaction_rate(&self, specie: usize) -> &[f64];
}

#[derive(Debug, Clone)]
pub struct NoCombustion {
    qdot: Vec<f64>,
    rr: Vec<Vec<f64>>,
}

impl NoCombustion {
    pub fn new(n_cells: usize, n_species: usize) -> Self {
        Self {
            qdot: vec![0.0; n_cells],
            rr: vec![vec![0.0; n_cells]; n_species],
        }
    }
}

impl CombustionModel for NoCombustion {
    fn name(&self) -> &'static str {
        "none"
    }

    fn correct(
        &mut self,
        _thermo: &ReactionThermo,
        _rho: &[f64],
        _delta_t: f64,
    ) -> Result<(), OdeError> {
        Ok(())
    }

    fn qdot(&self) -> &[f64] {
        &self.qdot
    }

    fn reaction_rate(&self, specie: usize) -> &[f64] {
        &self.rr[specie]
    }
}

#[derive(Debug, Clone)]
pub struct LaminarCombustion {
    pub chemistry: OdeChemistrySolver,
    /// suggested chemistry sub-step of every cell, carried between steps
    pub sub_delta_t: Vec<f64>,
    qdot: Vec<f64>,
    rr: Vec<Vec<f64>>,
}

impl LaminarCombustion {
    pub fn new(chemistry: OdeChemistrySolver, n_cells: usize, initial_sub_delta_t: f64) -> Self {
        let n_species = chemistry.species.len();
        Self {
            chemistry,
            sub_delta_t: vec![initial_sub_delta_t; n_cells],
            qdot: vec![0.0; n_cells],
            rr: vec![vec![0.0; n_cells]; n_species],
        }
    }
}

impl CombustionModel for LaminarCombustion {
    fn name(&self) -> &'static str {
        "laminar"
    }

    fn correct(
        &mut self,
        thermo: &ReactionThermo,
        rho: &[f64],
        delta_t: f64,
    ) -> Result<(), OdeError> {
        if delta_t <= 0.0 {
            self.qdot.iter_mut().for_each(|q| *q = 0.0);
            self.rr.iter_mut().flatten().for_each(|r| *r = 0.0);
            return Ok(());
        }
        let n_species = thermo.n_species();
        let chemistry = &self.chemistry;

        let rates: Vec<Vec<f64>> = self
            .sub_delta_t
            .par_iter_mut()
            .enumerate()
            .map_init(
                || {
                    (
                        ChemistryStateVector::with_capacity(n_species),
                        vec![0.0; n_species],
                    )
                },
                |(state, c), (cell, sub_delta_t)| -> Result<Vec<f64>, OdeError> {
                    thermo.cell_mass_fractions(cell, c);
                    let c0 = c.clone();
                    let mut t = thermo.T.internal[cell];
                    let mut p = thermo.p.internal[cell];
                    let mut dt = delta_t;
                    chemistry.solve(c, &mut t, &mut p, &mut dt, sub_delta_t, state)?;
                    Ok(c.iter()
                        .zip(&c0)
                        .map(|(y1, y0)| rho[cell] * (y1 - y0) / delta_t)
                        .collect())
                },
            )
            .collect::<Result<_, OdeError>>()?;

        for (cell, cell_rates) in rates.iter().enumerate() {
            let mut q = 0.0;
            for (i, rate) in cell_rates.iter().enumerate() {
                self.rr[i][cell] = *rate;
                q -= thermo.species.hf(i) * rate;
            }
            self.qdot[cell] = q;
        }
        let q_max = self.qdot.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        info!("{}: max(Qdot) = {:e} W/m3", self.name(), q_max);
        Ok(())
    }

    fn qdot(&self) -> &[f64] {
        &self.qdot
    }

    fn reaction_rate(&self, specie: usize) -> &[f64] {
        &self.rr[specie]
    }
}

#[derive(Debug, Clone)]
#[enum_dispatch(CombustionModel)]
pub enum CombustionModelEnum {
    None(NoCombustion),
    Laminar(LaminarCombustion),
}

pub fn create_combustion_model(
    name: &str,
    chemistry: OdeChemistrySolver,
    n_cells: usize,
    initial_sub_delta_t: f64,
) -> Result<CombustionModelEnum, ConfigError> {
    match name {
        "none" => Ok(CombustionModelEnum::None(NoCombustion::new(
            n_cells,
            chemistry.species.len(),
        ))),
        "laminar" => Ok(CombustionModelEnum::Laminar(LaminarCombustion::new(
            chemistry,
            n_cells,
            initial_sub_delta_t,
        ))),
        other => Err(ConfigError::UnknownModel {
            kind: "combustion model",
            name: other.to_string(),
        }),
    }
}
