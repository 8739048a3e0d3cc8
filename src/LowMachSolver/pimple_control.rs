//! # PIMPLE controls
//!
//! Corrector counts, per-field relaxation factors and the linear-solver table
//! of the segregated pressure-velocity-energy loop.
//!
//! Loop structure of one time step:
//! ```text
//! outer corrector   (n_outer_correctors)
//!   pressure corrector   (n_correctors)
//!     non-orthogonal corrector   (n_non_orthogonal_correctors + 1 solves)
//! ```
//! The final inner iteration is the last non-orthogonal solve of the last
//! pressure corrector of the last outer corrector. On that iteration the
//! linear solver of `<field>Final` is used and relaxation factors are looked up
//! under `<field>Final` (default 1).
use crate::FiniteVolume::linear_solver::{
    LinearSolverEnum, LinearSolverError, SolverControls, create_linear_solver,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PressureScheme {
    /// `rAU` everywhere, no pressure relaxation or limiting
    Simple,
    /// `rAtU` consistent formulation with pressure relaxation and limiting
    Consistent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PimpleSettings {
    pub n_outer_correctors: usize,
    pub n_correctors: usize,
    pub n_non_orthogonal_correctors: usize,
    pub pressure_scheme: PressureScheme,
    /// transient flux coupling in the predicted flux
    pub ddt_corr: bool,
    /// explicit velocity update from the momentum operator before the correctors
    pub momentum_predictor: bool,
    /// absolute pressure bounds, Pa
    pub p_min: Option<f64>,
    pub p_max: Option<f64>,
    /// reference cell and value of `pPrime` when no patch fixes its level
    pub p_ref_cell: usize,
    pub p_ref_value: f64,
}

impl Default for PimpleSettings {
    fn default() -> Self {
        Self {
            n_outer_correctors: 1,
            n_correctors: 2,
            n_non_orthogonal_correctors: 0,
            pressure_scheme: PressureScheme::Simple,
            ddt_corr: true,
            momentum_predictor: false,
            p_min: None,
            p_max: None,
            p_ref_cell: 0,
            p_ref_value: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RelaxationSettings {
    /// explicit field relaxation, e.g. `pPrime`
    pub fields: HashMap<String, f64>,
    /// implicit equation relaxation, e.g. `h`, `Yi`
    pub equations: HashMap<String, f64>,
}

fn factor(table: &HashMap<String, f64>, name: &str, final_iter: bool) -> f64 {
    if final_iter {
        table.get(&format!("{}Final", name)).copied().unwrap_or(1.0)
    } else {
        table.get(name).copied().unwrap_or(1.0)
    }
}

/// Tracks the position inside the corrector loops of one time step.
#[derive(Debug, Clone)]
pub struct PimpleControl {
    pub settings: PimpleSettings,
    pub relaxation: RelaxationSettings,
    outer: usize,
    corr: usize,
    non_orth: usize,
}

impl PimpleControl {
    pub fn new(settings: PimpleSettings, relaxation: RelaxationSettings) -> Self {
        Self {
            settings,
            relaxation,
            outer: 0,
            corr: 0,
            non_orth: 0,
        }
    }

    pub fn n_outer(&self) -> usize {
        self.settings.n_outer_correctors.max(1)
    }

    pub fn n_correctors(&self) -> usize {
        self.settings.n_correctors.max(1)
    }

    /// number of solves per pressure corrector
    pub fn n_non_orthogonal(&self) -> usize {
        self.settings.n_non_orthogonal_correctors + 1
    }

    pub fn set_outer(&mut self, outer: usize) {
        self.outer = outer;
        self.corr = 0;
        self.non_orth = 0;
    }

    pub fn set_corrector(&mut self, corr: usize) {
        self.corr = corr;
        self.non_orth = 0;
    }

    pub fn set_non_orthogonal(&mut self, non_orth: usize) {
        self.non_orth = non_orth;
    }

    pub fn first_outer(&self) -> bool {
        self.outer == 0
    }

    pub fn final_outer(&self) -> bool {
        self.outer + 1 == self.n_outer()
    }

    pub fn final_corrector(&self) -> bool {
        self.corr + 1 == self.n_correctors()
    }

    pub fn final_non_orthogonal(&self) -> bool {
        self.non_orth + 1 == self.n_non_orthogonal()
    }

    pub fn final_inner_iter(&self) -> bool {
        self.final_outer() && self.final_corrector() && self.final_non_orthogonal()
    }

    /// Solver key of a field at the current position: `<field>Final` on the
    /// final inner iteration.
    pub fn solver_key(&self, field: &str) -> String {
        if self.final_inner_iter() {
            format!("{}Final", field)
        } else {
            field.to_string()
        }
    }

    pub fn field_relaxation(&self, field: &str) -> f64 {
        factor(&self.relaxation.fields, field, self.final_outer())
    }

    pub fn equation_relaxation(&self, field: &str) -> f64 {
        factor(&self.relaxation.equations, field, self.final_outer())
    }
}

/// Linear solvers built once from the `linear_solvers` settings.
///
/// Lookup of `<field>Final` falls back to `<field>`, any field falls back to
/// the default controls.
#[derive(Debug, Clone)]
pub struct LinearSolverTable {
    solvers: HashMap<String, LinearSolverEnum>,
    default: LinearSolverEnum,
}

impl LinearSolverTable {
    pub fn new(settings: &HashMap<String, SolverControls>) -> Result<Self, LinearSolverError> {
        let mut solvers = HashMap::with_capacity(settings.len());
        for (field, controls) in settings {
            solvers.insert(field.clone(), create_linear_solver(controls)?);
        }
        Ok(Self {
            solvers,
            default: create_linear_solver(&SolverControls::default())?,
        })
    }

    pub fn get(&self, key: &str) -> &LinearSolverEnum {
        self.solvers
            .get(key)
            .or_else(|| key.strip_suffix("Final").and_then(|base| self.solvers.get(base)))
            .unwrap_or(&self.default)
    }
}
