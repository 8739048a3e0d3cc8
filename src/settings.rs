//! # Case settings
//!
//! ## Purpose
//! Reads the JSON description of a reacting low-Mach case and checks it before
//! any field is built. Everything a run needs lives in one file: mesh and
//! patch types, species data, thermophysical models, initial and inlet state,
//! corrector controls, linear solvers, chemistry, turbulence, combustion,
//! finite-volume options and run control.
//!
//! ## Validation
//! - `flame_properties.p_ref` is required and positive,
//! - `thermo.inert_specie` must be one of the listed species,
//! - initial and inlet mass fractions name known species and sum to one,
//! - every patch named under `mesh.patches` exists on the block mesh,
//! - `time.delta_t` is positive.
//!
//! ## Example
//! ```json
//! {
//!   "mesh": { "nx": 20, "ny": 4, "lx": 0.1, "ly": 0.02,
//!             "patches": { "left": "inlet", "right": "outlet" } },
//!   "flame_properties": { "p_ref": 101325.0 },
//!   "thermo": { "species": [ ... ], "inert_specie": "N2", "energy": "h" },
//!   "initial_conditions": { "T": 300.0, "Y": { "N2": 1.0 },
//!                           "inlet": { "T": 300.0, "U": [0.5, 0.0], "Y": { "N2": 1.0 } } },
//!   "time": { "delta_t": 1e-4, "end_time": 1e-2 }
//! }
//! ```
use crate::Chemistry::ode_chemistry::ChemistrySettings;
use crate::FiniteVolume::linear_solver::SolverControls;
use crate::LowMachSolver::frame_motion::FrameSettings;
use crate::LowMachSolver::fv_options::FvOption;
use crate::LowMachSolver::pimple_control::{PimpleSettings, RelaxationSettings};
use crate::LowMachSolver::turbulence::TurbulenceSettings;
use crate::Thermophysics::reaction_thermo::EnergyForm;
use crate::Thermophysics::species::SpecieData;
use crate::Thermophysics::transport::TransportSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

const BLOCK_PATCHES: [&str; 4] = ["left", "right", "bottom", "top"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing entry {0}")]
    MissingEntry(String),
    #[error("inert specie '{0}' is not among the species")]
    InertSpecieNotFound(String),
    #[error("unknown {kind} '{name}'")]
    UnknownModel { kind: &'static str, name: String },
    #[error("cannot read case file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse case file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid case: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchKind {
    /// fixed velocity, temperature and composition
    Inlet,
    /// fixed pressure perturbation, everything else zero-gradient
    Outlet,
    /// no-slip; fixed temperature if `wall_temperature` is given
    Wall,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MeshSettings {
    pub nx: usize,
    pub ny: usize,
    pub lx: f64,
    pub ly: f64,
    /// shear angle of the cells, rad
    pub skew: f64,
    /// patch name -> kind; unlisted patches are walls
    pub patches: HashMap<String, PatchKind>,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            nx: 20,
            ny: 4,
            lx: 0.1,
            ly: 0.02,
            skew: 0.0,
            patches: HashMap::from([
                ("left".to_string(), PatchKind::Inlet),
                ("right".to_string(), PatchKind::Outlet),
            ]),
        }
    }
}

impl MeshSettings {
    pub fn patch_kind(&self, name: &str) -> PatchKind {
        self.patches.get(name).copied().unwrap_or(PatchKind::Wall)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlameProperties {
    /// thermodynamic reference pressure, Pa
    pub p_ref: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThermoSettings {
    pub species: Vec<SpecieData>,
    pub inert_specie: String,
    #[serde(default = "default_energy")]
    pub energy: EnergyForm,
    #[serde(default = "default_eos")]
    pub equation_of_state: String,
    #[serde(default)]
    pub transport: TransportSettings,
}

fn default_energy() -> EnergyForm {
    EnergyForm::Enthalpy
}

fn default_eos() -> String {
    "perfectGas".to_string()
}

#[allow(non_snake_case)]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InletConditions {
    pub T: f64,
    pub U: [f64; 2],
    pub Y: HashMap<String, f64>,
}

#[allow(non_snake_case)]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitialConditions {
    pub T: f64,
    #[serde(default)]
    pub U: [f64; 2],
    pub Y: HashMap<String, f64>,
    pub inlet: Option<InletConditions>,
    #[serde(default)]
    pub wall_temperature: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeSettings {
    pub delta_t: f64,
    pub end_time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseSettings {
    #[serde(default)]
    pub mesh: MeshSettings,
    #[serde(default)]
    pub flame_properties: FlameProperties,
    pub thermo: ThermoSettings,
    pub initial_conditions: InitialConditions,
    #[serde(default)]
    pub pimple: PimpleSettings,
    #[serde(default)]
    pub relaxation: RelaxationSettings,
    #[serde(default)]
    pub linear_solvers: HashMap<String, SolverControls>,
    #[serde(default)]
    pub chemistry: ChemistrySettings,
    #[serde(default)]
    pub turbulence: TurbulenceSettings,
    #[serde(default = "default_combustion")]
    pub combustion: String,
    #[serde(default)]
    pub fv_options: Vec<FvOption>,
    #[serde(default)]
    pub frame: FrameSettings,
    pub time: TimeSettings,
}

fn default_combustion() -> String {
    "laminar".to_string()
}

fn check_mass_fractions(
    what: &str,
    y: &HashMap<String, f64>,
    species: &[SpecieData],
) -> Result<(), ConfigError> {
    for (name, value) in y {
        if !species.iter().any(|s| &s.name == name) {
            return Err(ConfigError::Invalid(format!(
                "{} mass fraction of unknown specie '{}'",
                what, name
            )));
        }
        if *value < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "{} mass fraction of {} is negative",
                what, name
            )));
        }
    }
    let sum: f64 = y.values().sum();
    if (sum - 1.0).abs() > 1e-6 {
        return Err(ConfigError::Invalid(format!(
            "{} mass fractions sum to {}",
            what, sum
        )));
    }
    Ok(())
}

impl CaseSettings {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let settings: CaseSettings = serde_json::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn p_ref(&self) -> Result<f64, ConfigError> {
        self.flame_properties
            .p_ref
            .ok_or_else(|| ConfigError::MissingEntry("flame_properties.p_ref".to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let p_ref = self.p_ref()?;
        if p_ref <= 0.0 {
            return Err(ConfigError::Invalid(format!("p_ref = {} must be positive", p_ref)));
        }
        let species = &self.thermo.species;
        if species.is_empty() {
            return Err(ConfigError::MissingEntry("thermo.species".to_string()));
        }
        if !species.iter().any(|s| s.name == self.thermo.inert_specie) {
            return Err(ConfigError::InertSpecieNotFound(
                self.thermo.inert_specie.clone(),
            ));
        }
        check_mass_fractions("initial", &self.initial_conditions.Y, species)?;
        let has_inlet = self.mesh.patches.values().any(|k| *k == PatchKind::Inlet);
        match &self.initial_conditions.inlet {
            Some(inlet) => check_mass_fractions("inlet", &inlet.Y, species)?,
            None if has_inlet => {
                return Err(ConfigError::MissingEntry(
                    "initial_conditions.inlet".to_string(),
                ));
            }
            None => {}
        }
        if let Some(name) = self
            .mesh
            .patches
            .keys()
            .find(|name| !BLOCK_PATCHES.contains(&name.as_str()))
        {
            return Err(ConfigError::Invalid(format!("unknown patch '{}'", name)));
        }
        if self.mesh.nx == 0 || self.mesh.ny == 0 {
            return Err(ConfigError::Invalid("mesh needs at least one cell".to_string()));
        }
        if self.time.delta_t <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "delta_t = {} must be positive",
                self.time.delta_t
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CASE: &str = r#"{
        "mesh": { "nx": 4, "ny": 2, "lx": 0.04, "ly": 0.01,
                  "patches": { "left": "inlet", "right": "outlet" } },
        "flame_properties": { "p_ref": 100000.0 },
        "thermo": {
            "species": [
                { "name": "A", "molar_mass": 30.0, "cp": 1200.0, "hf": -1.0e6 },
                { "name": "B", "molar_mass": 28.0, "cp": 1040.0 }
            ],
            "inert_specie": "B",
            "energy": "e",
            "transport": { "type": "const", "mu": 1.8e-5, "pr": 0.7 }
        },
        "initial_conditions": {
            "T": 300.0,
            "Y": { "B": 1.0 },
            "inlet": { "T": 300.0, "U": [0.2, 0.0], "Y": { "A": 0.1, "B": 0.9 } }
        },
        "pimple": { "n_correctors": 2, "pressure_scheme": "consistent" },
        "linear_solvers": { "pPrime": { "solver": "PCG", "tolerance": 1e-10 } },
        "time": { "delta_t": 1e-4, "end_time": 1e-3 }
    }"#;

    fn write_case(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_a_complete_case() {
        let file = write_case(CASE);
        let case = CaseSettings::load_from_file(file.path()).unwrap();
        assert_eq!(case.p_ref().unwrap(), 1e5);
        assert_eq!(case.thermo.energy, EnergyForm::InternalEnergy);
        assert_eq!(case.thermo.equation_of_state, "perfectGas");
        assert_eq!(case.mesh.patch_kind("top"), PatchKind::Wall);
        assert_eq!(case.combustion, "laminar");
        assert_eq!(case.linear_solvers["pPrime"].solver, "PCG");
        assert_eq!(case.pimple.n_non_orthogonal_correctors, 0);
    }

    #[test]
    fn missing_reference_pressure_is_fatal() {
        let content = CASE.replace(r#""flame_properties": { "p_ref": 100000.0 },"#, "");
        let file = write_case(&content);
        match CaseSettings::load_from_file(file.path()) {
            Err(ConfigError::MissingEntry(entry)) => assert_eq!(entry, "flame_properties.p_ref"),
            other => panic!("expected a missing p_ref, got {:?}", other),
        }
    }

    #[test]
    fn unknown_inert_specie_is_fatal() {
        let content = CASE.replace(r#""inert_specie": "B""#, r#""inert_specie": "N2""#);
        let file = write_case(&content);
        assert!(matches!(
            CaseSettings::load_from_file(file.path()),
            Err(ConfigError::InertSpecieNotFound(name)) if name == "N2"
        ));
    }

    #[test]
    fn unbalanced_inlet_composition_is_rejected() {
        let content = CASE.replace(r#""A": 0.1, "B": 0.9"#, r#""A": 0.1, "B": 0.8"#);
        assert!(matches!(
            CaseSettings::from_json(&content),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn unreadable_file_reports_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            CaseSettings::load_from_file(dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
