//! # Thermophysics
//!
//! Constant-cp ideal-mixture thermophysics for the reacting-flow solver.
//!
//! - `species`: specie data (molar mass, cp, formation enthalpy) and mixture rules
//! - `equation_of_state`: `perfectGas`, `incompressiblePerfectGas`
//! - `transport`: constant or Sutherland viscosity, unity-Lewis diffusivity
//! - `mechanism`: inert or single-step Arrhenius global reactions
//! - `reaction_thermo`: the composed thermo state with its fields and the
//!   energy-to-temperature inversion
pub mod equation_of_state;
pub mod mechanism;
pub mod reaction_thermo;
pub mod species;
pub mod transport;
