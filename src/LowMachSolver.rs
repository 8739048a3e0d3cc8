//! # Reacting low-Mach solver
//!
//! ## Purpose
//! Transient, pressure-based solver for reacting gas flow in the low-Mach
//! limit. The thermodynamic pressure is held at `p_ref`; velocity and mass
//! flux are driven by the perturbation `pPrime`. Chemistry is operator split
//! and advanced once per time step after the flow.
//!
//! ## Main Structures
//! - `time_step::ReactingLowMachSolver`: owns the case, `advance()` and `run()`
//! - `pressure_correction::PressureCorrector`: `pPrime` equation in the simple
//!   or the consistent formulation, non-orthogonal correctors, flux update
//! - `energy_equation`: `h` or `e` equation with its compressibility term
//! - `species_transport`: mass fractions with the inert specie as closure
//! - `momentum::MomentumPredictor`: the `{A, H}` operator the correctors use
//! - `pimple_control::PimpleControl`: loop counters, final-iteration lookups
//!
//! ## Pluggable collaborators
//! turbulence models, combustion models, finite-volume options (sources,
//! constraints, limiters) and frame motion are chosen by name from the case.
pub mod case_setup;
pub mod continuity;
pub mod energy_equation;
pub mod flow_state;
pub mod frame_motion;
pub mod fv_options;
pub mod momentum;
pub mod pimple_control;
pub mod pressure_control;
pub mod pressure_correction;
pub mod species_transport;
pub mod time_step;
pub mod turbulence;
pub mod velocity_reconstruction;

#[cfg(test)]
mod low_mach_tests;
