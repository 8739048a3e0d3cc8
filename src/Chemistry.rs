//! # Chemistry
//!
//! Stiff chemical kinetics advanced by operator splitting.
//!
//! - `state_vector`: the per-cell packed state `[p, T, c_0, ..., c_{K-1}]`
//! - `ode_system`: ODE right-hand sides, the constant-pressure reactor
//! - `ode_integrator`: Rosenbrock and implicit Euler integrators with adaptive steps
//! - `ode_chemistry`: one cell advanced over a flow time step
//! - `combustion_model`: reaction rates and heat release for the flow equations
pub mod combustion_model;
pub mod ode_chemistry;
pub mod ode_integrator;
pub mod ode_system;
pub mod state_vector;
