//! # Finite-volume toolkit
//!
//! ## Purpose
//! Minimal cell-centred finite-volume machinery the low-Mach solver is built
//! on: a face-addressed mesh, geometric fields with boundary conditions,
//! explicit (`fvc`) and implicit (`fvm`) operators, a face-addressed matrix
//! with flux reconstruction, and sparse linear solvers.
//!
//! ## Main Structures
//! - `mesh::FvMesh`: cells, faces, patches and cached geometric coefficients
//! - `fields::{VolField, SurfaceField}`: cell and face fields, old time levels
//! - `fv_matrix::FvMatrix`: assembled equation, `solve`, `flux`, `relax`
//! - `linear_solver::LinearSolverEnum`: PCG, PBiCGStab, GaussSeidel by name
//!
//! ## Key Features
//! - over-relaxed non-orthogonal correction in Laplacians and surface-normal
//!   gradients, so skewed meshes keep a conservative flux after `flux()`
//! - Euler time derivative and the transient flux coupling correction `ddt_corr`
pub mod fields;
pub mod fv_matrix;
pub mod fvc;
pub mod fvm;
pub mod linear_solver;
pub mod mesh;
