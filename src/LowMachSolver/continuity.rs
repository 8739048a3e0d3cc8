//! Explicit density update from the corrected mass flux and the continuity
//! error against the equation of state.
use crate::FiniteVolume::fields::{SurfaceScalarField, VolScalarField};
use crate::FiniteVolume::fvc;
use crate::FiniteVolume::mesh::FvMesh;
use log::info;

/// `rho = rho_0 + dt (S - div(phi))`, cell by cell.
pub fn solve_continuity(
    mesh: &FvMesh,
    rho: &mut VolScalarField,
    phi: &SurfaceScalarField,
    mass_source: &[f64],
    delta_t: f64,
) {
    let div_phi = fvc::div(mesh, phi);
    let rho_0 = rho.old_time().internal.clone();
    for (i, r) in rho.internal.iter_mut().enumerate() {
        *r = rho_0[i] + delta_t * (mass_source[i] - div_phi[i]);
    }
    rho.correct_boundary_conditions(mesh);
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContinuityErrors {
    pub sum_local: f64,
    pub global: f64,
    pub cumulative: f64,
}

impl ContinuityErrors {
    /// Mass-weighted mismatch between the transported density and the density
    /// of the equation of state; `cumulative` carries the running sum of
    /// `global` over the run.
    pub fn evaluate(
        mesh: &FvMesh,
        rho: &VolScalarField,
        thermo_rho: &VolScalarField,
        cumulative: f64,
    ) -> Self {
        let total_mass: f64 = rho
            .internal
            .iter()
            .zip(&mesh.cell_volumes)
            .map(|(r, v)| r * v)
            .sum();
        let (mut local, mut global) = (0.0, 0.0);
        for i in 0..mesh.n_cells() {
            let d = (rho.internal[i] - thermo_rho.internal[i]) * mesh.cell_volumes[i];
            local += d.abs();
            global += d;
        }
        let errors = Self {
            sum_local: local / total_mass,
            global: global / total_mass,
            cumulative: cumulative + global / total_mass,
        };
        info!(
            "time step continuity errors : sum local = {:e}, global = {:e}, cumulative = {:e}",
            errors.sum_local, errors.global, errors.cumulative
        );
        errors
    }
}
