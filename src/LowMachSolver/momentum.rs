//! # Momentum operator
//!
//! The pressure correction only needs three per-cell quantities of the
//! discretised momentum equation `A U_P = H - grad(pPrime)`:
//! - `A`: diagonal coefficient per unit volume,
//! - `H`: off-diagonal (neighbour) contribution plus explicit sources,
//! - `H1`: sum of the neighbour coefficients.
//!
//! Derived: `rAU = 1/A`, `HbyA = rAU H`, `rAtU = 1/(A - H1)`.
//!
//! `DiffusiveMomentumPredictor` is the reference predictor: Euler time
//! derivative plus viscous diffusion, with fixed-value velocity patches
//! entering `A` and `H` through their boundary coefficient.
use crate::FiniteVolume::fields::{VolScalarField, VolVectorField};
use crate::FiniteVolume::fvc;
use crate::FiniteVolume::mesh::FvMesh;
use crate::LowMachSolver::flow_state::FlowState;
use nalgebra::Vector2;

#[allow(non_snake_case)]
#[derive(Debug, Clone, PartialEq)]
pub struct MomentumOperator {
    pub A: Vec<f64>,
    pub H: Vec<Vector2<f64>>,
    pub H1: Vec<f64>,
}

impl MomentumOperator {
    pub fn r_au(&self, mesh: &FvMesh) -> VolScalarField {
        let internal = self.A.iter().map(|a| 1.0 / a).collect();
        let mut r_au = VolScalarField::calculated("rAU", mesh, 0.0);
        r_au.internal = internal;
        r_au.correct_boundary_conditions(mesh);
        r_au
    }

    pub fn r_atu(&self, mesh: &FvMesh) -> VolScalarField {
        let internal = self
            .A
            .iter()
            .zip(&self.H1)
            .map(|(a, h1)| 1.0 / (a - h1))
            .collect();
        let mut r_atu = VolScalarField::calculated("rAtU", mesh, 0.0);
        r_atu.internal = internal;
        r_atu.correct_boundary_conditions(mesh);
        r_atu
    }

    /// `rAU H` carrying the boundary conditions of `u`: fixed-value patches keep
    /// the prescribed velocity.
    #[allow(non_snake_case)]
    pub fn hby_a(&self, mesh: &FvMesh, U: &VolVectorField) -> VolVectorField {
        let internal = self.H.iter().zip(&self.A).map(|(h, a)| h / *a).collect();
        U.like("HbyA", mesh, internal)
    }
}

pub trait MomentumPredictor {
    fn name(&self) -> &'static str;

    /// Momentum operator of the current state with effective viscosity `mu_eff`.
    fn predict(
        &self,
        mesh: &FvMesh,
        flow: &FlowState,
        mu_eff: &VolScalarField,
        delta_t: f64,
    ) -> MomentumOperator;
}

#[derive(Debug, Clone, Default)]
pub struct DiffusiveMomentumPredictor;

impl MomentumPredictor for DiffusiveMomentumPredictor {
    fn name(&self) -> &'static str {
        "diffusive"
    }

    #[allow(non_snake_case)]
    fn predict(
        &self,
        mesh: &FvMesh,
        flow: &FlowState,
        mu_eff: &VolScalarField,
        delta_t: f64,
    ) -> MomentumOperator {
        let n_cells = mesh.n_cells();
        let mu_f = fvc::interpolate(mesh, mu_eff);
        let rho_0 = flow.rho.old_time();
        let U_0 = flow.U.old_time();

        let mut A: Vec<f64> = flow.rho.internal.iter().map(|r| r / delta_t).collect();
        let mut H: Vec<Vector2<f64>> = (0..n_cells)
            .map(|i| U_0.internal[i] * (rho_0.internal[i] / delta_t))
            .collect();
        let mut H1 = vec![0.0; n_cells];

        for f in 0..mesh.n_internal_faces() {
            let (o, n) = (mesh.owner[f], mesh.neighbour[f]);
            let g = mu_f.values[f] * mesh.mag_sf[f] * mesh.delta_coeffs[f];
            let (g_o, g_n) = (g / mesh.cell_volumes[o], g / mesh.cell_volumes[n]);
            A[o] += g_o;
            A[n] += g_n;
            H1[o] += g_o;
            H1[n] += g_n;
            H[o] += flow.U.internal[n] * g_o;
            H[n] += flow.U.internal[o] * g_n;
        }
        for f in mesh.n_internal_faces()..mesh.n_faces() {
            if !flow.U.condition_of(mesh, f).fixes_value() {
                continue;
            }
            let o = mesh.owner[f];
            let g = mu_f.values[f] * mesh.mag_sf[f] * mesh.delta_coeffs[f] / mesh.cell_volumes[o];
            A[o] += g;
            H[o] += flow.U.boundary_value(mesh, f) * g;
        }
        MomentumOperator { A, H, H1 }
    }
}
