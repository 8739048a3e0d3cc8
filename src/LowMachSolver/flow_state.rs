//! Flow fields advanced by the low-Mach solver.
//!
//! The thermodynamic pressure `p` lives in the thermo and is held at `p_ref`;
//! the dynamics are driven by the perturbation `pPrime` only.
use crate::FiniteVolume::fields::{SurfaceScalarField, VolScalarField, VolVectorField};
use crate::FiniteVolume::fvc;
use crate::FiniteVolume::mesh::FvMesh;
use crate::Thermophysics::reaction_thermo::ReactionThermo;

#[allow(non_snake_case)]
#[derive(Debug, Clone)]
pub struct FlowState {
    pub U: VolVectorField,
    pub pPrime: VolScalarField,
    pub rho: VolScalarField,
    /// mass flux through every face, kg/s
    pub phi: SurfaceScalarField,
    /// kinetic energy per unit mass, `0.5|U|^2`
    pub K: VolScalarField,
    pub dpdt: VolScalarField,
    pub p_ref: f64,
}

impl FlowState {
    /// Density from the thermo, `phi = interpolate(rho U)·Sf`, `K` from `U`.
    #[allow(non_snake_case)]
    pub fn new(
        mesh: &FvMesh,
        U: VolVectorField,
        pPrime: VolScalarField,
        thermo: &ReactionThermo,
        p_ref: f64,
    ) -> Self {
        let rho = thermo.rho(mesh);
        let mut phi = fvc::dot_interpolate(mesh, &U.scaled_by("rhoU", &rho));
        phi.name = "phi".to_string();
        let mut state = Self {
            K: VolScalarField::calculated("K", mesh, 0.0),
            dpdt: VolScalarField::calculated("dpdt", mesh, 0.0),
            U,
            pPrime,
            rho,
            phi,
            p_ref,
        };
        state.update_kinetic_energy();
        state
    }

    /// `K = 0.5|U|^2` in cells and on boundary faces.
    pub fn update_kinetic_energy(&mut self) {
        self.K.internal = fvc::mag_sqr(&self.U.internal)
            .into_iter()
            .map(|u2| 0.5 * u2)
            .collect();
        for (k_pf, u_pf) in self.K.boundary.iter_mut().zip(&self.U.boundary) {
            k_pf.values = fvc::mag_sqr(&u_pf.values)
                .into_iter()
                .map(|u2| 0.5 * u2)
                .collect();
        }
    }

    pub fn store_old_time(&mut self) {
        self.U.store_old_time();
        self.pPrime.store_old_time();
        self.rho.store_old_time();
        self.phi.store_old_time();
    }
}
