//! # Energy equation
//!
//! ```text
//! ddt(rho, he) + div(phi, he) + C - laplacian(alphaEff, he) == Qdot + S_he
//! ```
//! `he` is the sensible enthalpy `h` or internal energy `e` of the thermo.
//! The compressibility term is
//! - `e`: `C = div(absolute(phi/interpolate(rho), U), p)`, the pressure work,
//! - `h`: `C = 0 (-dpdt)`, kept as an explicit zero term: the thermodynamic
//!   pressure is constant in the low-Mach limit.
use crate::FiniteVolume::fields::{SurfaceScalarField, VolScalarField};
use crate::FiniteVolume::fv_matrix::FvMatrix;
use crate::FiniteVolume::fvc;
use crate::FiniteVolume::fvm;
use crate::FiniteVolume::mesh::FvMesh;
use crate::LowMachSolver::frame_motion::{FrameMotion, FrameMotionEnum};
use crate::LowMachSolver::fv_options::FvOptions;
use crate::LowMachSolver::pimple_control::{LinearSolverTable, PimpleControl};
use crate::LowMachSolver::time_step::LowMachError;
use crate::Thermophysics::reaction_thermo::{EnergyForm, ReactionThermo};
use log::info;

/// Flow quantities the energy equation is assembled from.
pub struct EnergyInputs<'a> {
    pub phi: &'a SurfaceScalarField,
    pub rho: &'a VolScalarField,
    pub dpdt: &'a VolScalarField,
    pub alpha_eff: &'a VolScalarField,
    /// heat release of the last chemistry step, W/m^3
    pub qdot: &'a [f64],
    pub frame: &'a FrameMotionEnum,
    pub delta_t: f64,
}

/// Per-unit-volume compressibility term `C` of the energy form of `thermo`.
pub fn compressibility_correction(
    mesh: &FvMesh,
    thermo: &ReactionThermo,
    inputs: &EnergyInputs,
) -> Vec<f64> {
    match thermo.energy {
        EnergyForm::InternalEnergy => {
            let rho_f = fvc::interpolate(mesh, inputs.rho);
            let values = inputs
                .phi
                .values
                .iter()
                .zip(&rho_f.values)
                .map(|(phi, r)| phi / r)
                .collect();
            let mut phiv = SurfaceScalarField::new("phiv", values);
            let unit = SurfaceScalarField::uniform("one", mesh, 1.0);
            inputs.frame.make_absolute(mesh, &unit, &mut phiv);
            fvc::div_flux_field(mesh, &phiv, &thermo.p)
        }
        EnergyForm::Enthalpy => inputs.dpdt.internal.iter().map(|d| 0.0 * -d).collect(),
    }
}

pub fn assemble(
    mesh: &FvMesh,
    thermo: &ReactionThermo,
    inputs: &EnergyInputs,
    options: &impl FvOptions,
) -> FvMatrix {
    let he = &thermo.he;
    let mut m = fvm::ddt(mesh, Some(inputs.rho), he, inputs.delta_t) + fvm::div(mesh, inputs.phi, he)
        - fvm::laplacian_vol(mesh, inputs.alpha_eff, he);
    m.add_explicit(mesh, &compressibility_correction(mesh, thermo, inputs));
    m.add_rhs(mesh, inputs.qdot);
    m.add_rhs(mesh, &options.source(mesh, &he.name));
    m
}

/// Relaxes, constrains and solves the energy equation, then recovers `T`.
/// Returns the initial residual of the solve.
pub fn solve_energy(
    mesh: &FvMesh,
    pimple: &PimpleControl,
    solvers: &LinearSolverTable,
    thermo: &mut ReactionThermo,
    inputs: &EnergyInputs,
    options: &impl FvOptions,
) -> Result<f64, LowMachError> {
    let name = thermo.energy.name();
    let mut m = assemble(mesh, thermo, inputs, options);
    m.relax(mesh, &thermo.he, pimple.equation_relaxation(name));
    options.constrain(mesh, &mut m);
    let performance = m.solve(mesh, &mut thermo.he, solvers.get(&pimple.solver_key(name)))?;
    options.correct_energy(mesh, thermo);
    thermo.correct(mesh)?;
    let (t_min, t_max) = thermo.T.min_max();
    info!("min/max(T) = {}, {}", t_min, t_max);
    Ok(performance.initial_residual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LowMachSolver::frame_motion::StationaryFrame;
    use crate::LowMachSolver::fv_options::FvOptionList;
    use crate::LowMachSolver::pimple_control::{PimpleSettings, RelaxationSettings};
    use crate::Thermophysics::thermo_tests::uniform_thermo;
    use approx::assert_relative_eq;
    use std::collections::HashMap;

    struct Fixture {
        phi: SurfaceScalarField,
        rho: VolScalarField,
        dpdt: VolScalarField,
        alpha: VolScalarField,
        qdot: Vec<f64>,
        frame: FrameMotionEnum,
    }

    impl Fixture {
        fn new(mesh: &FvMesh, thermo: &ReactionThermo) -> Self {
            let mut rho = thermo.rho(mesh);
            rho.store_old_time();
            Self {
                phi: SurfaceScalarField::uniform("phi", mesh, 0.0),
                rho,
                dpdt: VolScalarField::calculated("dpdt", mesh, 0.0),
                alpha: thermo.alpha.clone(),
                qdot: vec![0.0; mesh.n_cells()],
                frame: FrameMotionEnum::Stationary(StationaryFrame),
            }
        }

        fn inputs(&self) -> EnergyInputs<'_> {
            EnergyInputs {
                phi: &self.phi,
                rho: &self.rho,
                dpdt: &self.dpdt,
                alpha_eff: &self.alpha,
                qdot: &self.qdot,
                frame: &self.frame,
                delta_t: 1e-3,
            }
        }
    }

    #[test]
    fn uniform_state_without_sources_is_unchanged() {
        let mesh = FvMesh::rectangle(4, 3, 1.0, 1.0);
        for energy in [EnergyForm::Enthalpy, EnergyForm::InternalEnergy] {
            let mut thermo = uniform_thermo(&mesh, energy, 1e5, 600.0, 0.3);
            thermo.store_old_time();
            let he_before = thermo.he.internal.clone();
            let fixture = Fixture::new(&mesh, &thermo);
            let pimple = PimpleControl::new(PimpleSettings::default(), RelaxationSettings::default());
            let solvers = LinearSolverTable::new(&HashMap::new()).unwrap();
            solve_energy(
                &mesh,
                &pimple,
                &solvers,
                &mut thermo,
                &fixture.inputs(),
                &FvOptionList::default(),
            )
            .unwrap();
            for (after, before) in thermo.he.internal.iter().zip(&he_before) {
                assert_relative_eq!(*after, *before, max_relative = 1e-10);
            }
            for t in &thermo.T.internal {
                assert_relative_eq!(*t, 600.0, max_relative = 1e-9);
            }
        }
    }

    #[test]
    fn enthalpy_and_internal_energy_differ_by_the_pressure_work() {
        let mesh = FvMesh::skewed_rectangle(3, 3, 1.0, 1.0, 0.2);
        let thermo_h = uniform_thermo(&mesh, EnergyForm::Enthalpy, 1e5, 400.0, 0.5);
        let mut thermo_e = thermo_h.clone();
        thermo_e.energy = EnergyForm::InternalEnergy;
        // nonuniform pressure and a divergent flux make the pressure work nonzero
        for (i, p) in thermo_e.p.internal.iter_mut().enumerate() {
            *p += 10.0 * i as f64;
        }
        thermo_e.p.correct_boundary_conditions(&mesh);

        let mut fixture = Fixture::new(&mesh, &thermo_h);
        for (f, phi) in fixture.phi.values.iter_mut().enumerate() {
            *phi = 1e-3 * mesh.face_centres[f].x * mesh.face_areas[f].x;
        }
        fixture.dpdt = VolScalarField::calculated("dpdt", &mesh, 250.0);
        let options = FvOptionList::default();
        let inputs = fixture.inputs();

        let c_h = compressibility_correction(&mesh, &thermo_h, &inputs);
        assert!(c_h.iter().all(|c| *c == 0.0));
        let c_e = compressibility_correction(&mesh, &thermo_e, &inputs);
        assert!(c_e.iter().any(|c| c.abs() > 0.0));

        let m_h = assemble(&mesh, &thermo_h, &inputs, &options);
        let m_e = assemble(&mesh, &thermo_e, &inputs, &options);
        assert_eq!(m_h.diag, m_e.diag);
        assert_eq!(m_h.upper, m_e.upper);
        for i in 0..mesh.n_cells() {
            let expected = -mesh.cell_volumes[i] * c_e[i];
            assert_relative_eq!(
                m_e.source[i] - m_h.source[i],
                expected,
                epsilon = 1e-9 * (1.0 + m_h.source[i].abs())
            );
        }
    }
}
