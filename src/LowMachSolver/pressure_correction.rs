//! # Pressure-perturbation correction
//!
//! One pressure corrector of the low-Mach loop. The thermodynamic pressure is
//! held at `p_ref`; mass conservation is enforced through the perturbation
//! `pPrime`:
//!
//! ```text
//! ddt(psi) p_ref + div(phiHbyA) - laplacian(rho D, pPrime) == S_rho
//! phi = phiHbyA + flux(pPrime equation)          (final non-orthogonal solve)
//! U   = HbyA - D grad(pPrime)
//! ```
//! with `D = rAU` (simple scheme) or `D = rAtU` (consistent scheme). The
//! consistent scheme adds the `rAtU - rAU` pressure-gradient terms to the
//! predicted flux and velocity, sets the fixed-flux pressure gradients from the
//! predicted flux, relaxes `pPrime` and applies the pressure limits.
use crate::FiniteVolume::fields::{
    BoundaryCondition, SurfaceScalarField, VolScalarField, VolVectorField,
};
use crate::FiniteVolume::fv_matrix::FvMatrix;
use crate::FiniteVolume::fvc;
use crate::FiniteVolume::fvm;
use crate::FiniteVolume::linear_solver::LinearSolverError;
use crate::FiniteVolume::mesh::FvMesh;
use crate::LowMachSolver::continuity::{ContinuityErrors, solve_continuity};
use crate::LowMachSolver::flow_state::FlowState;
use crate::LowMachSolver::frame_motion::{FrameMotion, FrameMotionEnum};
use crate::LowMachSolver::fv_options::{FvOptionList, FvOptions};
use crate::LowMachSolver::momentum::MomentumOperator;
use crate::LowMachSolver::pimple_control::{LinearSolverTable, PimpleControl, PressureScheme};
use crate::LowMachSolver::pressure_control::PressureControl;
use crate::LowMachSolver::velocity_reconstruction::reconstruct_velocity;
use crate::Thermophysics::reaction_thermo::ReactionThermo;
use log::info;

/// Collaborators shared by every corrector of a time step.
pub struct CorrectorContext<'a> {
    pub mesh: &'a FvMesh,
    pub solvers: &'a LinearSolverTable,
    pub frame: &'a FrameMotionEnum,
    pub options: &'a FvOptionList,
    pub delta_t: f64,
}

/// Predicted velocity and flux of one corrector before the pressure solve.
#[allow(non_snake_case)]
#[derive(Debug, Clone)]
pub struct FluxPrediction {
    pub HbyA: VolVectorField,
    pub phiHbyA: SurfaceScalarField,
    /// `rAU` or `rAtU`, the coefficient of `grad(pPrime)` in the velocity update
    pub coeff: VolScalarField,
    /// `rho coeff`, the diffusivity of the pressure equation
    pub rho_coeff: VolScalarField,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrectorReport {
    /// initial residual of the first `pPrime` solve
    pub initial_residual: f64,
    pub n_solves: usize,
    pub p_prime_range: (f64, f64),
    pub continuity: ContinuityErrors,
    pub limited: bool,
}

#[derive(Debug, Clone)]
pub struct PressureCorrector {
    pub scheme: PressureScheme,
    pub ddt_corr: bool,
    pub control: PressureControl,
    pub reference: (usize, f64),
    cumulative_continuity_error: f64,
}

impl PressureCorrector {
    pub fn new(
        scheme: PressureScheme,
        ddt_corr: bool,
        control: PressureControl,
        reference: (usize, f64),
    ) -> Self {
        Self {
            scheme,
            ddt_corr,
            control,
            reference,
            cumulative_continuity_error: 0.0,
        }
    }

    /// `HbyA`, `phiHbyA` and the pressure diffusivity from the momentum operator.
    /// Refreshes `flow.rho` from the equation of state first.
    #[allow(non_snake_case)]
    pub fn predict_flux(
        &self,
        ctx: &CorrectorContext,
        flow: &mut FlowState,
        thermo: &ReactionThermo,
        op: &MomentumOperator,
    ) -> FluxPrediction {
        let mesh = ctx.mesh;
        flow.rho.assign(&thermo.rho(mesh));
        let r_au = op.r_au(mesh);
        let mut HbyA = op.hby_a(mesh, &flow.U);

        let mut phiHbyA = fvc::dot_interpolate(mesh, &HbyA.scaled_by("rhoHbyA", &flow.rho));
        phiHbyA.name = "phiHbyA".to_string();
        if self.ddt_corr {
            let rho_r_au_f = fvc::interpolate(mesh, &r_au.scaled_by("rhorAU", &flow.rho));
            let ddt_corr = fvc::ddt_corr(mesh, &flow.rho, &flow.U, &flow.phi, ctx.delta_t);
            let coupling = ctx
                .frame
                .zero_filter(mesh, rho_r_au_f.times("ddtCouple", &ddt_corr));
            phiHbyA
                .values
                .iter_mut()
                .zip(&coupling.values)
                .for_each(|(p, c)| *p += c);
        }
        let rho_f = fvc::interpolate(mesh, &flow.rho);
        ctx.frame.make_relative(mesh, &rho_f, &mut phiHbyA);

        let coeff = match self.scheme {
            PressureScheme::Simple => r_au,
            PressureScheme::Consistent => {
                let r_atu = op.r_atu(mesh);
                let mut diff = r_atu.clone();
                diff.name = "rAtU-rAU".to_string();
                diff.internal
                    .iter_mut()
                    .zip(&r_au.internal)
                    .for_each(|(d, a)| *d -= a);
                diff.correct_boundary_conditions(mesh);
                let rho_diff_f = fvc::interpolate(mesh, &diff.scaled_by("rho(rAtU-rAU)", &flow.rho));
                let sn_grad = fvc::sn_grad(mesh, &flow.pPrime);
                for f in 0..mesh.n_faces() {
                    phiHbyA.values[f] += rho_diff_f.values[f] * sn_grad.values[f] * mesh.mag_sf[f];
                }
                let grad_p = fvc::grad(mesh, &flow.pPrime);
                for (i, h) in HbyA.internal.iter_mut().enumerate() {
                    *h += grad_p[i] * diff.internal[i];
                }
                HbyA.correct_boundary_conditions(mesh);
                r_atu
            }
        };
        let rho_coeff = coeff.scaled_by("rhoD", &flow.rho);
        FluxPrediction {
            HbyA,
            phiHbyA,
            coeff,
            rho_coeff,
        }
    }

    /// Sets the gradient of every fixed-flux `pPrime` patch so that the face
    /// flux after the solve equals `rho_b U_b·Sf` (relative to the frame).
    pub fn constrain_pressure(
        &self,
        ctx: &CorrectorContext,
        flow: &mut FlowState,
        prediction: &FluxPrediction,
    ) {
        let mesh = ctx.mesh;
        let n_internal = mesh.n_internal_faces();
        let mut boundary_flux = SurfaceScalarField::uniform("rhoUb", mesh, 0.0);
        for f in n_internal..mesh.n_faces() {
            boundary_flux.values[f] = flow.rho.boundary_value(mesh, f)
                * flow.U.boundary_value(mesh, f).dot(&mesh.face_areas[f]);
        }
        let rho_f = fvc::interpolate(mesh, &flow.rho);
        ctx.frame.make_relative(mesh, &rho_f, &mut boundary_flux);

        for (pi, patch) in mesh.patches.iter().enumerate() {
            if flow.pPrime.boundary[pi].condition != BoundaryCondition::FixedFluxPressure {
                continue;
            }
            for (local, f) in patch.faces().enumerate() {
                let gamma = prediction.rho_coeff.boundary[pi].values[local];
                flow.pPrime.boundary[pi].gradient[local] = (prediction.phiHbyA.values[f]
                    - boundary_flux.values[f])
                    / (mesh.mag_sf[f] * gamma);
            }
        }
        flow.pPrime.correct_boundary_conditions(mesh);
    }

    /// Pressure equation of the current non-orthogonal iteration.
    pub fn assemble(
        &self,
        ctx: &CorrectorContext,
        flow: &FlowState,
        thermo: &ReactionThermo,
        prediction: &FluxPrediction,
    ) -> FvMatrix {
        let mesh = ctx.mesh;
        let mut m = -fvm::laplacian_vol(mesh, &prediction.rho_coeff, &flow.pPrime);
        let ddt_psi = fvc::ddt(&thermo.psi, ctx.delta_t);
        let div_phi = fvc::div(mesh, &prediction.phiHbyA);
        let explicit: Vec<f64> = ddt_psi
            .iter()
            .zip(&div_phi)
            .map(|(d, div)| d * flow.p_ref + div)
            .collect();
        m.add_explicit(mesh, &explicit);
        m.add_rhs(mesh, &ctx.options.source(mesh, "rho"));
        ctx.options.constrain(mesh, &mut m);
        if flow.pPrime.needs_reference() {
            m.set_reference(self.reference.0, self.reference.1);
        }
        m
    }

    /// Non-orthogonal loop; the flux is replaced on the final iteration only.
    pub fn solve_pressure(
        &self,
        ctx: &CorrectorContext,
        pimple: &mut PimpleControl,
        flow: &mut FlowState,
        thermo: &ReactionThermo,
        prediction: &FluxPrediction,
    ) -> Result<(f64, usize), LinearSolverError> {
        let mesh = ctx.mesh;
        let mut initial_residual = 0.0;
        let n_solves = pimple.n_non_orthogonal();
        for k in 0..n_solves {
            pimple.set_non_orthogonal(k);
            let m = self.assemble(ctx, flow, thermo, prediction);
            let solver = ctx.solvers.get(&pimple.solver_key("pPrime"));
            let performance = m.solve(mesh, &mut flow.pPrime, solver)?;
            if k == 0 {
                initial_residual = performance.initial_residual;
            }
            let (lo, hi) = flow.pPrime.min_max();
            info!("min/max(pPrime) = {}, {}", lo, hi);

            if pimple.final_non_orthogonal() {
                let correction = m.flux(mesh, &flow.pPrime);
                for ((phi, h), c) in flow
                    .phi
                    .values
                    .iter_mut()
                    .zip(&prediction.phiHbyA.values)
                    .zip(&correction.values)
                {
                    *phi = h + c;
                }
            }
        }
        Ok((initial_residual, n_solves))
    }

    /// Full pressure corrector: flux prediction, pressure solve, continuity,
    /// velocity reconstruction, limiting and `dpdt`.
    pub fn correct(
        &mut self,
        ctx: &CorrectorContext,
        pimple: &mut PimpleControl,
        flow: &mut FlowState,
        thermo: &ReactionThermo,
        op: &MomentumOperator,
    ) -> Result<CorrectorReport, LinearSolverError> {
        let mesh = ctx.mesh;
        let prediction = self.predict_flux(ctx, flow, thermo, op);
        self.constrain_pressure(ctx, flow, &prediction);
        let (initial_residual, n_solves) =
            self.solve_pressure(ctx, pimple, flow, thermo, &prediction)?;

        solve_continuity(
            mesh,
            &mut flow.rho,
            &flow.phi,
            &ctx.options.source(mesh, "rho"),
            ctx.delta_t,
        );
        let continuity = ContinuityErrors::evaluate(
            mesh,
            &flow.rho,
            &thermo.rho(mesh),
            self.cumulative_continuity_error,
        );
        self.cumulative_continuity_error = continuity.cumulative;

        if self.scheme == PressureScheme::Consistent {
            flow.pPrime.relax(mesh, pimple.field_relaxation("pPrime"));
        }
        reconstruct_velocity(mesh, flow, &prediction.HbyA, &prediction.coeff, ctx.options);

        let mut limited = false;
        if self.scheme == PressureScheme::Consistent && self.control.limit(&mut flow.pPrime) {
            flow.pPrime.correct_boundary_conditions(mesh);
            flow.rho.assign(&thermo.rho(mesh));
            limited = true;
        }

        if thermo.dpdt {
            flow.dpdt.internal = fvc::ddt(&thermo.p, ctx.delta_t);
            flow.dpdt.correct_boundary_conditions(mesh);
        }

        Ok(CorrectorReport {
            initial_residual,
            n_solves,
            p_prime_range: flow.pPrime.min_max(),
            continuity,
            limited,
        })
    }
}
