//! # Time-step driver
//!
//! `ReactingLowMachSolver` owns every field and model of a case and advances
//! it one time step at a time:
//!
//! ```text
//! store old time levels
//! for outer corrector:
//!     momentum operator {A, H, H1}   (optional explicit velocity predictor)
//!     for pressure corrector:
//!         pPrime solve with non-orthogonal correctors, flux, continuity,
//!         velocity, limiting, dpdt
//!     species transport (reaction rates of the previous chemistry step)
//!     energy (heat release of the previous chemistry step)
//! turbulence.correct()
//! combustion.correct()   stiff chemistry sub-step per cell
//! rho from the equation of state
//! ```
//! No residual-based stopping: every loop runs its configured count.
use crate::Chemistry::combustion_model::{
    CombustionModel, CombustionModelEnum, create_combustion_model,
};
use crate::Chemistry::ode_chemistry::OdeChemistrySolver;
use crate::Chemistry::ode_integrator::OdeError;
use crate::FiniteVolume::linear_solver::LinearSolverError;
use crate::FiniteVolume::mesh::FvMesh;
use crate::LowMachSolver::case_setup::{CaseFields, setup_case};
use crate::LowMachSolver::continuity::ContinuityErrors;
use crate::LowMachSolver::energy_equation::{EnergyInputs, solve_energy};
use crate::LowMachSolver::flow_state::FlowState;
use crate::LowMachSolver::frame_motion::{FrameMotion, FrameMotionEnum, create_frame_motion};
use crate::LowMachSolver::fv_options::{FvOption, FvOptionList};
use crate::LowMachSolver::momentum::{DiffusiveMomentumPredictor, MomentumPredictor};
use crate::LowMachSolver::pimple_control::{LinearSolverTable, PimpleControl};
use crate::LowMachSolver::pressure_control::PressureControl;
use crate::LowMachSolver::pressure_correction::{CorrectorContext, PressureCorrector};
use crate::LowMachSolver::species_transport::solve_species;
use crate::LowMachSolver::turbulence::{
    TurbulenceModel, TurbulenceModelEnum, create_turbulence_model,
};
use crate::LowMachSolver::velocity_reconstruction::reconstruct_velocity;
use crate::Thermophysics::reaction_thermo::{ReactionThermo, ThermoError};
use crate::settings::{CaseSettings, ConfigError};
use log::info;
use prettytable::{Table, row};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LowMachError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Thermo(#[from] ThermoError),
    #[error(transparent)]
    LinearSolver(#[from] LinearSolverError),
    #[error(transparent)]
    Ode(#[from] OdeError),
}

/// Summary of one time step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    pub time_index: usize,
    pub time: f64,
    /// initial residual of the first solve of every field in the step
    pub residuals: Vec<(String, f64)>,
    pub n_pressure_solves: usize,
    pub continuity: ContinuityErrors,
    pub p_prime_range: (f64, f64),
    pub t_range: (f64, f64),
    pub pressure_limited: bool,
}

impl StepReport {
    fn record(&mut self, field: &str, initial_residual: f64) {
        if !self.residuals.iter().any(|(f, _)| f == field) {
            self.residuals.push((field.to_string(), initial_residual));
        }
    }

    pub fn residual(&self, field: &str) -> Option<f64> {
        self.residuals
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, r)| *r)
    }

    pub fn pretty_print(&self) {
        let mut table = Table::new();
        table.add_row(row!["Time step", self.time_index, format!("t = {:e} s", self.time)]);
        table.add_row(row!["Field", "Initial residual", ""]);
        for (field, residual) in &self.residuals {
            table.add_row(row![field, format!("{:e}", residual), ""]);
        }
        table.add_row(row!["pPrime solves", self.n_pressure_solves, ""]);
        table.add_row(row![
            "min/max(pPrime)",
            format!("{:e}", self.p_prime_range.0),
            format!("{:e}", self.p_prime_range.1)
        ]);
        table.add_row(row![
            "min/max(T)",
            format!("{:.3}", self.t_range.0),
            format!("{:.3}", self.t_range.1)
        ]);
        table.add_row(row![
            "continuity (local/global)",
            format!("{:e}", self.continuity.sum_local),
            format!("{:e}", self.continuity.global)
        ]);
        table.printstd();
    }
}

pub struct ReactingLowMachSolver {
    pub mesh: FvMesh,
    pub thermo: ReactionThermo,
    pub flow: FlowState,
    pub pimple: PimpleControl,
    pub solvers: LinearSolverTable,
    pub pressure: PressureCorrector,
    pub momentum: Box<dyn MomentumPredictor>,
    pub turbulence: TurbulenceModelEnum,
    pub combustion: CombustionModelEnum,
    pub options: FvOptionList,
    pub frame: FrameMotionEnum,
    pub time: f64,
    pub delta_t: f64,
    pub end_time: f64,
    pub time_index: usize,
}

impl ReactingLowMachSolver {
    pub fn from_case(case: &CaseSettings) -> Result<Self, LowMachError> {
        let CaseFields { mesh, thermo, flow } = setup_case(case)?;
        let p_ref = case.p_ref()?;
        if case.pimple.p_ref_cell >= mesh.n_cells() {
            return Err(ConfigError::Invalid(format!(
                "p_ref_cell {} outside the mesh",
                case.pimple.p_ref_cell
            ))
            .into());
        }
        if let Some(cell) = case
            .fv_options
            .iter()
            .flat_map(FvOption::cells)
            .chain(case.frame.cells())
            .find(|&&cell| cell >= mesh.n_cells())
        {
            return Err(ConfigError::Invalid(format!(
                "cell {} of fv_options or frame zone outside the mesh of {} cells",
                cell,
                mesh.n_cells()
            ))
            .into());
        }
        let pimple = PimpleControl::new(case.pimple.clone(), case.relaxation.clone());
        let solvers = LinearSolverTable::new(&case.linear_solvers)?;
        let control = PressureControl::new(p_ref, case.pimple.p_min, case.pimple.p_max)?;
        let pressure = PressureCorrector::new(
            case.pimple.pressure_scheme,
            case.pimple.ddt_corr,
            control,
            (case.pimple.p_ref_cell, case.pimple.p_ref_value),
        );
        let mut turbulence = create_turbulence_model(&case.turbulence)?;
        turbulence.correct(&mesh, &flow.rho);
        let chemistry = OdeChemistrySolver::new(
            thermo.species.clone(),
            thermo.eos.clone(),
            thermo.mechanism.clone(),
            &case.chemistry,
        )
        .map_err(|e| match e {
            OdeError::UnknownSolver(name) => LowMachError::from(ConfigError::UnknownModel {
                kind: "ODE solver",
                name,
            }),
            other => LowMachError::from(other),
        })?;
        let combustion = create_combustion_model(
            &case.combustion,
            chemistry,
            mesh.n_cells(),
            case.chemistry.initial_chemical_time_step,
        )?;
        let frame = create_frame_motion(&mesh, &case.frame);
        info!(
            "low-Mach solver: {:?} pressure scheme, {} turbulence, {} combustion, {} frame",
            case.pimple.pressure_scheme,
            turbulence.name(),
            combustion.name(),
            frame.name()
        );
        Ok(Self {
            mesh,
            thermo,
            flow,
            pimple,
            solvers,
            pressure,
            momentum: Box::new(DiffusiveMomentumPredictor),
            turbulence,
            combustion,
            options: FvOptionList::new(case.fv_options.clone()),
            frame,
            time: 0.0,
            delta_t: case.time.delta_t,
            end_time: case.time.end_time,
            time_index: 0,
        })
    }

    /// Advances the case by one time step.
    pub fn advance(&mut self) -> Result<StepReport, LowMachError> {
        let dt = self.delta_t;
        self.time += dt;
        self.time_index += 1;
        info!("Time = {:e}", self.time);
        let mut report = StepReport {
            time_index: self.time_index,
            time: self.time,
            ..StepReport::default()
        };

        self.thermo.store_old_time();
        self.flow.store_old_time();

        let mesh = &self.mesh;
        let ctx = CorrectorContext {
            mesh,
            solvers: &self.solvers,
            frame: &self.frame,
            options: &self.options,
            delta_t: dt,
        };
        for outer in 0..self.pimple.n_outer() {
            self.pimple.set_outer(outer);
            self.flow.pPrime.store_prev_iter();

            let mu_eff = self.turbulence.mu_eff(mesh, &self.thermo);
            let op = self.momentum.predict(mesh, &self.flow, &mu_eff, dt);
            if self.pimple.settings.momentum_predictor {
                let hby_a = op.hby_a(mesh, &self.flow.U);
                let r_au = op.r_au(mesh);
                reconstruct_velocity(mesh, &mut self.flow, &hby_a, &r_au, &self.options);
            }

            for corr in 0..self.pimple.n_correctors() {
                self.pimple.set_corrector(corr);
                let corrector =
                    self.pressure
                        .correct(&ctx, &mut self.pimple, &mut self.flow, &self.thermo, &op)?;
                report.record("pPrime", corrector.initial_residual);
                report.n_pressure_solves += corrector.n_solves;
                report.continuity = corrector.continuity;
                report.p_prime_range = corrector.p_prime_range;
                report.pressure_limited |= corrector.limited;
            }

            let alpha_eff = self.turbulence.alpha_eff(mesh, &self.thermo);
            let y_residual = solve_species(
                mesh,
                &self.pimple,
                &self.solvers,
                &mut self.thermo,
                &self.flow.phi,
                &self.flow.rho,
                &alpha_eff,
                &self.combustion,
                &self.options,
                dt,
            )?;
            report.record("Yi", y_residual);

            let inputs = EnergyInputs {
                phi: &self.flow.phi,
                rho: &self.flow.rho,
                dpdt: &self.flow.dpdt,
                alpha_eff: &alpha_eff,
                qdot: self.combustion.qdot(),
                frame: &self.frame,
                delta_t: dt,
            };
            let he_residual = solve_energy(
                mesh,
                &self.pimple,
                &self.solvers,
                &mut self.thermo,
                &inputs,
                &self.options,
            )?;
            report.record(self.thermo.energy.name(), he_residual);
        }

        self.turbulence.correct(mesh, &self.flow.rho);
        self.combustion
            .correct(&self.thermo, &self.flow.rho.internal, dt)?;
        self.flow.rho.assign(&self.thermo.rho(mesh));

        report.t_range = self.thermo.T.min_max();
        Ok(report)
    }

    /// Runs until `end_time`, printing a summary table after every step.
    pub fn run(&mut self) -> Result<Vec<StepReport>, LowMachError> {
        let mut reports = Vec::new();
        while self.time + 0.5 * self.delta_t < self.end_time {
            let report = self.advance()?;
            report.pretty_print();
            reports.push(report);
        }
        info!("End, {} time steps", reports.len());
        Ok(reports)
    }
}
