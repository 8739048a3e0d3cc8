use crate::FiniteVolume::fields::{PatchField, VolScalarField, VolVectorField};
use crate::FiniteVolume::fvc;
use crate::FiniteVolume::linear_solver::SolverControls;
use crate::FiniteVolume::mesh::FvMesh;
use crate::LowMachSolver::flow_state::FlowState;
use crate::LowMachSolver::frame_motion::{FrameMotionEnum, FrameSettings, StationaryFrame};
use crate::LowMachSolver::fv_options::{FvOption, FvOptionList, FvOptions};
use crate::LowMachSolver::momentum::{DiffusiveMomentumPredictor, MomentumPredictor};
use crate::LowMachSolver::pimple_control::{
    LinearSolverTable, PimpleControl, PimpleSettings, PressureScheme, RelaxationSettings,
};
use crate::LowMachSolver::pressure_control::PressureControl;
use crate::LowMachSolver::pressure_correction::{CorrectorContext, PressureCorrector};
use crate::LowMachSolver::time_step::{LowMachError, ReactingLowMachSolver};
use crate::Thermophysics::reaction_thermo::{EnergyForm, ReactionThermo};
use crate::Thermophysics::thermo_tests::uniform_thermo;
use crate::settings::{CaseSettings, ConfigError};
use approx::assert_relative_eq;
use nalgebra::Vector2;
use std::collections::HashMap;

const P_REF: f64 = 1e5;

/// Inlet on the left, fixed `pPrime` outlet on the right, no-slip walls.
fn channel_flow(mesh: &FvMesh, thermo: &ReactionThermo) -> FlowState {
    let u_inlet = Vector2::new(0.2, 0.0);
    let u_boundary = mesh
        .patches
        .iter()
        .map(|patch| match patch.name.as_str() {
            "left" => PatchField::fixed_value(u_inlet, patch.size),
            "right" => PatchField::zero_gradient(patch.size),
            _ => PatchField::fixed_value(Vector2::zeros(), patch.size),
        })
        .collect();
    let p_boundary = mesh
        .patches
        .iter()
        .map(|patch| match patch.name.as_str() {
            "right" => PatchField::fixed_value(0.0, patch.size),
            _ => PatchField::fixed_flux_pressure(patch.size),
        })
        .collect();
    let u = VolVectorField::uniform("U", mesh, u_inlet, u_boundary);
    let p_prime = VolScalarField::uniform("pPrime", mesh, 0.0, p_boundary);
    FlowState::new(mesh, u, p_prime, thermo, P_REF)
}

#[test]
fn corrected_flux_balances_the_dilatation_and_mass_source_on_a_skewed_mesh() {
    let delta_t = 1e-3;
    let options = FvOptionList::new(vec![FvOption::ExplicitSource {
        field: "rho".to_string(),
        cells: vec![3, 7],
        value: 2.0,
    }]);
    for scheme in [PressureScheme::Simple, PressureScheme::Consistent] {
        for n_non_orthogonal in [0, 1, 3] {
            let mesh = FvMesh::skewed_rectangle(6, 4, 0.06, 0.02, 0.3);
            assert!(mesh.is_non_orthogonal());
            let mut thermo = uniform_thermo(&mesh, EnergyForm::Enthalpy, P_REF, 300.0, 0.2);
            let mut flow = channel_flow(&mesh, &thermo);
            thermo.store_old_time();
            flow.store_old_time();
            // heat the lower half so the density drops there
            for i in 0..mesh.n_cells() / 2 {
                thermo.he.internal[i] += 5.0e4;
            }
            thermo.correct(&mesh).unwrap();

            let solvers = LinearSolverTable::new(&HashMap::from([(
                "pPrime".to_string(),
                SolverControls {
                    solver: "PCG".to_string(),
                    tolerance: 1e-12,
                    max_iter: 5000,
                    ..SolverControls::default()
                },
            )]))
            .unwrap();
            let settings = PimpleSettings {
                n_correctors: 1,
                n_non_orthogonal_correctors: n_non_orthogonal,
                pressure_scheme: scheme,
                ..PimpleSettings::default()
            };
            let mut pimple = PimpleControl::new(settings, RelaxationSettings::default());
            pimple.set_outer(0);
            pimple.set_corrector(0);
            let frame = FrameMotionEnum::Stationary(StationaryFrame);
            let ctx = CorrectorContext {
                mesh: &mesh,
                solvers: &solvers,
                frame: &frame,
                options: &options,
                delta_t,
            };
            let op = DiffusiveMomentumPredictor.predict(&mesh, &flow, &thermo.mu, delta_t);
            let mut corrector = PressureCorrector::new(
                scheme,
                true,
                PressureControl::new(P_REF, None, None).unwrap(),
                (0, 0.0),
            );
            let report = corrector
                .correct(&ctx, &mut pimple, &mut flow, &thermo, &op)
                .unwrap();
            assert_eq!(report.n_solves, n_non_orthogonal + 1);
            assert!(!report.limited);

            let div_phi = fvc::div(&mesh, &flow.phi);
            let ddt_psi = fvc::ddt(&thermo.psi, delta_t);
            let s_rho = options.source(&mesh, "rho");
            assert_relative_eq!(s_rho[3], 2.0);
            let scale: f64 = flow.phi.values.iter().map(|phi| phi.abs()).sum();
            for i in 0..mesh.n_cells() {
                let imbalance =
                    (div_phi[i] + ddt_psi[i] * P_REF - s_rho[i]) * mesh.cell_volumes[i];
                assert!(
                    imbalance.abs() < 1e-8 * scale,
                    "{:?} with {} non-orthogonal correctors: cell {} imbalance {:e}",
                    scheme,
                    n_non_orthogonal,
                    i,
                    imbalance
                );
            }
            // heated cells expand and the source adds mass, so more leaves through the outlet
            let inflow: f64 = -mesh.patches[0]
                .faces()
                .map(|f| flow.phi.values[f])
                .sum::<f64>();
            let outflow: f64 = mesh.patches[1]
                .faces()
                .map(|f| flow.phi.values[f])
                .sum();
            assert!(inflow > 0.0);
            assert!(outflow > inflow);
        }
    }
}

const CASE: &str = r#"{
    "mesh": { "nx": 8, "ny": 3, "lx": 0.04, "ly": 0.012, "skew": 0.2,
              "patches": { "left": "inlet", "right": "outlet" } },
    "flame_properties": { "p_ref": 100000.0 },
    "thermo": {
        "species": [
            { "name": "A", "molar_mass": 30.0, "cp": 1200.0, "hf": -1.0e6 },
            { "name": "B", "molar_mass": 28.0, "cp": 1040.0 }
        ],
        "inert_specie": "B",
        "energy": "e"
    },
    "initial_conditions": {
        "T": 300.0,
        "Y": { "B": 1.0 },
        "inlet": { "T": 320.0, "U": [0.2, 0.0], "Y": { "A": 0.1, "B": 0.9 } }
    },
    "pimple": { "n_correctors": 2, "n_non_orthogonal_correctors": 1,
                "pressure_scheme": "consistent", "p_min": 90000.0, "p_max": 110000.0 },
    "relaxation": { "fields": { "pPrime": 0.7 } },
    "linear_solvers": {
        "pPrime": { "solver": "PCG", "tolerance": 1e-10 },
        "e": { "solver": "PBiCGStab", "tolerance": 1e-10 },
        "Yi": { "solver": "smoothSolver", "tolerance": 1e-10 }
    },
    "chemistry": {
        "initial_chemical_time_step": 1e-6,
        "reactions": [ { "fuel": "A", "products": { "B": 1.0 }, "A": 1.0e6, "E": 5.0e4 } ]
    },
    "fv_options": [ { "type": "temperature_limit", "min": 250.0, "max": 2500.0 } ],
    "time": { "delta_t": 1e-4, "end_time": 3e-4 }
}"#;

#[test]
fn driver_runs_to_end_time_and_keeps_mass_fractions_closed() {
    let case = CaseSettings::from_json(CASE).unwrap();
    let mut solver = ReactingLowMachSolver::from_case(&case).unwrap();
    let reports = solver.run().unwrap();

    assert_eq!(reports.len(), 3);
    assert_eq!(solver.time_index, 3);
    assert_relative_eq!(solver.time, 3e-4, max_relative = 1e-12);
    for report in &reports {
        assert_eq!(report.n_pressure_solves, 4);
        assert!(report.residual("pPrime").is_some());
        assert!(report.residual("Yi").is_some());
        assert!(report.residual("e").is_some());
    }

    let (t_min, t_max) = solver.thermo.T.min_max();
    assert!(t_min >= 250.0 - 1e-9 && t_max <= 2500.0 + 1e-9);
    for cell in 0..solver.mesh.n_cells() {
        let y_a = solver.thermo.Y[0].internal[cell];
        let y_b = solver.thermo.Y[1].internal[cell];
        assert!((0.0..=1.0 + 1e-9).contains(&y_a));
        assert_relative_eq!(y_a + y_b, 1.0, epsilon = 1e-9);
    }
    // the inlet composition has entered the first column of cells
    assert!(solver.thermo.Y[0].internal[0] > 0.0);
    for rho in &solver.flow.rho.internal {
        assert!(rho.is_finite() && *rho > 0.0);
    }
}

#[test]
fn driver_rejects_bad_controls() {
    let mut case = CaseSettings::from_json(CASE).unwrap();
    case.pimple.p_ref_cell = 1000;
    assert!(matches!(
        ReactingLowMachSolver::from_case(&case),
        Err(LowMachError::Config(ConfigError::Invalid(_)))
    ));

    let mut case = CaseSettings::from_json(CASE).unwrap();
    case.combustion = "eddyDissipation".to_string();
    assert!(matches!(
        ReactingLowMachSolver::from_case(&case),
        Err(LowMachError::Config(ConfigError::UnknownModel { .. }))
    ));

    let mut case = CaseSettings::from_json(CASE).unwrap();
    case.pimple.p_min = Some(2e5);
    assert!(matches!(
        ReactingLowMachSolver::from_case(&case),
        Err(LowMachError::Config(ConfigError::Invalid(_)))
    ));

    let mut case = CaseSettings::from_json(CASE).unwrap();
    case.fv_options.push(FvOption::ExplicitSource {
        field: "rho".to_string(),
        cells: vec![10_000],
        value: 1.0,
    });
    assert!(case.validate().is_ok());
    assert!(matches!(
        ReactingLowMachSolver::from_case(&case),
        Err(LowMachError::Config(ConfigError::Invalid(_)))
    ));

    let mut case = CaseSettings::from_json(CASE).unwrap();
    case.fv_options.push(FvOption::FixedValueConstraint {
        field: "e".to_string(),
        cells: vec![0, 24],
        value: 3.0e5,
    });
    assert!(matches!(
        ReactingLowMachSolver::from_case(&case),
        Err(LowMachError::Config(ConfigError::Invalid(_)))
    ));

    let mut case = CaseSettings::from_json(CASE).unwrap();
    case.frame = FrameSettings::Translating {
        velocity: [1.0, 0.0],
        cells: vec![2, 99],
    };
    assert!(matches!(
        ReactingLowMachSolver::from_case(&case),
        Err(LowMachError::Config(ConfigError::Invalid(_)))
    ));

    let mut case = CaseSettings::from_json(CASE).unwrap();
    case.chemistry.ode.solver = "Radau5".to_string();
    match ReactingLowMachSolver::from_case(&case) {
        Err(LowMachError::Config(ConfigError::UnknownModel { kind, name })) => {
            assert_eq!(kind, "ODE solver");
            assert_eq!(name, "Radau5");
        }
        other => panic!("unexpected result {:?}", other.err()),
    }
}

#[test]
fn inert_specie_is_moved_to_the_end_of_the_species_list() {
    let mut case = CaseSettings::from_json(CASE).unwrap();
    case.thermo.species.reverse();
    assert_eq!(case.thermo.species[0].name, "B");
    let solver = ReactingLowMachSolver::from_case(&case).unwrap();
    let names = solver.thermo.species.names();
    assert_eq!(names, vec!["A".to_string(), "B".to_string()]);
    assert_eq!(solver.thermo.inert_index, names.len() - 1);
    assert_eq!(solver.thermo.Y[1].name, "B");
    for cell in 0..solver.mesh.n_cells() {
        assert_relative_eq!(solver.thermo.Y[1].internal[cell], 1.0);
        assert_relative_eq!(solver.thermo.Y[0].internal[cell], 0.0);
    }
}

#[test]
fn bundled_case_builds() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("cases/premixed_channel.json");
    let case = CaseSettings::load_from_file(path).unwrap();
    let solver = ReactingLowMachSolver::from_case(&case).unwrap();
    assert_eq!(solver.mesh.n_cells(), 240);
    assert_eq!(solver.thermo.n_species(), 5);
    assert_eq!(solver.thermo.species.names()[solver.thermo.inert_index], "N2");
    assert_relative_eq!(solver.flow.p_ref, 101325.0);
}
