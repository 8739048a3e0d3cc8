//! Transport of the tracked species with unity Lewis number:
//! `ddt(rho, Yi) + div(phi, Yi) - laplacian(alphaEff, Yi) == RR_i + S_Yi`.
//! The inert specie is not solved; it closes the mass balance.
use crate::Chemistry::combustion_model::CombustionModel;
use crate::FiniteVolume::fields::{SurfaceScalarField, VolScalarField};
use crate::FiniteVolume::fvm;
use crate::FiniteVolume::linear_solver::LinearSolverError;
use crate::FiniteVolume::mesh::FvMesh;
use crate::LowMachSolver::fv_options::FvOptions;
use crate::LowMachSolver::pimple_control::{LinearSolverTable, PimpleControl};
use crate::Thermophysics::reaction_thermo::ReactionThermo;
use log::debug;

/// Solves every non-inert specie, clamps at zero and sets the inert specie to
/// `max(0, 1 - sum)`. Returns the largest initial residual.
#[allow(clippy::too_many_arguments)]
pub fn solve_species(
    mesh: &FvMesh,
    pimple: &PimpleControl,
    solvers: &LinearSolverTable,
    thermo: &mut ReactionThermo,
    phi: &SurfaceScalarField,
    rho: &VolScalarField,
    alpha_eff: &VolScalarField,
    combustion: &impl CombustionModel,
    options: &impl FvOptions,
    delta_t: f64,
) -> Result<f64, LinearSolverError> {
    let inert = thermo.inert_index;
    let relaxation = pimple.equation_relaxation("Yi");
    let solver = solvers.get(&pimple.solver_key("Yi"));
    let mut max_residual: f64 = 0.0;

    for (i, y) in thermo.Y.iter_mut().enumerate() {
        if i == inert {
            continue;
        }
        let mut m = fvm::ddt(mesh, Some(rho), y, delta_t) + fvm::div(mesh, phi, y)
            - fvm::laplacian_vol(mesh, alpha_eff, y);
        m.add_rhs(mesh, combustion.reaction_rate(i));
        m.add_rhs(mesh, &options.source(mesh, &y.name));
        m.relax(mesh, y, relaxation);
        options.constrain(mesh, &mut m);
        let performance = m.solve(mesh, y, solver)?;
        max_residual = max_residual.max(performance.initial_residual);
        y.max_with(0.0);
    }

    let n_cells = mesh.n_cells();
    let mut sum = vec![0.0; n_cells];
    for (i, y) in thermo.Y.iter().enumerate() {
        if i != inert {
            sum.iter_mut().zip(&y.internal).for_each(|(s, yi)| *s += yi);
        }
    }
    let y_inert = &mut thermo.Y[inert];
    for (yi, s) in y_inert.internal.iter_mut().zip(&sum) {
        *yi = (1.0 - s).max(0.0);
    }
    y_inert.correct_boundary_conditions(mesh);
    debug!(
        "inert specie {} min/max = {:?}",
        y_inert.name,
        y_inert.min_max()
    );
    Ok(max_residual)
}
