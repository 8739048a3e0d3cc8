//! Builds the mesh, the thermo and the flow fields of a case from its settings.
//!
//! | patch  | U          | T                      | Y          | pPrime            |
//! |--------|------------|------------------------|------------|-------------------|
//! | inlet  | fixed      | fixed                  | fixed      | fixed flux        |
//! | outlet | zero grad. | zero grad.             | zero grad. | fixed `0`         |
//! | wall   | fixed `0`  | fixed or zero gradient | zero grad. | fixed flux        |
//!
//! The thermodynamic pressure `p` is uniform at `p_ref` with zero-gradient
//! patches.
use crate::FiniteVolume::fields::{PatchField, VolScalarField, VolVectorField};
use crate::FiniteVolume::mesh::FvMesh;
use crate::LowMachSolver::flow_state::FlowState;
use crate::LowMachSolver::time_step::LowMachError;
use crate::Thermophysics::equation_of_state::create_equation_of_state;
use crate::Thermophysics::mechanism::create_mechanism;
use crate::Thermophysics::reaction_thermo::{EnergyForm, ReactionThermo};
use crate::Thermophysics::species::SpeciesTable;
use crate::Thermophysics::transport::create_transport;
use crate::settings::{CaseSettings, ConfigError, PatchKind};
use log::info;
use nalgebra::Vector2;

pub struct CaseFields {
    pub mesh: FvMesh,
    pub thermo: ReactionThermo,
    pub flow: FlowState,
}

#[allow(non_snake_case)]
pub fn setup_case(case: &CaseSettings) -> Result<CaseFields, LowMachError> {
    case.validate()?;
    let p_ref = case.p_ref()?;
    let m = &case.mesh;
    let mesh = FvMesh::skewed_rectangle(m.nx, m.ny, m.lx, m.ly, m.skew);
    info!(
        "mesh: {} cells, {} faces, non-orthogonal: {}",
        mesh.n_cells(),
        mesh.n_faces(),
        mesh.is_non_orthogonal()
    );

    let ic = &case.initial_conditions;
    let inlet = ic.inlet.as_ref();
    let missing_inlet = || ConfigError::MissingEntry("initial_conditions.inlet".to_string());

    let mut kinds = Vec::with_capacity(mesh.patches.len());
    for patch in &mesh.patches {
        let kind = case.mesh.patch_kind(&patch.name);
        if kind == PatchKind::Inlet && inlet.is_none() {
            return Err(missing_inlet().into());
        }
        kinds.push((kind, patch.size));
    }

    let u_boundary = kinds
        .iter()
        .map(|&(kind, size)| match (kind, inlet) {
            (PatchKind::Inlet, Some(i)) => PatchField::fixed_value(Vector2::new(i.U[0], i.U[1]), size),
            (PatchKind::Outlet, _) => PatchField::zero_gradient(size),
            _ => PatchField::fixed_value(Vector2::zeros(), size),
        })
        .collect();
    let t_boundary = kinds
        .iter()
        .map(|&(kind, size)| match (kind, inlet, ic.wall_temperature) {
            (PatchKind::Inlet, Some(i), _) => PatchField::fixed_value(i.T, size),
            (PatchKind::Wall, _, Some(t_wall)) => PatchField::fixed_value(t_wall, size),
            _ => PatchField::zero_gradient(size),
        })
        .collect();
    let p_prime_boundary = kinds
        .iter()
        .map(|&(kind, size)| match kind {
            PatchKind::Outlet => PatchField::fixed_value(0.0, size),
            _ => PatchField::fixed_flux_pressure(size),
        })
        .collect();
    let p_boundary = kinds
        .iter()
        .map(|&(_, size)| PatchField::zero_gradient(size))
        .collect();

    let mut species = SpeciesTable::new(case.thermo.species.clone());
    if species.move_to_end(&case.thermo.inert_specie) {
        info!(
            "inert specie {} moved to the end of the species list",
            case.thermo.inert_specie
        );
    }
    let Y = species
        .names()
        .iter()
        .map(|name| {
            let boundary = kinds
                .iter()
                .map(|&(kind, size)| match (kind, inlet) {
                    (PatchKind::Inlet, Some(i)) => {
                        PatchField::fixed_value(i.Y.get(name).copied().unwrap_or(0.0), size)
                    }
                    _ => PatchField::zero_gradient(size),
                })
                .collect();
            let y0 = ic.Y.get(name).copied().unwrap_or(0.0);
            VolScalarField::uniform(name, &mesh, y0, boundary)
        })
        .collect();

    let p = VolScalarField::uniform("p", &mesh, p_ref, p_boundary);
    let T = VolScalarField::uniform("T", &mesh, ic.T, t_boundary);
    let eos = create_equation_of_state(&case.thermo.equation_of_state, p_ref)?;
    let transport = create_transport(&case.thermo.transport);
    let mechanism = create_mechanism(&case.chemistry.reactions, &species)?;
    let thermo = ReactionThermo::new(
        &mesh,
        species,
        &case.thermo.inert_specie,
        case.thermo.energy,
        eos,
        transport,
        mechanism,
        p,
        T,
        Y,
    )?;
    thermo.validate(
        "reacting low-Mach solver",
        &[EnergyForm::Enthalpy, EnergyForm::InternalEnergy],
    )?;
    thermo.species.pretty_print();

    let U = VolVectorField::uniform(
        "U",
        &mesh,
        Vector2::new(ic.U[0], ic.U[1]),
        u_boundary,
    );
    let p_prime = VolScalarField::uniform("pPrime", &mesh, 0.0, p_prime_boundary);
    let flow = FlowState::new(&mesh, U, p_prime, &thermo, p_ref);
    Ok(CaseFields { mesh, thermo, flow })
}
