use crate::FiniteVolume::fields::{VolScalarField, VolVectorField};
use crate::FiniteVolume::fvc;
use crate::FiniteVolume::mesh::FvMesh;
use crate::LowMachSolver::flow_state::FlowState;
use crate::LowMachSolver::fv_options::FvOptions;

/// `U = HbyA - coeff grad(pPrime)`, then boundary conditions, option
/// corrections and `K = 0.5|U|^2`.
#[allow(non_snake_case)]
pub fn reconstruct_velocity(
    mesh: &FvMesh,
    flow: &mut FlowState,
    HbyA: &VolVectorField,
    coeff: &VolScalarField,
    options: &impl FvOptions,
) {
    let grad_p = fvc::grad(mesh, &flow.pPrime);
    for (i, u) in flow.U.internal.iter_mut().enumerate() {
        *u = HbyA.internal[i] - grad_p[i] * coeff.internal[i];
    }
    flow.U.correct_boundary_conditions(mesh);
    options.correct_velocity(mesh, &mut flow.U);
    flow.update_kinetic_energy();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FiniteVolume::fields::PatchField;
    use crate::LowMachSolver::fv_options::{FvOption, FvOptionList};
    use crate::Thermophysics::reaction_thermo::EnergyForm;
    use crate::Thermophysics::thermo_tests::uniform_thermo;
    use approx::assert_relative_eq;
    use nalgebra::Vector2;

    #[test]
    fn linear_pressure_decelerates_uniformly() {
        let mesh = FvMesh::rectangle(4, 2, 4.0, 2.0);
        let thermo = uniform_thermo(&mesh, EnergyForm::Enthalpy, 1e5, 300.0, 0.2);
        let zero_gradient = || {
            mesh.patches
                .iter()
                .map(|p| PatchField::zero_gradient(p.size))
                .collect::<Vec<_>>()
        };
        let u = VolVectorField::uniform("U", &mesh, Vector2::zeros(), zero_gradient());
        // pPrime = 3 x, exact boundary values
        let mut p_prime = VolScalarField::new(
            "pPrime",
            &mesh,
            mesh.cell_centres.iter().map(|c| 3.0 * c.x).collect(),
            mesh.patches
                .iter()
                .map(|p| PatchField::fixed_value(0.0, p.size))
                .collect(),
        );
        for (pi, patch) in mesh.patches.iter().enumerate() {
            for (local, face) in patch.faces().enumerate() {
                p_prime.boundary[pi].values[local] = 3.0 * mesh.face_centres[face].x;
            }
        }
        let mut flow = FlowState::new(&mesh, u, p_prime, &thermo, 1e5);
        let hby_a = VolVectorField::uniform("HbyA", &mesh, Vector2::new(1.0, 0.0), zero_gradient());
        let coeff = VolScalarField::calculated("rAU", &mesh, 0.1);
        let options = FvOptionList::new(vec![FvOption::VelocityLimit { max: 10.0 }]);
        reconstruct_velocity(&mesh, &mut flow, &hby_a, &coeff, &options);
        for i in 0..mesh.n_cells() {
            assert_relative_eq!(flow.U.internal[i].x, 0.7, epsilon = 1e-12);
            assert_relative_eq!(flow.U.internal[i].y, 0.0, epsilon = 1e-12);
            assert_relative_eq!(flow.K.internal[i], 0.5 * 0.49, epsilon = 1e-12);
        }
    }
}
