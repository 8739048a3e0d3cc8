//! Implicit finite-volume operators. Each function returns an `FvMatrix` for
//! the unknown field; explicit parts (old time levels, non-orthogonal
//! corrections, boundary values) are folded into the source.
use crate::FiniteVolume::fields::{BoundaryCondition, SurfaceScalarField, VolScalarField};
use crate::FiniteVolume::fv_matrix::FvMatrix;
use crate::FiniteVolume::fvc;
use crate::FiniteVolume::mesh::FvMesh;

/// Euler `ddt(rho, x)`; `rho = None` gives `ddt(x)`.
pub fn ddt(mesh: &FvMesh, rho: Option<&VolScalarField>, x: &VolScalarField, delta_t: f64) -> FvMatrix {
    let mut m = FvMatrix::new(&x.name, mesh);
    let x_old = x.old_time();
    for i in 0..mesh.n_cells() {
        let (rho_new, rho_old) = match rho {
            Some(r) => (r.internal[i], r.old_time().internal[i]),
            None => (1.0, 1.0),
        };
        let c = mesh.cell_volumes[i] / delta_t;
        m.diag[i] = rho_new * c;
        m.source[i] = rho_old * x_old.internal[i] * c;
    }
    m
}

/// Upwind `div(phi, x)`.
pub fn div(mesh: &FvMesh, phi: &SurfaceScalarField, x: &VolScalarField) -> FvMatrix {
    let mut m = FvMatrix::new(&x.name, mesh);
    let n_internal = mesh.n_internal_faces();
    for f in 0..n_internal {
        let flux = phi.values[f];
        m.add_face_coeffs(mesh, f, -flux.max(0.0), flux.min(0.0));
    }
    for f in n_internal..mesh.n_faces() {
        let b = f - n_internal;
        let flux = phi.values[f];
        let (patch, local) = mesh.boundary_face(f);
        let pf = &x.boundary[patch];
        match pf.condition {
            BoundaryCondition::FixedValue => m.boundary_constant[b] += flux * pf.values[local],
            BoundaryCondition::FixedGradient | BoundaryCondition::FixedFluxPressure => {
                m.boundary_diag[b] += flux;
                m.boundary_constant[b] += flux * pf.gradient[local] / mesh.delta_coeffs[f];
            }
            BoundaryCondition::ZeroGradient | BoundaryCondition::Calculated => {
                m.boundary_diag[b] += flux
            }
        }
    }
    m
}

/// `laplacian(gamma, x)` with face diffusivity `gamma`; the non-orthogonal part
/// is evaluated explicitly from the current `x`.
pub fn laplacian(mesh: &FvMesh, gamma: &SurfaceScalarField, x: &VolScalarField) -> FvMatrix {
    let mut m = FvMatrix::new(&x.name, mesh);
    let n_internal = mesh.n_internal_faces();
    for f in 0..n_internal {
        let g = gamma.values[f] * mesh.mag_sf[f] * mesh.delta_coeffs[f];
        m.add_face_coeffs(mesh, f, g, g);
    }
    for f in n_internal..mesh.n_faces() {
        let b = f - n_internal;
        let (patch, local) = mesh.boundary_face(f);
        let pf = &x.boundary[patch];
        match pf.condition {
            BoundaryCondition::FixedValue => {
                let g = gamma.values[f] * mesh.mag_sf[f] * mesh.delta_coeffs[f];
                m.boundary_diag[b] -= g;
                m.boundary_constant[b] += g * pf.values[local];
            }
            BoundaryCondition::FixedGradient | BoundaryCondition::FixedFluxPressure => {
                m.boundary_constant[b] += gamma.values[f] * mesh.mag_sf[f] * pf.gradient[local];
            }
            BoundaryCondition::ZeroGradient | BoundaryCondition::Calculated => {}
        }
    }
    if mesh.is_non_orthogonal() {
        let grad_f = fvc::interpolate_grad(mesh, x);
        let correction = (0..mesh.n_faces())
            .map(|f| {
                if mesh.is_internal(f) {
                    gamma.values[f] * mesh.non_orth_corr[f].dot(&grad_f[f])
                } else {
                    0.0
                }
            })
            .collect();
        m.add_face_flux_correction(mesh, correction);
    }
    m
}

/// `laplacian(gamma, x)` with a cell diffusivity interpolated linearly.
pub fn laplacian_vol(mesh: &FvMesh, gamma: &VolScalarField, x: &VolScalarField) -> FvMatrix {
    laplacian(mesh, &fvc::interpolate(mesh, gamma), x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FiniteVolume::fields::PatchField;
    use crate::FiniteVolume::linear_solver::{SolverControls, create_linear_solver};
    use approx::assert_relative_eq;

    fn controls(solver: &str) -> SolverControls {
        SolverControls {
            solver: solver.to_string(),
            tolerance: 1e-12,
            ..SolverControls::default()
        }
    }

    fn channel_field(mesh: &FvMesh, left: f64, right: f64) -> VolScalarField {
        let boundary = mesh
            .patches
            .iter()
            .map(|p| match p.name.as_str() {
                "left" => PatchField::fixed_value(left, p.size),
                "right" => PatchField::fixed_value(right, p.size),
                _ => PatchField::zero_gradient(p.size),
            })
            .collect();
        VolScalarField::uniform("T", mesh, 0.0, boundary)
    }

    #[test]
    fn laplace_gives_linear_profile() {
        let mesh = FvMesh::rectangle(10, 2, 1.0, 0.2);
        let mut t = channel_field(&mesh, 0.0, 1.0);
        let gamma = SurfaceScalarField::uniform("gamma", &mesh, 1.0);
        let eqn = -laplacian(&mesh, &gamma, &t);
        let solver = create_linear_solver(&controls("PCG")).unwrap();
        eqn.solve(&mesh, &mut t, &solver).unwrap();
        for (i, c) in mesh.cell_centres.iter().enumerate() {
            assert_relative_eq!(t.internal[i], c.x, epsilon = 1e-8);
        }
        // conservative flux: equal through every x-section
        let flux = eqn.flux(&mesh, &t);
        let left = mesh.patch_index("left").unwrap();
        let total_left: f64 = mesh.patches[left].faces().map(|f| flux.values[f]).sum();
        assert_relative_eq!(total_left, 0.2, epsilon = 1e-8);
    }

    #[test]
    fn upwind_convection_transports_inlet_value() {
        let mesh = FvMesh::rectangle(5, 1, 1.0, 1.0);
        let mut y = channel_field(&mesh, 1.0, 0.0);
        // right patch is an outlet
        let right = mesh.patch_index("right").unwrap();
        y.boundary[right] = PatchField::zero_gradient(1);
        let u = 2.0;
        let phi = SurfaceScalarField::new(
            "phi",
            (0..mesh.n_faces())
                .map(|f| u * mesh.face_areas[f].x)
                .collect(),
        );
        let eqn = div(&mesh, &phi, &y);
        let solver = create_linear_solver(&controls("PBiCGStab")).unwrap();
        eqn.solve(&mesh, &mut y, &solver).unwrap();
        for v in &y.internal {
            assert_relative_eq!(*v, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn ddt_of_unchanged_field_balances() {
        let mesh = FvMesh::rectangle(3, 3, 1.0, 1.0);
        let mut rho = VolScalarField::calculated("rho", &mesh, 1.1);
        let mut x = VolScalarField::calculated("x", &mesh, 4.0);
        rho.store_old_time();
        x.store_old_time();
        let eqn = ddt(&mesh, Some(&rho), &x, 0.01);
        for r in eqn.residual(&mesh, &x) {
            assert!(r.abs() < 1e-10);
        }
    }

    #[test]
    fn skewed_laplacian_flux_matches_residual() {
        let mesh = FvMesh::skewed_rectangle(5, 4, 1.0, 1.0, 0.5);
        let mut t = channel_field(&mesh, 0.0, 1.0);
        let internal: Vec<f64> = mesh.cell_centres.iter().map(|c| c.x * c.x + c.y).collect();
        t.internal = internal;
        t.correct_boundary_conditions(&mesh);
        let gamma = SurfaceScalarField::uniform("gamma", &mesh, 0.3);
        let eqn = -laplacian(&mesh, &gamma, &t);
        assert!(eqn.face_flux_correction.is_some());
        // no explicit source besides the correction: Op(x) = sum of face fluxes = -residual
        let flux = eqn.flux(&mesh, &t);
        let integrated = fvc::surface_integrate(&mesh, &flux.values);
        let residual = eqn.residual(&mesh, &t);
        for i in 0..mesh.n_cells() {
            assert_relative_eq!(integrated[i], -residual[i], epsilon = 1e-10);
        }
    }
}
