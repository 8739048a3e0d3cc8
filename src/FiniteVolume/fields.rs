//! # Geometric fields
//!
//! `VolField<T>` holds one value per cell plus one value per boundary face
//! (grouped by patch, each patch carrying its boundary condition).
//! `SurfaceField<T>` holds one value per face (internal faces first).
//! Both can keep their previous time level, and volume fields can keep a
//! previous iteration for under-relaxation.
use crate::FiniteVolume::mesh::FvMesh;
use nalgebra::Vector2;
use std::fmt::Debug;
use std::ops::{Add, Mul, Neg, Sub};

/// Values a field can carry: scalars and 2-vectors.
pub trait FieldValue:
    Copy
    + Debug
    + PartialEq
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Neg<Output = Self>
    + Mul<f64, Output = Self>
{
    fn zero() -> Self;
    fn mag(&self) -> f64;
}

impl FieldValue for f64 {
    fn zero() -> Self {
        0.0
    }
    fn mag(&self) -> f64 {
        self.abs()
    }
}

impl FieldValue for Vector2<f64> {
    fn zero() -> Self {
        Vector2::zeros()
    }
    fn mag(&self) -> f64 {
        self.norm()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryCondition {
    /// patch values are prescribed and never overwritten by the cells
    FixedValue,
    ZeroGradient,
    /// `values = cell + gradient/delta`, gradient prescribed per face
    FixedGradient,
    /// fixed gradient whose value is set by the pressure constraint so that the
    /// boundary flux matches the velocity boundary condition
    FixedFluxPressure,
    /// derived field, values copied from the adjacent cell
    Calculated,
}

impl BoundaryCondition {
    /// false when the patch value must not be changed by assignment
    pub fn assignable(&self) -> bool {
        !matches!(self, BoundaryCondition::FixedValue)
    }

    pub fn fixes_value(&self) -> bool {
        matches!(self, BoundaryCondition::FixedValue)
    }

    pub fn fixes_gradient(&self) -> bool {
        matches!(
            self,
            BoundaryCondition::FixedGradient | BoundaryCondition::FixedFluxPressure
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatchField<T: FieldValue> {
    pub condition: BoundaryCondition,
    pub values: Vec<T>,
    /// only used by gradient conditions
    pub gradient: Vec<T>,
}

impl<T: FieldValue> PatchField<T> {
    pub fn fixed_value(value: T, size: usize) -> Self {
        Self {
            condition: BoundaryCondition::FixedValue,
            values: vec![value; size],
            gradient: Vec::new(),
        }
    }

    pub fn zero_gradient(size: usize) -> Self {
        Self::with_condition(BoundaryCondition::ZeroGradient, size)
    }

    pub fn calculated(size: usize) -> Self {
        Self::with_condition(BoundaryCondition::Calculated, size)
    }

    pub fn fixed_gradient(gradient: T, size: usize) -> Self {
        Self {
            condition: BoundaryCondition::FixedGradient,
            values: vec![T::zero(); size],
            gradient: vec![gradient; size],
        }
    }

    pub fn fixed_flux_pressure(size: usize) -> Self {
        Self {
            condition: BoundaryCondition::FixedFluxPressure,
            values: vec![T::zero(); size],
            gradient: vec![T::zero(); size],
        }
    }

    pub fn with_condition(condition: BoundaryCondition, size: usize) -> Self {
        let gradient = if condition.fixes_gradient() {
            vec![T::zero(); size]
        } else {
            Vec::new()
        };
        Self {
            condition,
            values: vec![T::zero(); size],
            gradient,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VolField<T: FieldValue> {
    pub name: String,
    pub internal: Vec<T>,
    pub boundary: Vec<PatchField<T>>,
    old: Option<Box<VolField<T>>>,
    prev_iter: Option<Vec<T>>,
}

pub type VolScalarField = VolField<f64>;
pub type VolVectorField = VolField<Vector2<f64>>;

impl<T: FieldValue> VolField<T> {
    /// Field with the given internal values; boundary values are made
    /// consistent with the conditions immediately.
    pub fn new(name: &str, mesh: &FvMesh, internal: Vec<T>, boundary: Vec<PatchField<T>>) -> Self {
        debug_assert_eq!(internal.len(), mesh.n_cells());
        debug_assert_eq!(boundary.len(), mesh.patches.len());
        let mut field = Self {
            name: name.to_string(),
            internal,
            boundary,
            old: None,
            prev_iter: None,
        };
        field.correct_boundary_conditions(mesh);
        field
    }

    pub fn uniform(name: &str, mesh: &FvMesh, value: T, boundary: Vec<PatchField<T>>) -> Self {
        Self::new(name, mesh, vec![value; mesh.n_cells()], boundary)
    }

    /// Uniform field with calculated patches.
    pub fn calculated(name: &str, mesh: &FvMesh, value: T) -> Self {
        let boundary = mesh
            .patches
            .iter()
            .map(|p| PatchField::calculated(p.size))
            .collect();
        Self::uniform(name, mesh, value, boundary)
    }

    /// Same boundary conditions as `self`, new name and internal values.
    pub fn like(&self, name: &str, mesh: &FvMesh, internal: Vec<T>) -> Self {
        Self::new(name, mesh, internal, self.boundary.clone())
    }

    /// Applies the patch conditions using the current cell values.
    pub fn correct_boundary_conditions(&mut self, mesh: &FvMesh) {
        for (patch, pf) in mesh.patches.iter().zip(self.boundary.iter_mut()) {
            match pf.condition {
                BoundaryCondition::FixedValue => {}
                BoundaryCondition::ZeroGradient | BoundaryCondition::Calculated => {
                    for (local, face) in patch.faces().enumerate() {
                        pf.values[local] = self.internal[mesh.owner[face]];
                    }
                }
                BoundaryCondition::FixedGradient | BoundaryCondition::FixedFluxPressure => {
                    for (local, face) in patch.faces().enumerate() {
                        pf.values[local] = self.internal[mesh.owner[face]]
                            + pf.gradient[local] * (1.0 / mesh.delta_coeffs[face]);
                    }
                }
            }
        }
    }

    /// Value on a boundary face given by its global index.
    pub fn boundary_value(&self, mesh: &FvMesh, face: usize) -> T {
        let (patch, local) = mesh.boundary_face(face);
        self.boundary[patch].values[local]
    }

    pub fn condition_of(&self, mesh: &FvMesh, face: usize) -> BoundaryCondition {
        let (patch, _) = mesh.boundary_face(face);
        self.boundary[patch].condition
    }

    pub fn set_patch_value(&mut self, patch: usize, value: T) {
        self.boundary[patch].values.iter_mut().for_each(|v| *v = value);
    }

    /// Assigns cell values and the boundary values of every assignable patch.
    pub fn assign(&mut self, other: &VolField<T>) {
        self.internal.copy_from_slice(&other.internal);
        for (pf, other_pf) in self.boundary.iter_mut().zip(&other.boundary) {
            if pf.condition.assignable() {
                pf.values.copy_from_slice(&other_pf.values);
            }
        }
    }

    pub fn store_old_time(&mut self) {
        let snapshot = VolField {
            name: format!("{}_0", self.name),
            internal: self.internal.clone(),
            boundary: self.boundary.clone(),
            old: None,
            prev_iter: None,
        };
        self.old = Some(Box::new(snapshot));
    }

    /// Previous time level, or the field itself before any time level was stored.
    pub fn old_time(&self) -> &VolField<T> {
        self.old.as_deref().unwrap_or(self)
    }

    pub fn has_old_time(&self) -> bool {
        self.old.is_some()
    }

    pub fn store_prev_iter(&mut self) {
        self.prev_iter = Some(self.internal.clone());
    }

    /// Explicit under-relaxation towards the stored previous iteration.
    pub fn relax(&mut self, mesh: &FvMesh, alpha: f64) {
        if let Some(prev) = &self.prev_iter {
            if alpha < 1.0 {
                for (x, x0) in self.internal.iter_mut().zip(prev) {
                    *x = *x0 + (*x - *x0) * alpha;
                }
                self.correct_boundary_conditions(mesh);
            }
        }
    }

    /// Cell-by-cell product with a scalar field; patches become calculated
    /// but keep the product of the boundary values.
    pub fn scaled_by(&self, name: &str, s: &VolScalarField) -> VolField<T> {
        let internal = self
            .internal
            .iter()
            .zip(&s.internal)
            .map(|(x, a)| *x * *a)
            .collect();
        let boundary = self
            .boundary
            .iter()
            .zip(&s.boundary)
            .map(|(pf, spf)| PatchField {
                condition: BoundaryCondition::Calculated,
                values: pf
                    .values
                    .iter()
                    .zip(&spf.values)
                    .map(|(x, a)| *x * *a)
                    .collect(),
                gradient: Vec::new(),
            })
            .collect();
        VolField {
            name: name.to_string(),
            internal,
            boundary,
            old: None,
            prev_iter: None,
        }
    }
}

impl VolScalarField {
    pub fn min_max(&self) -> (f64, f64) {
        self.internal
            .iter()
            .chain(self.boundary.iter().flat_map(|pf| pf.values.iter()))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
                (lo.min(x), hi.max(x))
            })
    }

    pub fn weighted_average(&self, mesh: &FvMesh) -> f64 {
        let sum: f64 = self
            .internal
            .iter()
            .zip(&mesh.cell_volumes)
            .map(|(x, v)| x * v)
            .sum();
        sum / mesh.total_volume()
    }

    /// true if no patch fixes the value, i.e. the field is only defined up to a constant
    pub fn needs_reference(&self) -> bool {
        !self.boundary.iter().any(|pf| pf.condition.fixes_value())
    }

    pub fn max_with(&mut self, lower: f64) {
        self.internal.iter_mut().for_each(|x| *x = x.max(lower));
        for pf in self.boundary.iter_mut() {
            pf.values.iter_mut().for_each(|x| *x = x.max(lower));
        }
    }
}

#[derive(Debug, Clone)]
pub struct SurfaceField<T: FieldValue> {
    pub name: String,
    pub values: Vec<T>,
    old: Option<Vec<T>>,
}

pub type SurfaceScalarField = SurfaceField<f64>;
pub type SurfaceVectorField = SurfaceField<Vector2<f64>>;

impl<T: FieldValue> SurfaceField<T> {
    pub fn new(name: &str, values: Vec<T>) -> Self {
        Self {
            name: name.to_string(),
            values,
            old: None,
        }
    }

    pub fn uniform(name: &str, mesh: &FvMesh, value: T) -> Self {
        Self::new(name, vec![value; mesh.n_faces()])
    }

    pub fn store_old_time(&mut self) {
        self.old = Some(self.values.clone());
    }

    pub fn old_values(&self) -> &[T] {
        self.old.as_deref().unwrap_or(&self.values)
    }
}

impl SurfaceScalarField {
    /// face-by-face product
    pub fn times(&self, name: &str, other: &SurfaceScalarField) -> SurfaceScalarField {
        SurfaceField::new(
            name,
            self.values
                .iter()
                .zip(&other.values)
                .map(|(a, b)| a * b)
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn walls(mesh: &FvMesh) -> Vec<PatchField<f64>> {
        mesh.patches
            .iter()
            .map(|p| PatchField::zero_gradient(p.size))
            .collect()
    }

    #[test]
    fn zero_gradient_copies_cell_values() {
        let mesh = FvMesh::rectangle(3, 1, 3.0, 1.0);
        let field = VolScalarField::new("T", &mesh, vec![1.0, 2.0, 3.0], walls(&mesh));
        let right = mesh.patch_index("right").unwrap();
        assert_eq!(field.boundary[right].values, vec![3.0]);
        assert_eq!(field.min_max(), (1.0, 3.0));
        assert_relative_eq!(field.weighted_average(&mesh), 2.0);
    }

    #[test]
    fn fixed_values_survive_correction_and_assignment() {
        let mesh = FvMesh::rectangle(2, 1, 2.0, 1.0);
        let mut b = walls(&mesh);
        b[0] = PatchField::fixed_value(5.0, 1);
        let mut field = VolScalarField::new("p", &mesh, vec![1.0, 1.0], b);
        let other = VolScalarField::calculated("q", &mesh, 7.0);
        field.assign(&other);
        assert_eq!(field.boundary[0].values, vec![5.0]);
        assert_eq!(field.boundary[1].values, vec![7.0]);
        assert!(!field.needs_reference());
    }

    #[test]
    fn fixed_gradient_extrapolates() {
        let mesh = FvMesh::rectangle(2, 1, 2.0, 1.0);
        let mut b = walls(&mesh);
        b[1] = PatchField::fixed_gradient(4.0, 1);
        let field = VolScalarField::new("p", &mesh, vec![0.0, 1.0], b);
        // half a cell between centre and face
        assert_relative_eq!(field.boundary[1].values[0], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn relaxation_blends_with_previous_iteration() {
        let mesh = FvMesh::rectangle(2, 1, 2.0, 1.0);
        let mut field = VolScalarField::calculated("p", &mesh, 1.0);
        field.store_prev_iter();
        field.internal = vec![3.0, 5.0];
        field.relax(&mesh, 0.5);
        assert_eq!(field.internal, vec![2.0, 3.0]);
    }

    #[test]
    fn old_time_defaults_to_current() {
        let mesh = FvMesh::rectangle(2, 1, 2.0, 1.0);
        let mut field = VolScalarField::calculated("rho", &mesh, 1.0);
        assert!(!field.has_old_time());
        assert_eq!(field.old_time().internal, vec![1.0, 1.0]);
        field.store_old_time();
        field.internal[0] = 2.0;
        assert_eq!(field.old_time().internal, vec![1.0, 1.0]);
    }
}
