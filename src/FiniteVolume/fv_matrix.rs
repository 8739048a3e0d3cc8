//! # Finite-volume matrix
//!
//! Face-addressed storage of a discretised scalar equation `Op(x) = source`:
//! - `diag`: per-cell coefficient,
//! - `lower[f]` / `upper[f]`: per internal face, coefficient of the owner value in
//!   the neighbour row and of the neighbour value in the owner row,
//! - `boundary_diag[b]` / `boundary_constant[b]`: per boundary face, the face
//!   contribution `boundary_diag * x_P + boundary_constant` to the owner row,
//! - `source`: right-hand side (cell-integrated),
//! - `face_flux_correction`: optional explicit face contribution (non-orthogonal
//!   part of a Laplacian). Its divergence is already contained in `source`.
//!
//! The face flux of the operator is
//! `upper * x_N - lower * x_P + correction` on internal faces and
//! `boundary_diag * x_P + boundary_constant` on boundary faces; the row sums of
//! the face fluxes reproduce the assembled operator, so `flux()` after a solve
//! is conservative by construction.
use crate::FiniteVolume::fields::{SurfaceScalarField, VolScalarField};
use crate::FiniteVolume::fvc;
use crate::FiniteVolume::linear_solver::{
    LinearSolver, LinearSolverEnum, LinearSolverError, SolverPerformance, SparseMatrix,
};
use crate::FiniteVolume::mesh::FvMesh;
use log::{info, warn};
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

#[derive(Debug, Clone, PartialEq)]
pub struct FvMatrix {
    pub field_name: String,
    pub diag: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub source: Vec<f64>,
    pub boundary_diag: Vec<f64>,
    pub boundary_constant: Vec<f64>,
    pub face_flux_correction: Option<Vec<f64>>,
}

impl FvMatrix {
    pub fn new(field_name: &str, mesh: &FvMesh) -> Self {
        let n_internal = mesh.n_internal_faces();
        let n_boundary = mesh.n_faces() - n_internal;
        Self {
            field_name: field_name.to_string(),
            diag: vec![0.0; mesh.n_cells()],
            lower: vec![0.0; n_internal],
            upper: vec![0.0; n_internal],
            source: vec![0.0; mesh.n_cells()],
            boundary_diag: vec![0.0; n_boundary],
            boundary_constant: vec![0.0; n_boundary],
            face_flux_correction: None,
        }
    }

    /// Adds an internal-face coupling and keeps the diagonal as the negative
    /// sum of the off-diagonals, so each face contributes a pure flux.
    pub fn add_face_coeffs(&mut self, mesh: &FvMesh, face: usize, lower: f64, upper: f64) {
        self.lower[face] += lower;
        self.upper[face] += upper;
        self.diag[mesh.owner[face]] -= lower;
        self.diag[mesh.neighbour[face]] -= upper;
    }

    /// Adds an explicit face flux to the operator.
    pub fn add_face_flux_correction(&mut self, mesh: &FvMesh, correction: Vec<f64>) {
        let integrated = fvc::surface_integrate(mesh, &correction);
        for (s, c) in self.source.iter_mut().zip(integrated) {
            *s -= c;
        }
        match &mut self.face_flux_correction {
            Some(existing) => existing
                .iter_mut()
                .zip(&correction)
                .for_each(|(e, c)| *e += c),
            None => self.face_flux_correction = Some(correction),
        }
    }

    /// `Op + field` for an explicit per-unit-volume term.
    pub fn add_explicit(&mut self, mesh: &FvMesh, per_volume: &[f64]) {
        for ((s, v), x) in self.source.iter_mut().zip(&mesh.cell_volumes).zip(per_volume) {
            *s -= v * x;
        }
    }

    /// `Op == field` for a per-unit-volume right-hand side.
    pub fn add_rhs(&mut self, mesh: &FvMesh, per_volume: &[f64]) {
        for ((s, v), x) in self.source.iter_mut().zip(&mesh.cell_volumes).zip(per_volume) {
            *s += v * x;
        }
    }

    /// Diagonal including the boundary-face contributions.
    pub fn total_diag(&self, mesh: &FvMesh) -> Vec<f64> {
        let mut d = self.diag.clone();
        let n_internal = mesh.n_internal_faces();
        for (b, bd) in self.boundary_diag.iter().enumerate() {
            d[mesh.owner[n_internal + b]] += bd;
        }
        d
    }

    /// Implicit under-relaxation; the diagonal is first made at least as large
    /// as the sum of the off-diagonal magnitudes.
    pub fn relax(&mut self, mesh: &FvMesh, x: &VolScalarField, alpha: f64) {
        if alpha >= 1.0 || alpha <= 0.0 {
            return;
        }
        let total = self.total_diag(mesh);
        let mut sum_off = vec![0.0; mesh.n_cells()];
        for f in 0..mesh.n_internal_faces() {
            sum_off[mesh.owner[f]] += self.upper[f].abs();
            sum_off[mesh.neighbour[f]] += self.lower[f].abs();
        }
        for i in 0..mesh.n_cells() {
            let d = total[i].abs().max(sum_off[i]) / alpha;
            let delta = d - total[i];
            self.diag[i] += delta;
            self.source[i] += delta * x.internal[i];
        }
    }

    /// Fixes the level of a field that has no fixed-value patch.
    pub fn set_reference(&mut self, cell: usize, value: f64) {
        self.source[cell] += self.diag[cell] * value;
        self.diag[cell] += self.diag[cell];
    }

    /// Constrains the listed cells to the given values.
    pub fn set_values(&mut self, mesh: &FvMesh, cells: &[usize], values: &[f64]) {
        let total = self.total_diag(mesh);
        let n_internal = mesh.n_internal_faces();
        for (&cell, &value) in cells.iter().zip(values) {
            let mut boundary_constant = 0.0;
            for (b, bc) in self.boundary_constant.iter().enumerate() {
                if mesh.owner[n_internal + b] == cell {
                    boundary_constant += bc;
                }
            }
            self.source[cell] = total[cell] * value + boundary_constant;
            for f in 0..n_internal {
                if mesh.owner[f] == cell {
                    self.source[mesh.neighbour[f]] -= self.lower[f] * value;
                } else if mesh.neighbour[f] == cell {
                    self.source[mesh.owner[f]] -= self.upper[f] * value;
                } else {
                    continue;
                }
                self.lower[f] = 0.0;
                self.upper[f] = 0.0;
            }
        }
    }

    /// CSR matrix and right-hand side of the assembled system.
    pub fn assemble(&self, mesh: &FvMesh) -> (SparseMatrix, Vec<f64>) {
        let n_internal = mesh.n_internal_faces();
        let mut triplets = Vec::with_capacity(mesh.n_cells() + 2 * n_internal);
        for (i, d) in self.total_diag(mesh).into_iter().enumerate() {
            triplets.push((i, i, d));
        }
        for f in 0..n_internal {
            let (o, n) = (mesh.owner[f], mesh.neighbour[f]);
            triplets.push((o, n, self.upper[f]));
            triplets.push((n, o, self.lower[f]));
        }
        let mut rhs = self.source.clone();
        for (b, bc) in self.boundary_constant.iter().enumerate() {
            rhs[mesh.owner[n_internal + b]] -= bc;
        }
        (SparseMatrix::from_triplets(mesh.n_cells(), &triplets), rhs)
    }

    /// Row-wise residual `source - Op(x)` (cell-integrated).
    pub fn residual(&self, mesh: &FvMesh, x: &VolScalarField) -> Vec<f64> {
        let (a, b) = self.assemble(mesh);
        let mut ax = vec![0.0; b.len()];
        a.mat_vec_mul(&x.internal, &mut ax);
        b.iter().zip(ax).map(|(b, ax)| b - ax).collect()
    }

    /// Solves in place and re-applies the boundary conditions of `field`.
    pub fn solve(
        &self,
        mesh: &FvMesh,
        field: &mut VolScalarField,
        solver: &LinearSolverEnum,
    ) -> Result<SolverPerformance, LinearSolverError> {
        let (a, b) = self.assemble(mesh);
        let performance = solver.solve(&a, &b, &mut field.internal, &self.field_name)?;
        field.correct_boundary_conditions(mesh);
        info!("{}", performance.summary());
        if !performance.converged {
            warn!(
                "{} did not reach tolerance {:e} for {} in {} iterations",
                performance.solver_name,
                solver.controls().tolerance,
                self.field_name,
                performance.n_iterations
            );
        }
        Ok(performance)
    }

    /// Face fluxes of the operator evaluated with `field`.
    pub fn flux(&self, mesh: &FvMesh, field: &VolScalarField) -> SurfaceScalarField {
        let n_internal = mesh.n_internal_faces();
        let mut values = Vec::with_capacity(mesh.n_faces());
        for f in 0..n_internal {
            values.push(
                self.upper[f] * field.internal[mesh.neighbour[f]]
                    - self.lower[f] * field.internal[mesh.owner[f]],
            );
        }
        for b in 0..self.boundary_diag.len() {
            let f = n_internal + b;
            values.push(
                self.boundary_diag[b] * field.internal[mesh.owner[f]] + self.boundary_constant[b],
            );
        }
        if let Some(correction) = &self.face_flux_correction {
            values.iter_mut().zip(correction).for_each(|(v, c)| *v += c);
        }
        SurfaceScalarField::new(&format!("{}Flux", self.field_name), values)
    }

    fn combine(&mut self, other: &FvMatrix, sign: f64) {
        let add = |a: &mut Vec<f64>, b: &Vec<f64>| a.iter_mut().zip(b).for_each(|(x, y)| *x += sign * y);
        add(&mut self.diag, &other.diag);
        add(&mut self.lower, &other.lower);
        add(&mut self.upper, &other.upper);
        add(&mut self.source, &other.source);
        add(&mut self.boundary_diag, &other.boundary_diag);
        add(&mut self.boundary_constant, &other.boundary_constant);
        if let Some(correction) = &other.face_flux_correction {
            match &mut self.face_flux_correction {
                Some(existing) => add(existing, correction),
                None => {
                    self.face_flux_correction = Some(correction.iter().map(|c| sign * c).collect())
                }
            }
        }
    }
}

impl Neg for FvMatrix {
    type Output = FvMatrix;

    fn neg(mut self) -> FvMatrix {
        let flip = |a: &mut Vec<f64>| a.iter_mut().for_each(|x| *x = -*x);
        flip(&mut self.diag);
        flip(&mut self.lower);
        flip(&mut self.upper);
        flip(&mut self.source);
        flip(&mut self.boundary_diag);
        flip(&mut self.boundary_constant);
        if let Some(correction) = &mut self.face_flux_correction {
            flip(correction);
        }
        self
    }
}

impl AddAssign<&FvMatrix> for FvMatrix {
    fn add_assign(&mut self, other: &FvMatrix) {
        self.combine(other, 1.0);
    }
}

impl SubAssign<&FvMatrix> for FvMatrix {
    fn sub_assign(&mut self, other: &FvMatrix) {
        self.combine(other, -1.0);
    }
}

impl Add for FvMatrix {
    type Output = FvMatrix;

    fn add(mut self, other: FvMatrix) -> FvMatrix {
        self += &other;
        self
    }
}

impl Sub for FvMatrix {
    type Output = FvMatrix;

    fn sub(mut self, other: FvMatrix) -> FvMatrix {
        self -= &other;
        self
    }
}
