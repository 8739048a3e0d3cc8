//! # Sparse linear solvers
//!
//! ## Purpose
//! Solves the algebraic systems produced by `FvMatrix` assembly. The matrix is
//! stored in compressed sparse row form; solvers are selected by name from the
//! case settings and shared read-only between solves.
//!
//! ## Main Structures
//! - `SparseMatrix`: CSR storage built from (row, col, value) triplets.
//! - `SolverControls`: solver name, absolute/relative tolerance, iteration limits.
//! - `SolverPerformance`: initial/final normalised residual and iteration count.
//! - `LinearSolver` trait with the `LinearSolverEnum` family:
//!   `PCG` (Jacobi-preconditioned conjugate gradients, symmetric systems),
//!   `PBiCGStab` (Jacobi-preconditioned BiCGStab, asymmetric systems),
//!   `GaussSeidel` (plain sweeps).
//!
//! ## Key Features
//! Residuals are normalised the way segregated CFD codes do it:
//! `sum|b - Ax| / (sum|Ax - A x_avg| + sum|b - A x_avg| + SMALL)`, so the
//! reported numbers are comparable across fields and mesh sizes. Failing to
//! reach the tolerance within `max_iter` is reported in the performance record,
//! not as an error; only numerical breakdown and non-finite residuals are errors.
use enum_dispatch::enum_dispatch;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SMALL: f64 = 1e-20;

#[derive(Debug, Error)]
pub enum LinearSolverError {
    #[error("{solver}: breakdown at iteration {iteration} while solving for {field}")]
    Breakdown {
        solver: String,
        field: String,
        iteration: usize,
    },
    #[error("{solver}: non-finite residual while solving for {field}")]
    NonFinite { solver: String, field: String },
    #[error("dimension mismatch: matrix has {rows} rows, vector has {len} entries")]
    DimensionMismatch { rows: usize, len: usize },
    #[error("unknown linear solver '{0}'")]
    UnknownSolver(String),
}

/// Compressed sparse row matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    pub n_rows: usize,
    pub row_offsets: Vec<usize>,
    pub col_indices: Vec<usize>,
    pub values: Vec<f64>,
}

impl SparseMatrix {
    /// Builds the matrix from triplets; duplicate entries are summed.
    pub fn from_triplets(n_rows: usize, triplets: &[(usize, usize, f64)]) -> Self {
        let mut sorted = triplets.to_vec();
        sorted.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let mut row_offsets = vec![0; n_rows + 1];
        let mut col_indices: Vec<usize> = Vec::with_capacity(sorted.len());
        let mut values: Vec<f64> = Vec::with_capacity(sorted.len());
        let mut last: Option<(usize, usize)> = None;
        for (r, c, v) in sorted {
            if last == Some((r, c)) {
                if let Some(back) = values.last_mut() {
                    *back += v;
                }
                continue;
            }
            col_indices.push(c);
            values.push(v);
            row_offsets[r + 1] += 1;
            last = Some((r, c));
        }
        for i in 0..n_rows {
            row_offsets[i + 1] += row_offsets[i];
        }
        Self {
            n_rows,
            row_offsets,
            col_indices,
            values,
        }
    }

    pub fn mat_vec_mul(&self, x: &[f64], y: &mut [f64]) {
        for (i, yi) in y.iter_mut().enumerate().take(self.n_rows) {
            let mut sum = 0.0;
            for k in self.row_offsets[i]..self.row_offsets[i + 1] {
                sum += self.values[k] * x[self.col_indices[k]];
            }
            *yi = sum;
        }
    }

    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.n_rows)
            .map(|i| {
                (self.row_offsets[i]..self.row_offsets[i + 1])
                    .filter(|&k| self.col_indices[k] == i)
                    .map(|k| self.values[k])
                    .sum()
            })
            .collect()
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.n_rows, self.n_rows);
        for i in 0..self.n_rows {
            for k in self.row_offsets[i]..self.row_offsets[i + 1] {
                dense[(i, self.col_indices[k])] += self.values[k];
            }
        }
        dense
    }

    fn residual(&self, x: &[f64], b: &[f64], r: &mut [f64]) {
        self.mat_vec_mul(x, r);
        for (ri, bi) in r.iter_mut().zip(b) {
            *ri = bi - *ri;
        }
    }

    /// Normalisation factor of the residual.
    fn norm_factor(&self, x: &[f64], b: &[f64], ax: &[f64]) -> f64 {
        let x_avg = x.iter().sum::<f64>() / x.len().max(1) as f64;
        let x_ref = vec![x_avg; x.len()];
        let mut a_ref = vec![0.0; x.len()];
        self.mat_vec_mul(&x_ref, &mut a_ref);
        ax.iter()
            .zip(&a_ref)
            .zip(b)
            .map(|((ax, ar), b)| (ax - ar).abs() + (b - ar).abs())
            .sum::<f64>()
            + SMALL
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SolverControls {
    pub solver: String,
    pub tolerance: f64,
    pub rel_tol: f64,
    pub max_iter: usize,
    pub min_iter: usize,
}

impl Default for SolverControls {
    fn default() -> Self {
        Self {
            solver: "PBiCGStab".to_string(),
            tolerance: 1e-8,
            rel_tol: 0.0,
            max_iter: 1000,
            min_iter: 0,
        }
    }
}

impl SolverControls {
    fn converged(&self, final_residual: f64, initial_residual: f64, iterations: usize) -> bool {
        iterations >= self.min_iter
            && (final_residual < self.tolerance
                || (self.rel_tol > 0.0 && final_residual < self.rel_tol * initial_residual))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverPerformance {
    pub solver_name: String,
    pub field_name: String,
    pub initial_residual: f64,
    pub final_residual: f64,
    pub n_iterations: usize,
    pub converged: bool,
}

impl SolverPerformance {
    /// One-line report in the customary segregated-solver format.
    pub fn summary(&self) -> String {
        format!(
            "{}:  Solving for {}, Initial residual = {:e}, Final residual = {:e}, No Iterations {}",
            self.solver_name,
            self.field_name,
            self.initial_residual,
            self.final_residual,
            self.n_iterations
        )
    }
}

#[enum_dispatch]
pub trait LinearSolver {
    fn name(&self) -> &'static str;
    fn controls(&self) -> &SolverControls;
    fn solve(
        &self,
        a: &SparseMatrix,
        b: &[f64],
        x: &mut [f64],
        field_name: &str,
    ) -> Result<SolverPerformance, LinearSolverError>;
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn sum_mag(a: &[f64]) -> f64 {
    a.iter().map(|x| x.abs()).sum()
}

fn check_dimensions(a: &SparseMatrix, b: &[f64], x: &[f64]) -> Result<(), LinearSolverError> {
    for len in [b.len(), x.len()] {
        if len != a.n_rows {
            return Err(LinearSolverError::DimensionMismatch {
                rows: a.n_rows,
                len,
            });
        }
    }
    Ok(())
}

/// Residual bookkeeping shared by all solvers.
struct ResidualMonitor<'a> {
    solver: &'static str,
    field: &'a str,
    norm: f64,
}

impl ResidualMonitor<'_> {
    fn normalised(&self, r: &[f64]) -> Result<f64, LinearSolverError> {
        let value = sum_mag(r) / self.norm;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(LinearSolverError::NonFinite {
                solver: self.solver.to_string(),
                field: self.field.to_string(),
            })
        }
    }

    fn breakdown(&self, iteration: usize) -> LinearSolverError {
        LinearSolverError::Breakdown {
            solver: self.solver.to_string(),
            field: self.field.to_string(),
            iteration,
        }
    }

    fn performance(&self, initial: f64, final_residual: f64, n: usize, converged: bool) -> SolverPerformance {
        SolverPerformance {
            solver_name: self.solver.to_string(),
            field_name: self.field.to_string(),
            initial_residual: initial,
            final_residual,
            n_iterations: n,
            converged,
        }
    }
}

/// Initial residual vector and its monitor.
fn start<'a>(
    solver: &'static str,
    field: &'a str,
    a: &SparseMatrix,
    b: &[f64],
    x: &[f64],
) -> (Vec<f64>, ResidualMonitor<'a>) {
    let mut ax = vec![0.0; x.len()];
    a.mat_vec_mul(x, &mut ax);
    let norm = a.norm_factor(x, b, &ax);
    let r = b.iter().zip(&ax).map(|(b, ax)| b - ax).collect();
    (r, ResidualMonitor { solver, field, norm })
}

fn inverse_diagonal(a: &SparseMatrix) -> Vec<f64> {
    a.diagonal()
        .into_iter()
        .map(|d| if d.abs() > SMALL { 1.0 / d } else { 1.0 })
        .collect()
}

/// Conjugate gradients with diagonal preconditioning.
#[derive(Debug, Clone)]
pub struct Pcg {
    pub controls: SolverControls,
}

impl LinearSolver for Pcg {
    fn name(&self) -> &'static str {
        "PCG"
    }

    fn controls(&self) -> &SolverControls {
        &self.controls
    }

    fn solve(
        &self,
        a: &SparseMatrix,
        b: &[f64],
        x: &mut [f64],
        field_name: &str,
    ) -> Result<SolverPerformance, LinearSolverError> {
        check_dimensions(a, b, x)?;
        let (mut r, monitor) = start(self.name(), field_name, a, b, x);
        let initial = monitor.normalised(&r)?;
        let mut final_residual = initial;
        if self.controls.converged(initial, initial, 0) {
            return Ok(monitor.performance(initial, initial, 0, true));
        }

        let inv_d = inverse_diagonal(a);
        let mut z: Vec<f64> = r.iter().zip(&inv_d).map(|(r, d)| r * d).collect();
        let mut p = z.clone();
        let mut q = vec![0.0; x.len()];
        let mut rz = dot(&r, &z);

        for iter in 1..=self.controls.max_iter {
            a.mat_vec_mul(&p, &mut q);
            let pq = dot(&p, &q);
            if pq.abs() < SMALL * SMALL {
                return Err(monitor.breakdown(iter));
            }
            let alpha = rz / pq;
            for i in 0..x.len() {
                x[i] += alpha * p[i];
                r[i] -= alpha * q[i];
            }
            final_residual = monitor.normalised(&r)?;
            if self.controls.converged(final_residual, initial, iter) {
                return Ok(monitor.performance(initial, final_residual, iter, true));
            }
            for i in 0..x.len() {
                z[i] = r[i] * inv_d[i];
            }
            let rz_new = dot(&r, &z);
            let beta = rz_new / rz;
            rz = rz_new;
            for i in 0..x.len() {
                p[i] = z[i] + beta * p[i];
            }
        }
        Ok(monitor.performance(initial, final_residual, self.controls.max_iter, false))
    }
}

/// Stabilised bi-conjugate gradients with diagonal preconditioning.
#[derive(Debug, Clone)]
pub struct BiCgStab {
    pub controls: SolverControls,
}

impl LinearSolver for BiCgStab {
    fn name(&self) -> &'static str {
        "PBiCGStab"
    }

    fn controls(&self) -> &SolverControls {
        &self.controls
    }

    fn solve(
        &self,
        a: &SparseMatrix,
        b: &[f64],
        x: &mut [f64],
        field_name: &str,
    ) -> Result<SolverPerformance, LinearSolverError> {
        check_dimensions(a, b, x)?;
        let (mut r, monitor) = start(self.name(), field_name, a, b, x);
        let initial = monitor.normalised(&r)?;
        let mut final_residual = initial;
        if self.controls.converged(initial, initial, 0) {
            return Ok(monitor.performance(initial, initial, 0, true));
        }

        let n = x.len();
        let inv_d = inverse_diagonal(a);
        let r0 = r.clone();
        let mut p = vec![0.0; n];
        let mut v = vec![0.0; n];
        let mut y = vec![0.0; n];
        let mut s = vec![0.0; n];
        let mut z = vec![0.0; n];
        let mut t = vec![0.0; n];
        let (mut rho_old, mut alpha, mut omega) = (1.0, 1.0, 1.0);

        for iter in 1..=self.controls.max_iter {
            let rho = dot(&r0, &r);
            if rho.abs() < SMALL * SMALL {
                return Err(monitor.breakdown(iter));
            }
            let beta = (rho / rho_old) * (alpha / omega);
            for i in 0..n {
                p[i] = r[i] + beta * (p[i] - omega * v[i]);
                y[i] = p[i] * inv_d[i];
            }
            a.mat_vec_mul(&y, &mut v);
            let r0v = dot(&r0, &v);
            if r0v.abs() < SMALL * SMALL {
                return Err(monitor.breakdown(iter));
            }
            alpha = rho / r0v;
            for i in 0..n {
                s[i] = r[i] - alpha * v[i];
            }
            let s_residual = monitor.normalised(&s)?;
            if self.controls.converged(s_residual, initial, iter) {
                for i in 0..n {
                    x[i] += alpha * y[i];
                }
                return Ok(monitor.performance(initial, s_residual, iter, true));
            }
            for i in 0..n {
                z[i] = s[i] * inv_d[i];
            }
            a.mat_vec_mul(&z, &mut t);
            let tt = dot(&t, &t);
            if tt.abs() < SMALL * SMALL {
                return Err(monitor.breakdown(iter));
            }
            omega = dot(&t, &s) / tt;
            for i in 0..n {
                x[i] += alpha * y[i] + omega * z[i];
                r[i] = s[i] - omega * t[i];
            }
            final_residual = monitor.normalised(&r)?;
            if self.controls.converged(final_residual, initial, iter) {
                return Ok(monitor.performance(initial, final_residual, iter, true));
            }
            rho_old = rho;
        }
        Ok(monitor.performance(initial, final_residual, self.controls.max_iter, false))
    }
}

#[derive(Debug, Clone)]
pub struct GaussSeidel {
    pub controls: SolverControls,
}

impl LinearSolver for GaussSeidel {
    fn name(&self) -> &'static str {
        "GaussSeidel"
    }

    fn controls(&self) -> &SolverControls {
        &self.controls
    }

    fn solve(
        &self,
        a: &SparseMatrix,
        b: &[f64],
        x: &mut [f64],
        field_name: &str,
    ) -> Result<SolverPerformance, LinearSolverError> {
        check_dimensions(a, b, x)?;
        let (mut r, monitor) = start(self.name(), field_name, a, b, x);
        let initial = monitor.normalised(&r)?;
        let mut final_residual = initial;
        if self.controls.converged(initial, initial, 0) {
            return Ok(monitor.performance(initial, initial, 0, true));
        }
        for iter in 1..=self.controls.max_iter {
            for i in 0..a.n_rows {
                let mut diag = 0.0;
                let mut sum = b[i];
                for k in a.row_offsets[i]..a.row_offsets[i + 1] {
                    let j = a.col_indices[k];
                    if j == i {
                        diag += a.values[k];
                    } else {
                        sum -= a.values[k] * x[j];
                    }
                }
                if diag.abs() < SMALL {
                    return Err(monitor.breakdown(iter));
                }
                x[i] = sum / diag;
            }
            a.residual(x, b, &mut r);
            final_residual = monitor.normalised(&r)?;
            if self.controls.converged(final_residual, initial, iter) {
                return Ok(monitor.performance(initial, final_residual, iter, true));
            }
        }
        Ok(monitor.performance(initial, final_residual, self.controls.max_iter, false))
    }
}

#[derive(Debug, Clone)]
#[enum_dispatch(LinearSolver)]
pub enum LinearSolverEnum {
    PCG(Pcg),
    PBiCGStab(BiCgStab),
    GaussSeidel(GaussSeidel),
}

pub fn create_linear_solver(controls: &SolverControls) -> Result<LinearSolverEnum, LinearSolverError> {
    let controls = controls.clone();
    match controls.solver.as_str() {
        "PCG" | "CG" => Ok(LinearSolverEnum::PCG(Pcg { controls })),
        "PBiCGStab" | "BiCGStab" => Ok(LinearSolverEnum::PBiCGStab(BiCgStab { controls })),
        "GaussSeidel" | "smoothSolver" => Ok(LinearSolverEnum::GaussSeidel(GaussSeidel { controls })),
        other => Err(LinearSolverError::UnknownSolver(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DVector;

    /// symmetric positive definite 1-D Poisson matrix
    fn poisson(n: usize) -> SparseMatrix {
        let mut triplets = Vec::new();
        for i in 0..n {
            triplets.push((i, i, 2.0));
            if i > 0 {
                triplets.push((i, i - 1, -1.0));
            }
            if i + 1 < n {
                triplets.push((i, i + 1, -1.0));
            }
        }
        SparseMatrix::from_triplets(n, &triplets)
    }

    fn convection_diffusion(n: usize) -> SparseMatrix {
        let mut triplets = Vec::new();
        for i in 0..n {
            triplets.push((i, i, 3.0));
            if i > 0 {
                triplets.push((i, i - 1, -1.8));
            }
            if i + 1 < n {
                triplets.push((i, i + 1, -0.2));
            }
        }
        SparseMatrix::from_triplets(n, &triplets)
    }

    fn dense_solution(a: &SparseMatrix, b: &[f64]) -> DVector<f64> {
        a.to_dense()
            .lu()
            .solve(&DVector::from_column_slice(b))
            .unwrap()
    }

    fn controls(solver: &str) -> SolverControls {
        SolverControls {
            solver: solver.to_string(),
            tolerance: 1e-12,
            rel_tol: 0.0,
            max_iter: 5000,
            min_iter: 0,
        }
    }

    #[test]
    fn triplets_are_merged() {
        let m = SparseMatrix::from_triplets(2, &[(0, 0, 1.0), (1, 0, 2.0), (0, 0, 3.0), (1, 1, 1.0)]);
        assert_eq!(m.row_offsets, vec![0, 1, 3]);
        assert_eq!(m.values, vec![4.0, 2.0, 1.0]);
        assert_eq!(m.diagonal(), vec![4.0, 1.0]);
    }

    #[test]
    fn pcg_matches_dense_lu() {
        let a = poisson(20);
        let b: Vec<f64> = (0..20).map(|i| (i as f64).sin()).collect();
        let exact = dense_solution(&a, &b);
        let solver = create_linear_solver(&controls("PCG")).unwrap();
        let mut x = vec![0.0; 20];
        let perf = solver.solve(&a, &b, &mut x, "p").unwrap();
        assert!(perf.converged);
        assert!(perf.n_iterations <= 40);
        for i in 0..20 {
            assert_relative_eq!(x[i], exact[i], epsilon = 1e-8);
        }
    }

    #[test]
    fn bicgstab_and_gauss_seidel_match_dense_lu() {
        let a = convection_diffusion(15);
        let b: Vec<f64> = (0..15).map(|i| 1.0 + i as f64).collect();
        let exact = dense_solution(&a, &b);
        for name in ["PBiCGStab", "GaussSeidel"] {
            let solver = create_linear_solver(&controls(name)).unwrap();
            let mut x = vec![0.0; 15];
            let perf = solver.solve(&a, &b, &mut x, "h").unwrap();
            assert!(perf.converged, "{} did not converge", name);
            for i in 0..15 {
                assert_relative_eq!(x[i], exact[i], epsilon = 1e-7, max_relative = 1e-7);
            }
        }
    }

    #[test]
    fn converged_start_takes_no_iterations() {
        let a = poisson(4);
        let x_exact = [1.0, 2.0, 3.0, 4.0];
        let mut b = vec![0.0; 4];
        a.mat_vec_mul(&x_exact, &mut b);
        let solver = create_linear_solver(&controls("PCG")).unwrap();
        let mut x = x_exact.to_vec();
        let perf = solver.solve(&a, &b, &mut x, "p").unwrap();
        assert_eq!(perf.n_iterations, 0);
        assert!(perf.summary().starts_with("PCG:  Solving for p"));
    }

    #[test]
    fn unknown_solver_and_dimension_errors() {
        assert!(matches!(
            create_linear_solver(&controls("amg")),
            Err(LinearSolverError::UnknownSolver(_))
        ));
        let solver = create_linear_solver(&controls("GaussSeidel")).unwrap();
        let mut x = vec![0.0; 3];
        let result = solver.solve(&poisson(4), &[1.0; 4], &mut x, "p");
        assert!(matches!(result, Err(LinearSolverError::DimensionMismatch { .. })));
    }
}
