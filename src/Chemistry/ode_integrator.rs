//! # Stiff ODE integrators
//!
//! ## Purpose
//! Adaptive integration of an `OdeSystem` over `[x_start, x_end]`, used for the
//! per-cell chemistry sub-step. An integrator is built once from the case
//! settings and shared read-only between cells (and threads); every call
//! allocates its own work arrays.
//!
//! ## Methods
//! - `Rosenbrock23`: the L-stable linearly implicit Rosenbrock pair of order
//!   2(3) (Shampine & Reichelt), one Jacobian and one LU per step, embedded
//!   error estimate `h/6 (k1 - 2 k2 + k3)`.
//! - `BackwardEuler`: Newton-iterated implicit Euler; the error is estimated by
//!   step doubling and the two-half-step solution is kept.
//!
//! ## Step control
//! Scaled error `max_i |err_i| / (abs_tol + rel_tol max(|y_i|, |y_new_i|))`;
//! a step is accepted when it is at most one. The next step is
//! `dx * clamp(0.9 err^(-1/q), 0.2, 5)` with `q` the order of the estimate.
//! `dx_try` carries the suggested step between calls.
use crate::Chemistry::ode_system::OdeSystem;
use crate::Chemistry::state_vector::ChemistryStateVector;
use enum_dispatch::enum_dispatch;
use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SAFETY: f64 = 0.9;
const MIN_SCALE: f64 = 0.2;
const MAX_SCALE: f64 = 5.0;
const MAX_NEWTON_ITER: usize = 8;

#[derive(Debug, Error)]
pub enum OdeError {
    #[error("{solver}: singular iteration matrix at x = {x:e}")]
    SingularMatrix { solver: &'static str, x: f64 },
    #[error("{solver}: step size underflow (dx = {dx:e}) at x = {x:e}")]
    StepSizeUnderflow { solver: &'static str, x: f64, dx: f64 },
    #[error("{solver}: {max_steps} steps taken before reaching x = {x_end:e}")]
    TooManySteps {
        solver: &'static str,
        x_end: f64,
        max_steps: usize,
    },
    #[error("{solver}: non-finite state at x = {x:e}")]
    NonFinite { solver: &'static str, x: f64 },
    #[error("unknown ODE solver '{0}'")]
    UnknownSolver(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OdeSettings {
    pub solver: String,
    pub abs_tol: f64,
    pub rel_tol: f64,
    pub max_steps: usize,
}

impl Default for OdeSettings {
    fn default() -> Self {
        Self {
            solver: "Rosenbrock23".to_string(),
            abs_tol: 1e-10,
            rel_tol: 1e-4,
            max_steps: 10000,
        }
    }
}

#[enum_dispatch]
pub trait OdeIntegrator {
    fn name(&self) -> &'static str;

    fn settings(&self) -> &OdeSettings;

    /// true when the state vector does not match the system size
    fn resize(&self, system: &dyn OdeSystem, y: &ChemistryStateVector) -> bool {
        system.n_eqns() != y.len()
    }

    fn resize_field(&self, system: &dyn OdeSystem, y: &mut ChemistryStateVector) {
        y.resize(system.n_eqns());
    }

    /// Integrates `y` from `x_start` to `x_end`; `dx_try` is the first step on
    /// entry and the suggested next step on return.
    fn solve(
        &self,
        system: &dyn OdeSystem,
        x_start: f64,
        x_end: f64,
        y: &mut [f64],
        dx_try: &mut f64,
    ) -> Result<(), OdeError>;
}

/// One trial step with its error estimate.
trait Stepper {
    const NAME: &'static str;
    /// order of the error estimate
    const ERROR_ORDER: f64;

    fn settings(&self) -> &OdeSettings;

    fn attempt(
        &self,
        system: &dyn OdeSystem,
        x: f64,
        y: &[f64],
        dx: f64,
        y_new: &mut [f64],
        err: &mut [f64],
    ) -> Result<(), OdeError>;
}

fn error_norm(settings: &OdeSettings, y: &[f64], y_new: &[f64], err: &[f64]) -> f64 {
    y.iter()
        .zip(y_new)
        .zip(err)
        .map(|((y0, y1), e)| e.abs() / (settings.abs_tol + settings.rel_tol * y0.abs().max(y1.abs())))
        .fold(0.0, f64::max)
}

fn integrate<S: Stepper>(
    stepper: &S,
    system: &dyn OdeSystem,
    x_start: f64,
    x_end: f64,
    y: &mut [f64],
    dx_try: &mut f64,
) -> Result<(), OdeError> {
    if x_end <= x_start {
        return Ok(());
    }
    let settings = stepper.settings();
    let span = x_end - x_start;
    let mut dx = if *dx_try > 0.0 { dx_try.min(span) } else { span };
    let mut x = x_start;
    let mut y_new = vec![0.0; y.len()];
    let mut err = vec![0.0; y.len()];

    for _ in 0..settings.max_steps {
        let last = x + dx >= x_end;
        let dx_step = if last { x_end - x } else { dx };
        stepper.attempt(system, x, y, dx_step, &mut y_new, &mut err)?;
        let e = error_norm(settings, y, &y_new, &err);

        if e <= 1.0 {
            if y_new.iter().any(|v| !v.is_finite()) {
                return Err(OdeError::NonFinite { solver: S::NAME, x });
            }
            y.copy_from_slice(&y_new);
            let scale = if e == 0.0 {
                MAX_SCALE
            } else {
                (SAFETY * e.powf(-1.0 / S::ERROR_ORDER)).clamp(MIN_SCALE, MAX_SCALE)
            };
            if last {
                *dx_try = dx.max(dx_step * scale);
                return Ok(());
            }
            x += dx_step;
            dx = dx_step * scale;
        } else {
            let scale = if e.is_finite() {
                (SAFETY * e.powf(-1.0 / S::ERROR_ORDER)).clamp(MIN_SCALE, 1.0)
            } else {
                MIN_SCALE
            };
            dx = dx_step * scale;
            debug!("{}: step rejected at x = {:e}, error {:e}, new dx {:e}", S::NAME, x, e, dx);
            if dx <= f64::EPSILON * x_end.abs().max(span) {
                return Err(OdeError::StepSizeUnderflow {
                    solver: S::NAME,
                    x,
                    dx,
                });
            }
        }
    }
    Err(OdeError::TooManySteps {
        solver: S::NAME,
        x_end,
        max_steps: settings.max_steps,
    })
}

fn iteration_matrix(
    system: &dyn OdeSystem,
    x: f64,
    y: &[f64],
    gamma: f64,
) -> nalgebra::LU<f64, nalgebra::Dyn, nalgebra::Dyn> {
    let n = y.len();
    let mut jacobian = DMatrix::zeros(n, n);
    system.jacobian(x, y, &mut jacobian);
    (DMatrix::identity(n, n) - jacobian * gamma).lu()
}

/// Rosenbrock method of order 2 with an embedded third-order error estimate.
#[derive(Debug, Clone)]
pub struct Rosenbrock23 {
    pub settings: OdeSettings,
}

impl Stepper for Rosenbrock23 {
    const NAME: &'static str = "Rosenbrock23";
    const ERROR_ORDER: f64 = 3.0;

    fn settings(&self) -> &OdeSettings {
        &self.settings
    }

    fn attempt(
        &self,
        system: &dyn OdeSystem,
        x: f64,
        y: &[f64],
        dx: f64,
        y_new: &mut [f64],
        err: &mut [f64],
    ) -> Result<(), OdeError> {
        let n = y.len();
        let d = 1.0 / (2.0 + std::f64::consts::SQRT_2);
        let e32 = 6.0 + std::f64::consts::SQRT_2;
        let singular = OdeError::SingularMatrix { solver: Self::NAME, x };

        let lu = iteration_matrix(system, x, y, dx * d);
        let y0 = DVector::from_column_slice(y);

        let mut f0 = DVector::zeros(n);
        system.derivatives(x, y, f0.as_mut_slice());
        let k1 = lu.solve(&f0).ok_or(singular)?;

        let y_mid = &y0 + &k1 * (0.5 * dx);
        let mut f1 = DVector::zeros(n);
        system.derivatives(x + 0.5 * dx, y_mid.as_slice(), f1.as_mut_slice());
        let k2 = lu
            .solve(&(&f1 - &k1))
            .ok_or(OdeError::SingularMatrix { solver: Self::NAME, x })?
            + &k1;

        let y1 = &y0 + &k2 * dx;
        let mut f2 = DVector::zeros(n);
        system.derivatives(x + dx, y1.as_slice(), f2.as_mut_slice());
        let rhs3 = &f2 - (&k2 - &f1) * e32 - (&k1 - &f0) * 2.0;
        let k3 = lu
            .solve(&rhs3)
            .ok_or(OdeError::SingularMatrix { solver: Self::NAME, x })?;

        y_new.copy_from_slice(y1.as_slice());
        let e = (&k1 - &k2 * 2.0 + &k3) * (dx / 6.0);
        err.copy_from_slice(e.as_slice());
        Ok(())
    }
}

impl OdeIntegrator for Rosenbrock23 {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn settings(&self) -> &OdeSettings {
        &self.settings
    }

    fn solve(
        &self,
        system: &dyn OdeSystem,
        x_start: f64,
        x_end: f64,
        y: &mut [f64],
        dx_try: &mut f64,
    ) -> Result<(), OdeError> {
        integrate(self, system, x_start, x_end, y, dx_try)
    }
}

/// Implicit Euler with Newton iterations and step doubling.
#[derive(Debug, Clone)]
pub struct BackwardEuler {
    pub settings: OdeSettings,
}

impl BackwardEuler {
    /// Newton solution of `z = y0 + h f(z)`; `None` if the iteration stalls.
    fn implicit_step(
        &self,
        system: &dyn OdeSystem,
        x: f64,
        y0: &[f64],
        h: f64,
    ) -> Result<Option<Vec<f64>>, OdeError> {
        let n = y0.len();
        let lu = iteration_matrix(system, x, y0, h);
        let mut z = y0.to_vec();
        let mut f = vec![0.0; n];
        for _ in 0..MAX_NEWTON_ITER {
            system.derivatives(x + h, &z, &mut f);
            let residual = DVector::from_iterator(n, (0..n).map(|i| y0[i] + h * f[i] - z[i]));
            let delta = lu
                .solve(&residual)
                .ok_or(OdeError::SingularMatrix { solver: Self::NAME, x })?;
            let mut converged = true;
            for i in 0..n {
                z[i] += delta[i];
                let scale = self.settings.abs_tol + self.settings.rel_tol * z[i].abs();
                if delta[i].abs() > 0.1 * scale {
                    converged = false;
                }
            }
            if converged {
                return Ok(Some(z));
            }
        }
        Ok(None)
    }
}

impl Stepper for BackwardEuler {
    const NAME: &'static str = "BackwardEuler";
    const ERROR_ORDER: f64 = 2.0;

    fn settings(&self) -> &OdeSettings {
        &self.settings
    }

    fn attempt(
        &self,
        system: &dyn OdeSystem,
        x: f64,
        y: &[f64],
        dx: f64,
        y_new: &mut [f64],
        err: &mut [f64],
    ) -> Result<(), OdeError> {
        let full = self.implicit_step(system, x, y, dx)?;
        let half = match self.implicit_step(system, x, y, 0.5 * dx)? {
            Some(h) => self.implicit_step(system, x + 0.5 * dx, &h, 0.5 * dx)?,
            None => None,
        };
        match (full, half) {
            (Some(full), Some(two_halves)) => {
                for i in 0..y.len() {
                    y_new[i] = two_halves[i];
                    err[i] = two_halves[i] - full[i];
                }
            }
            _ => {
                y_new.copy_from_slice(y);
                err.iter_mut().for_each(|e| *e = f64::INFINITY);
            }
        }
        Ok(())
    }
}

impl OdeIntegrator for BackwardEuler {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn settings(&self) -> &OdeSettings {
        &self.settings
    }

    fn solve(
        &self,
        system: &dyn OdeSystem,
        x_start: f64,
        x_end: f64,
        y: &mut [f64],
        dx_try: &mut f64,
    ) -> Result<(), OdeError> {
        integrate(self, system, x_start, x_end, y, dx_try)
    }
}

#[derive(Debug, Clone)]
#[enum_dispatch(OdeIntegrator)]
pub enum OdeIntegratorEnum {
    Rosenbrock23(Rosenbrock23),
    BackwardEuler(BackwardEuler),
}

pub fn create_ode_integrator(settings: &OdeSettings) -> Result<OdeIntegratorEnum, OdeError> {
    let settings = settings.clone();
    match settings.solver.as_str() {
        "Rosenbrock23" | "ode23s" => Ok(OdeIntegratorEnum::Rosenbrock23(Rosenbrock23 { settings })),
        "BackwardEuler" | "EulerImplicit" => {
            Ok(OdeIntegratorEnum::BackwardEuler(BackwardEuler { settings }))
        }
        other => Err(OdeError::UnknownSolver(other.to_string())),
    }
}
