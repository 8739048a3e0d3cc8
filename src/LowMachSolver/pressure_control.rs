use crate::FiniteVolume::fields::VolScalarField;
use crate::settings::ConfigError;
use log::info;

/// Bounds on the absolute pressure `p_ref + pPrime`, applied to the
/// perturbation after each consistent pressure corrector.
#[derive(Debug, Clone, PartialEq)]
pub struct PressureControl {
    pub p_ref: f64,
    /// perturbation bounds, `p_min - p_ref` and `p_max - p_ref`
    lower: Option<f64>,
    upper: Option<f64>,
}

impl PressureControl {
    pub fn new(p_ref: f64, p_min: Option<f64>, p_max: Option<f64>) -> Result<Self, ConfigError> {
        if let (Some(lo), Some(hi)) = (p_min, p_max) {
            if lo >= hi {
                return Err(ConfigError::Invalid(format!(
                    "p_min = {} must be below p_max = {}",
                    lo, hi
                )));
            }
        }
        Ok(Self {
            p_ref,
            lower: p_min.map(|p| p - p_ref),
            upper: p_max.map(|p| p - p_ref),
        })
    }

    pub fn is_active(&self) -> bool {
        self.lower.is_some() || self.upper.is_some()
    }

    /// Clamps the cell values of `p_prime`; true if any value changed.
    /// Boundary values are left to the caller.
    pub fn limit(&self, p_prime: &mut VolScalarField) -> bool {
        let (lo, hi) = (
            self.lower.unwrap_or(f64::NEG_INFINITY),
            self.upper.unwrap_or(f64::INFINITY),
        );
        let mut n_limited = 0;
        for x in p_prime.internal.iter_mut() {
            let clamped = x.clamp(lo, hi);
            if clamped != *x {
                *x = clamped;
                n_limited += 1;
            }
        }
        if n_limited > 0 {
            info!(
                "pressure limited in {} cells to [{}, {}] Pa",
                n_limited,
                lo + self.p_ref,
                hi + self.p_ref
            );
        }
        n_limited > 0
    }
}
