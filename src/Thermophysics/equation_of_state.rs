use crate::Thermophysics::reaction_thermo::ThermoError;
use crate::Thermophysics::species::R_UNIVERSAL;
use enum_dispatch::enum_dispatch;

#[enum_dispatch]
pub trait EquationOfState {
    fn name(&self) -> &'static str;
    /// density, kg/m^3
    fn rho(&self, p: f64, t: f64, molar_mass: f64) -> f64;
    /// compressibility `d rho / d p` at constant temperature, s^2/m^2
    fn psi(&self, p: f64, t: f64, molar_mass: f64) -> f64;
}

/// `rho = p W / (R T)`
#[derive(Debug, Clone, PartialEq)]
pub struct PerfectGas;

impl EquationOfState for PerfectGas {
    fn name(&self) -> &'static str {
        "perfectGas"
    }

    fn rho(&self, p: f64, t: f64, molar_mass: f64) -> f64 {
        p * molar_mass / (R_UNIVERSAL * t)
    }

    fn psi(&self, _p: f64, t: f64, molar_mass: f64) -> f64 {
        molar_mass / (R_UNIVERSAL * t)
    }
}

/// Density evaluated at the fixed reference pressure; insensitive to the
/// pressure field.
#[derive(Debug, Clone, PartialEq)]
pub struct IncompressiblePerfectGas {
    pub p_ref: f64,
}

impl EquationOfState for IncompressiblePerfectGas {
    fn name(&self) -> &'static str {
        "incompressiblePerfectGas"
    }

    fn rho(&self, _p: f64, t: f64, molar_mass: f64) -> f64 {
        self.p_ref * molar_mass / (R_UNIVERSAL * t)
    }

    fn psi(&self, _p: f64, _t: f64, _molar_mass: f64) -> f64 {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
#[enum_dispatch(EquationOfState)]
pub enum EquationOfStateEnum {
    PerfectGas(PerfectGas),
    IncompressiblePerfectGas(IncompressiblePerfectGas),
}

pub fn create_equation_of_state(name: &str, p_ref: f64) -> Result<EquationOfStateEnum, ThermoError> {
    match name {
        "perfectGas" => Ok(EquationOfStateEnum::PerfectGas(PerfectGas)),
        "incompressiblePerfectGas" => Ok(EquationOfStateEnum::IncompressiblePerfectGas(
            IncompressiblePerfectGas { p_ref },
        )),
        other => Err(ThermoError::UnknownModel {
            kind: "equation of state",
            name: other.to_string(),
        }),
    }
}
