//! Turbulence closures providing the effective viscosity of the momentum
//! predictor and the effective thermal diffusivity of the energy and species
//! equations.
use crate::FiniteVolume::fields::VolScalarField;
use crate::FiniteVolume::mesh::FvMesh;
use crate::Thermophysics::reaction_thermo::ReactionThermo;
use crate::settings::ConfigError;
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TurbulenceSettings {
    pub model: String,
    /// kinematic eddy viscosity, m^2/s
    pub nu_t: f64,
    /// turbulent Prandtl number
    pub pr_t: f64,
}

impl Default for TurbulenceSettings {
    fn default() -> Self {
        Self {
            model: "laminar".to_string(),
            nu_t: 0.0,
            pr_t: 0.85,
        }
    }
}

#[enum_dispatch]
pub trait TurbulenceModel {
    fn name(&self) -> &'static str;

    /// Updates the model after the flow has been advanced.
    fn correct(&mut self, mesh: &FvMesh, rho: &VolScalarField);

    fn mu_eff(&self, mesh: &FvMesh, thermo: &ReactionThermo) -> VolScalarField;

    fn alpha_eff(&self, mesh: &FvMesh, thermo: &ReactionThermo) -> VolScalarField;
}

#[derive(Debug, Clone, Default)]
pub struct Laminar;

impl TurbulenceModel for Laminar {
    fn name(&self) -> &'static str {
        "laminar"
    }

    fn correct(&mut self, _mesh: &FvMesh, _rho: &VolScalarField) {}

    fn mu_eff(&self, _mesh: &FvMesh, thermo: &ReactionThermo) -> VolScalarField {
        let mut mu = thermo.mu.clone();
        mu.name = "muEff".to_string();
        mu
    }

    fn alpha_eff(&self, _mesh: &FvMesh, thermo: &ReactionThermo) -> VolScalarField {
        let mut alpha = thermo.alpha.clone();
        alpha.name = "alphaEff".to_string();
        alpha
    }
}

/// `mu_t = rho nu_t`, `alpha_t = mu_t / Pr_t`.
#[derive(Debug, Clone)]
pub struct ConstantEddyViscosity {
    pub nu_t: f64,
    pub pr_t: f64,
    mu_t: Option<VolScalarField>,
}

impl ConstantEddyViscosity {
    pub fn new(nu_t: f64, pr_t: f64) -> Self {
        Self {
            nu_t,
            pr_t,
            mu_t: None,
        }
    }

    fn add_scaled(&self, base: &VolScalarField, name: &str, scale: f64) -> VolScalarField {
        let mut out = base.clone();
        out.name = name.to_string();
        if let Some(mu_t) = &self.mu_t {
            out.internal
                .iter_mut()
                .zip(&mu_t.internal)
                .for_each(|(x, m)| *x += scale * m);
            for (pf, mpf) in out.boundary.iter_mut().zip(&mu_t.boundary) {
                pf.values
                    .iter_mut()
                    .zip(&mpf.values)
                    .for_each(|(x, m)| *x += scale * m);
            }
        }
        out
    }
}

impl TurbulenceModel for ConstantEddyViscosity {
    fn name(&self) -> &'static str {
        "constantEddyViscosity"
    }

    fn correct(&mut self, mesh: &FvMesh, rho: &VolScalarField) {
        let nu_t = VolScalarField::calculated("nut", mesh, self.nu_t);
        self.mu_t = Some(rho.scaled_by("mut", &nu_t));
    }

    fn mu_eff(&self, _mesh: &FvMesh, thermo: &ReactionThermo) -> VolScalarField {
        self.add_scaled(&thermo.mu, "muEff", 1.0)
    }

    fn alpha_eff(&self, _mesh: &FvMesh, thermo: &ReactionThermo) -> VolScalarField {
        self.add_scaled(&thermo.alpha, "alphaEff", 1.0 / self.pr_t)
    }
}

#[enum_dispatch(TurbulenceModel)]
#[derive(Debug, Clone)]
pub enum TurbulenceModelEnum {
    Laminar(Laminar),
    ConstantEddyViscosity(ConstantEddyViscosity),
}

pub fn create_turbulence_model(
    settings: &TurbulenceSettings,
) -> Result<TurbulenceModelEnum, ConfigError> {
    match settings.model.as_str() {
        "laminar" => Ok(TurbulenceModelEnum::Laminar(Laminar)),
        "constantEddyViscosity" => Ok(TurbulenceModelEnum::ConstantEddyViscosity(
            ConstantEddyViscosity::new(settings.nu_t, settings.pr_t),
        )),
        other => Err(ConfigError::UnknownModel {
            kind: "turbulence model",
            name: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Thermophysics::reaction_thermo::EnergyForm;
    use crate::Thermophysics::thermo_tests::uniform_thermo;
    use approx::assert_relative_eq;

    #[test]
    fn laminar_uses_molecular_properties() {
        let mesh = FvMesh::rectangle(2, 2, 1.0, 1.0);
        let thermo = uniform_thermo(&mesh, EnergyForm::Enthalpy, 1e5, 300.0, 0.5);
        let model = create_turbulence_model(&TurbulenceSettings::default()).unwrap();
        assert_eq!(model.name(), "laminar");
        assert_eq!(model.mu_eff(&mesh, &thermo).internal, thermo.mu.internal);
        assert_eq!(model.alpha_eff(&mesh, &thermo).internal, thermo.alpha.internal);
    }

    #[test]
    fn eddy_viscosity_adds_to_molecular_values() {
        let mesh = FvMesh::rectangle(2, 1, 1.0, 1.0);
        let thermo = uniform_thermo(&mesh, EnergyForm::Enthalpy, 1e5, 300.0, 0.5);
        let rho = thermo.rho(&mesh);
        let mut model = create_turbulence_model(&TurbulenceSettings {
            model: "constantEddyViscosity".to_string(),
            nu_t: 1e-3,
            pr_t: 0.5,
        })
        .unwrap();
        model.correct(&mesh, &rho);
        let mu_eff = model.mu_eff(&mesh, &thermo);
        let alpha_eff = model.alpha_eff(&mesh, &thermo);
        let mu_t = rho.internal[0] * 1e-3;
        assert_relative_eq!(mu_eff.internal[0], thermo.mu.internal[0] + mu_t, epsilon = 1e-15);
        assert_relative_eq!(
            alpha_eff.internal[1],
            thermo.alpha.internal[1] + mu_t / 0.5,
            epsilon = 1e-15
        );
    }

    #[test]
    fn unknown_model_is_rejected() {
        let settings = TurbulenceSettings {
            model: "kEpsilon".to_string(),
            ..TurbulenceSettings::default()
        };
        assert!(matches!(
            create_turbulence_model(&settings),
            Err(ConfigError::UnknownModel { .. })
        ));
    }
}
