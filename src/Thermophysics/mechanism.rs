//! # Reaction mechanisms
//!
//! Global (one-step) reactions in mass units:
//! `fuel + s oxidiser -> sum(nu_k product_k)` with `sum(nu_k) = 1 + s`, so every
//! reaction conserves mass exactly. The fuel consumption rate is
//! `A T^n exp(-E/(R T)) (rho Y_F)^a (rho Y_O)^b` in kg/(m^3 s).
//!
//! `Inert` is the mechanism without reactions; every production rate is zero.
use crate::Thermophysics::reaction_thermo::ThermoError;
use crate::Thermophysics::species::SpeciesTable;
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// J/(mol K)
const R_G: f64 = 8.314;

fn one() -> f64 {
    1.0
}

#[allow(non_snake_case)]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReactionSettings {
    pub fuel: String,
    #[serde(default)]
    pub oxidiser: Option<String>,
    /// kg oxidiser consumed per kg fuel
    #[serde(default)]
    pub oxidiser_mass_ratio: f64,
    /// kg of each product formed per kg fuel
    pub products: HashMap<String, f64>,
    pub A: f64,
    #[serde(default)]
    pub n: f64,
    /// activation energy, J/mol
    pub E: f64,
    #[serde(default = "one")]
    pub fuel_order: f64,
    #[serde(default = "one")]
    pub oxidiser_order: f64,
}

#[allow(non_snake_case)]
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalReaction {
    pub fuel: usize,
    pub oxidiser: Option<(usize, f64)>,
    pub products: Vec<(usize, f64)>,
    pub A: f64,
    pub n: f64,
    pub E: f64,
    pub fuel_order: f64,
    pub oxidiser_order: f64,
}

impl GlobalReaction {
    /// fuel consumption rate, kg/(m^3 s)
    pub fn rate(&self, t: f64, rho: f64, y: &[f64]) -> f64 {
        let y_fuel = y[self.fuel].max(0.0);
        if y_fuel == 0.0 {
            return 0.0;
        }
        let k = self.A * t.powf(self.n) * (-self.E / (R_G * t)).exp();
        let mut rate = k * (rho * y_fuel).powf(self.fuel_order);
        if let Some((ox, _)) = self.oxidiser {
            rate *= (rho * y[ox].max(0.0)).powf(self.oxidiser_order);
        }
        rate
    }

    pub fn involves(&self, specie: usize) -> bool {
        self.fuel == specie
            || self.oxidiser.is_some_and(|(ox, _)| ox == specie)
            || self.products.iter().any(|(k, _)| *k == specie)
    }
}

#[enum_dispatch]
pub trait ReactionMechanism {
    fn name(&self) -> &'static str;
    fn n_reactions(&self) -> usize;
    /// net mass production rate of every specie, kg/(m^3 s)
    fn omega(&self, p: f64, t: f64, rho: f64, y: &[f64], omega: &mut [f64]);
    /// true if the specie takes part in any reaction
    fn is_reactive(&self, specie: usize) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inert;

impl ReactionMechanism for Inert {
    fn name(&self) -> &'static str {
        "inert"
    }

    fn n_reactions(&self) -> usize {
        0
    }

    fn omega(&self, _p: f64, _t: f64, _rho: f64, _y: &[f64], omega: &mut [f64]) {
        omega.iter_mut().for_each(|w| *w = 0.0);
    }

    fn is_reactive(&self, _specie: usize) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrheniusMechanism {
    pub reactions: Vec<GlobalReaction>,
}

impl ReactionMechanism for ArrheniusMechanism {
    fn name(&self) -> &'static str {
        "arrhenius"
    }

    fn n_reactions(&self) -> usize {
        self.reactions.len()
    }

    fn omega(&self, _p: f64, t: f64, rho: f64, y: &[f64], omega: &mut [f64]) {
        omega.iter_mut().for_each(|w| *w = 0.0);
        for reaction in &self.reactions {
            let rate = reaction.rate(t, rho, y);
            omega[reaction.fuel] -= rate;
            if let Some((ox, ratio)) = reaction.oxidiser {
                omega[ox] -= ratio * rate;
            }
            for &(k, nu) in &reaction.products {
                omega[k] += nu * rate;
            }
        }
    }

    fn is_reactive(&self, specie: usize) -> bool {
        self.reactions.iter().any(|r| r.involves(specie))
    }
}

#[derive(Debug, Clone, PartialEq)]
#[enum_dispatch(ReactionMechanism)]
pub enum MechanismEnum {
    Inert(Inert),
    Arrhenius(ArrheniusMechanism),
}

/// Resolves specie names and checks the mass balance of every reaction;
/// an empty list gives the inert mechanism.
pub fn create_mechanism(
    reactions: &[ReactionSettings],
    species: &SpeciesTable,
) -> Result<MechanismEnum, ThermoError> {
    if reactions.is_empty() {
        return Ok(MechanismEnum::Inert(Inert));
    }
    let lookup = |name: &str| {
        species
            .index_of(name)
            .ok_or_else(|| ThermoError::Validation(format!("reaction refers to unknown specie '{}'", name)))
    };
    let mut resolved = Vec::with_capacity(reactions.len());
    for r in reactions {
        let fuel = lookup(&r.fuel)?;
        let oxidiser = match &r.oxidiser {
            Some(name) => Some((lookup(name)?, r.oxidiser_mass_ratio)),
            None => None,
        };
        let mut products = Vec::with_capacity(r.products.len());
        for (name, nu) in &r.products {
            products.push((lookup(name)?, *nu));
        }
        products.sort_by_key(|(k, _)| *k);
        let produced: f64 = products.iter().map(|(_, nu)| nu).sum();
        let consumed = 1.0 + oxidiser.map_or(0.0, |(_, s)| s);
        if (produced - consumed).abs() > 1e-6 * consumed {
            return Err(ThermoError::Validation(format!(
                "reaction of {} is not mass balanced: {} kg consumed, {} kg produced",
                r.fuel, consumed, produced
            )));
        }
        resolved.push(GlobalReaction {
            fuel,
            oxidiser,
            products,
            A: r.A,
            n: r.n,
            E: r.E,
            fuel_order: r.fuel_order,
            oxidiser_order: r.oxidiser_order,
        });
    }
    Ok(MechanismEnum::Arrhenius(ArrheniusMechanism { reactions: resolved }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Thermophysics::species::SpecieData;
    use approx::assert_relative_eq;

    fn species() -> SpeciesTable {
        let s = |name: &str, w: f64| SpecieData {
            name: name.to_string(),
            molar_mass: w,
            cp: 1000.0,
            hf: 0.0,
        };
        SpeciesTable::new(vec![
            s("CH4", 16.0),
            s("O2", 32.0),
            s("CO2", 44.0),
            s("H2O", 18.0),
            s("N2", 28.0),
        ])
    }

    fn methane_settings() -> ReactionSettings {
        ReactionSettings {
            fuel: "CH4".to_string(),
            oxidiser: Some("O2".to_string()),
            oxidiser_mass_ratio: 4.0,
            products: HashMap::from([("CO2".to_string(), 2.75), ("H2O".to_string(), 2.25)]),
            A: 1e9,
            n: 0.0,
            E: 1.5e5,
            fuel_order: 1.0,
            oxidiser_order: 1.0,
        }
    }

    #[test]
    fn single_step_conserves_mass() {
        let mech = create_mechanism(&[methane_settings()], &species()).unwrap();
        let y = [0.05, 0.2, 0.0, 0.0, 0.75];
        let mut omega = [0.0; 5];
        mech.omega(1e5, 1800.0, 0.2, &y, &mut omega);
        assert!(omega[0] < 0.0);
        assert_relative_eq!(omega[1], 4.0 * omega[0], epsilon = 1e-12);
        assert_relative_eq!(omega.iter().sum::<f64>(), 0.0, epsilon = 1e-9 * omega[0].abs());
        assert_eq!(omega[4], 0.0);
        assert!(mech.is_reactive(3));
        assert!(!mech.is_reactive(4));
    }

    #[test]
    fn no_fuel_no_rate() {
        let mech = create_mechanism(&[methane_settings()], &species()).unwrap();
        let mut omega = [1.0; 5];
        mech.omega(1e5, 1800.0, 0.2, &[0.0, 0.2, 0.1, 0.0, 0.7], &mut omega);
        assert!(omega.iter().all(|w| *w == 0.0));
    }

    #[test]
    fn unbalanced_or_unknown_reactions_are_rejected() {
        let mut unbalanced = methane_settings();
        unbalanced.products.insert("H2O".to_string(), 1.0);
        assert!(matches!(
            create_mechanism(&[unbalanced], &species()),
            Err(ThermoError::Validation(_))
        ));
        let mut unknown = methane_settings();
        unknown.fuel = "C3H8".to_string();
        assert!(create_mechanism(&[unknown], &species()).is_err());
        assert_eq!(create_mechanism(&[], &species()).unwrap().name(), "inert");
    }
}
