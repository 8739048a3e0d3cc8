//! Species data and mixture rules for a constant-cp ideal mixture.
use prettytable::{Table, row};
use serde::{Deserialize, Serialize};

/// universal gas constant, J/(kmol K)
pub const R_UNIVERSAL: f64 = 8314.462618;
/// reference temperature of the sensible enthalpy, K
pub const T_STD: f64 = 298.15;

const SMALL: f64 = 1e-300;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpecieData {
    pub name: String,
    /// kg/kmol
    pub molar_mass: f64,
    /// J/(kg K)
    pub cp: f64,
    /// formation enthalpy at `T_STD`, J/kg
    #[serde(default)]
    pub hf: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesTable {
    pub species: Vec<SpecieData>,
}

impl SpeciesTable {
    pub fn new(species: Vec<SpecieData>) -> Self {
        Self { species }
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.species.iter().map(|s| s.name.clone()).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.species.iter().position(|s| s.name == name)
    }

    /// Moves `name` to the end of the table so that it closes the mass balance.
    /// Returns true if the order changed.
    pub fn move_to_end(&mut self, name: &str) -> bool {
        match self.index_of(name) {
            Some(i) if i + 1 != self.species.len() => {
                let specie = self.species.remove(i);
                self.species.push(specie);
                true
            }
            _ => false,
        }
    }

    pub fn hf(&self, i: usize) -> f64 {
        self.species[i].hf
    }

    /// `1 / sum(Y_i / W_i)`
    pub fn mixture_molar_mass(&self, y: &[f64]) -> f64 {
        let inverse: f64 = self
            .species
            .iter()
            .zip(y)
            .map(|(s, yi)| yi / s.molar_mass)
            .sum();
        1.0 / inverse.max(SMALL)
    }

    pub fn cp_mix(&self, y: &[f64]) -> f64 {
        self.species.iter().zip(y).map(|(s, yi)| yi * s.cp).sum()
    }

    /// sensible enthalpy of the mixture, J/kg
    pub fn sensible_enthalpy(&self, y: &[f64], t: f64) -> f64 {
        self.cp_mix(y) * (t - T_STD)
    }

    pub fn pretty_print(&self) {
        let mut table = Table::new();
        table.add_row(row!["specie", "W, kg/kmol", "cp, J/(kg K)", "hf, J/kg"]);
        for s in &self.species {
            table.add_row(row![s.name, s.molar_mass, s.cp, s.hf]);
        }
        table.printstd();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn air_like() -> SpeciesTable {
        SpeciesTable::new(vec![
            SpecieData {
                name: "O2".to_string(),
                molar_mass: 32.0,
                cp: 1000.0,
                hf: 0.0,
            },
            SpecieData {
                name: "N2".to_string(),
                molar_mass: 28.0,
                cp: 1100.0,
                hf: 0.0,
            },
        ])
    }

    #[test]
    fn mixture_rules() {
        let table = air_like();
        let y = [0.25, 0.75];
        assert_relative_eq!(
            table.mixture_molar_mass(&y),
            1.0 / (0.25 / 32.0 + 0.75 / 28.0),
            epsilon = 1e-12
        );
        assert_relative_eq!(table.cp_mix(&y), 1075.0, epsilon = 1e-12);
        assert_relative_eq!(table.sensible_enthalpy(&y, T_STD), 0.0);
        assert_eq!(table.index_of("N2"), Some(1));
        assert_eq!(table.index_of("CO2"), None);
    }

    #[test]
    fn closing_specie_moves_to_the_end() {
        let mut table = air_like();
        assert!(table.move_to_end("O2"));
        assert_eq!(table.names(), vec!["N2".to_string(), "O2".to_string()]);
        assert!(!table.move_to_end("O2"));
        assert!(!table.move_to_end("CO2"));
        assert_eq!(table.index_of("O2"), Some(1));
    }
}
