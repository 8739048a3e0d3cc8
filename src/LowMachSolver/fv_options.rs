//! # Finite-volume options
//!
//! Run-time selectable sources and constraints attached to named fields:
//! - `explicit_source`: uniform per-volume source in a set of cells; a source
//!   on `rho` is the mass source of the continuity and pressure equations,
//! - `fixed_value_constraint`: holds a field at a value in a set of cells,
//! - `velocity_limit`: caps the velocity magnitude after correction,
//! - `temperature_limit`: bounds the energy so that `T` stays in `[min, max]`.
use crate::FiniteVolume::fields::VolVectorField;
use crate::FiniteVolume::fv_matrix::FvMatrix;
use crate::FiniteVolume::mesh::FvMesh;
use crate::Thermophysics::reaction_thermo::ReactionThermo;
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FvOption {
    ExplicitSource {
        field: String,
        cells: Vec<usize>,
        /// per unit volume, field units per second times density
        value: f64,
    },
    FixedValueConstraint {
        field: String,
        cells: Vec<usize>,
        value: f64,
    },
    VelocityLimit {
        max: f64,
    },
    TemperatureLimit {
        min: f64,
        max: f64,
    },
}

impl FvOption {
    /// cells the option acts on, empty for the limiters
    pub fn cells(&self) -> &[usize] {
        match self {
            FvOption::ExplicitSource { cells, .. } | FvOption::FixedValueConstraint { cells, .. } => {
                cells.as_slice()
            }
            FvOption::VelocityLimit { .. } | FvOption::TemperatureLimit { .. } => &[],
        }
    }
}

pub trait FvOptions {
    /// explicit source of `field` per unit volume
    fn source(&self, mesh: &FvMesh, field: &str) -> Vec<f64>;

    /// applies value constraints to the equation of `eqn.field_name`
    fn constrain(&self, mesh: &FvMesh, eqn: &mut FvMatrix);

    fn correct_velocity(&self, mesh: &FvMesh, u: &mut VolVectorField);

    fn correct_energy(&self, mesh: &FvMesh, thermo: &mut ReactionThermo);
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FvOptionList {
    pub options: Vec<FvOption>,
}

impl FvOptionList {
    pub fn new(options: Vec<FvOption>) -> Self {
        Self { options }
    }

    /// true if some option acts on `field`
    pub fn applies_to(&self, field: &str) -> bool {
        self.options.iter().any(|o| match o {
            FvOption::ExplicitSource { field: f, .. }
            | FvOption::FixedValueConstraint { field: f, .. } => f == field,
            FvOption::VelocityLimit { .. } => field == "U",
            FvOption::TemperatureLimit { .. } => field == "h" || field == "e",
        })
    }
}

impl FvOptions for FvOptionList {
    fn source(&self, mesh: &FvMesh, field: &str) -> Vec<f64> {
        let mut s = vec![0.0; mesh.n_cells()];
        for option in &self.options {
            if let FvOption::ExplicitSource {
                field: f,
                cells,
                value,
            } = option
            {
                if f == field {
                    cells.iter().for_each(|&c| s[c] += value);
                }
            }
        }
        s
    }

    fn constrain(&self, mesh: &FvMesh, eqn: &mut FvMatrix) {
        for option in &self.options {
            if let FvOption::FixedValueConstraint {
                field,
                cells,
                value,
            } = option
            {
                if *field == eqn.field_name {
                    eqn.set_values(mesh, cells, &vec![*value; cells.len()]);
                }
            }
        }
    }

    fn correct_velocity(&self, mesh: &FvMesh, u: &mut VolVectorField) {
        for option in &self.options {
            if let FvOption::VelocityLimit { max } = option {
                let mut n_limited = 0;
                for v in u.internal.iter_mut() {
                    let mag = v.norm();
                    if mag > *max {
                        *v *= max / mag;
                        n_limited += 1;
                    }
                }
                if n_limited > 0 {
                    debug!("velocity limited to {} in {} cells", max, n_limited);
                    u.correct_boundary_conditions(mesh);
                }
            }
        }
    }

    fn correct_energy(&self, mesh: &FvMesh, thermo: &mut ReactionThermo) {
        for option in &self.options {
            if let FvOption::TemperatureLimit { min, max } = option {
                let mut y = vec![0.0; thermo.n_species()];
                for cell in 0..mesh.n_cells() {
                    thermo.cell_mass_fractions(cell, &mut y);
                    let p = thermo.p.internal[cell];
                    let he_min = thermo.he_value(p, *min, &y);
                    let he_max = thermo.he_value(p, *max, &y);
                    let he = &mut thermo.he.internal[cell];
                    *he = he.clamp(he_min, he_max);
                }
                thermo.he.correct_boundary_conditions(mesh);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FiniteVolume::fields::{PatchField, VolScalarField};
    use crate::Thermophysics::reaction_thermo::EnergyForm;
    use crate::Thermophysics::thermo_tests::uniform_thermo;
    use approx::assert_relative_eq;
    use nalgebra::Vector2;

    #[test]
    fn options_deserialize_from_tagged_json() {
        let json = r#"[
            { "type": "explicit_source", "field": "rho", "cells": [0, 2], "value": 0.5 },
            { "type": "velocity_limit", "max": 10.0 }
        ]"#;
        let options: Vec<FvOption> = serde_json::from_str(json).unwrap();
        let list = FvOptionList::new(options);
        let mesh = FvMesh::rectangle(3, 1, 3.0, 1.0);
        assert_eq!(list.source(&mesh, "rho"), vec![0.5, 0.0, 0.5]);
        assert_eq!(list.source(&mesh, "h"), vec![0.0; 3]);
        assert!(list.applies_to("U"));
        assert!(!list.applies_to("T"));
    }

    #[test]
    fn velocity_limit_caps_magnitude() {
        let mesh = FvMesh::rectangle(2, 1, 2.0, 1.0);
        let list = FvOptionList::new(vec![FvOption::VelocityLimit { max: 1.0 }]);
        let boundary = mesh
            .patches
            .iter()
            .map(|p| PatchField::zero_gradient(p.size))
            .collect();
        let mut u = VolVectorField::new(
            "U",
            &mesh,
            vec![Vector2::new(3.0, 4.0), Vector2::new(0.5, 0.0)],
            boundary,
        );
        list.correct_velocity(&mesh, &mut u);
        assert_relative_eq!(u.internal[0].norm(), 1.0, epsilon = 1e-14);
        assert_relative_eq!(u.internal[0].x, 0.6, epsilon = 1e-14);
        assert_eq!(u.internal[1], Vector2::new(0.5, 0.0));
    }

    #[test]
    fn temperature_limit_bounds_energy() {
        let mesh = FvMesh::rectangle(2, 1, 2.0, 1.0);
        let mut thermo = uniform_thermo(&mesh, EnergyForm::Enthalpy, 1e5, 300.0, 0.5);
        thermo.he.internal[0] += 1e7;
        let list = FvOptionList::new(vec![FvOption::TemperatureLimit {
            min: 250.0,
            max: 2500.0,
        }]);
        list.correct_energy(&mesh, &mut thermo);
        thermo.correct(&mesh).unwrap();
        assert_relative_eq!(thermo.T.internal[0], 2500.0, max_relative = 1e-8);
        assert_relative_eq!(thermo.T.internal[1], 300.0, max_relative = 1e-10);
    }

    #[test]
    fn fixed_value_constraint_pins_cells() {
        let mesh = FvMesh::rectangle(3, 1, 3.0, 1.0);
        let list = FvOptionList::new(vec![FvOption::FixedValueConstraint {
            field: "T".to_string(),
            cells: vec![1],
            value: 7.0,
        }]);
        let mut eqn = FvMatrix::new("T", &mesh);
        for i in 0..3 {
            eqn.diag[i] = 2.0;
            eqn.source[i] = 2.0;
        }
        list.constrain(&mesh, &mut eqn);
        let boundary = mesh
            .patches
            .iter()
            .map(|p| PatchField::zero_gradient(p.size))
            .collect();
        let t = VolScalarField::new("T", &mesh, vec![1.0, 7.0, 1.0], boundary);
        assert!(eqn.residual(&mesh, &t).iter().all(|r| r.abs() < 1e-12));
    }
}
