//! Moving reference frames for face fluxes.
//!
//! A frame converts absolute mass fluxes into fluxes relative to a zone that
//! moves with a prescribed velocity, and masks face quantities that must not
//! act inside that zone (the transient flux coupling, for instance).
use crate::FiniteVolume::fields::SurfaceScalarField;
use crate::FiniteVolume::mesh::FvMesh;
use enum_dispatch::enum_dispatch;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

#[enum_dispatch]
pub trait FrameMotion {
    fn name(&self) -> &'static str;

    /// `phi -= rho_f (V·Sf)` on the faces of the moving zone.
    fn make_relative(&self, mesh: &FvMesh, rho_f: &SurfaceScalarField, phi: &mut SurfaceScalarField);

    /// inverse of `make_relative`
    fn make_absolute(&self, mesh: &FvMesh, rho_f: &SurfaceScalarField, phi: &mut SurfaceScalarField);

    /// zeroes `phi` on the faces of the moving zone
    fn zero_filter(&self, mesh: &FvMesh, phi: SurfaceScalarField) -> SurfaceScalarField;
}

#[derive(Debug, Clone, Default)]
pub struct StationaryFrame;

impl FrameMotion for StationaryFrame {
    fn name(&self) -> &'static str {
        "stationary"
    }

    fn make_relative(&self, _: &FvMesh, _: &SurfaceScalarField, _: &mut SurfaceScalarField) {}

    fn make_absolute(&self, _: &FvMesh, _: &SurfaceScalarField, _: &mut SurfaceScalarField) {}

    fn zero_filter(&self, _: &FvMesh, phi: SurfaceScalarField) -> SurfaceScalarField {
        phi
    }
}

/// Zone of cells translating with a constant velocity.
#[derive(Debug, Clone)]
pub struct TranslatingFrame {
    pub velocity: Vector2<f64>,
    /// faces whose owner and (for internal faces) neighbour are in the zone
    faces: Vec<usize>,
}

impl TranslatingFrame {
    pub fn new(mesh: &FvMesh, velocity: Vector2<f64>, cells: &[usize]) -> Self {
        let mut in_zone = vec![false; mesh.n_cells()];
        cells.iter().for_each(|&c| in_zone[c] = true);
        let faces = (0..mesh.n_faces())
            .filter(|&f| {
                in_zone[mesh.owner[f]] && (!mesh.is_internal(f) || in_zone[mesh.neighbour[f]])
            })
            .collect();
        Self { velocity, faces }
    }

    fn shift(&self, mesh: &FvMesh, rho_f: &SurfaceScalarField, phi: &mut SurfaceScalarField, sign: f64) {
        for &f in &self.faces {
            phi.values[f] += sign * rho_f.values[f] * self.velocity.dot(&mesh.face_areas[f]);
        }
    }
}

impl FrameMotion for TranslatingFrame {
    fn name(&self) -> &'static str {
        "translating"
    }

    fn make_relative(&self, mesh: &FvMesh, rho_f: &SurfaceScalarField, phi: &mut SurfaceScalarField) {
        self.shift(mesh, rho_f, phi, -1.0);
    }

    fn make_absolute(&self, mesh: &FvMesh, rho_f: &SurfaceScalarField, phi: &mut SurfaceScalarField) {
        self.shift(mesh, rho_f, phi, 1.0);
    }

    fn zero_filter(&self, _: &FvMesh, mut phi: SurfaceScalarField) -> SurfaceScalarField {
        self.faces.iter().for_each(|&f| phi.values[f] = 0.0);
        phi
    }
}

#[enum_dispatch(FrameMotion)]
#[derive(Debug, Clone)]
pub enum FrameMotionEnum {
    Stationary(StationaryFrame),
    Translating(TranslatingFrame),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FrameSettings {
    #[default]
    Stationary,
    Translating {
        velocity: [f64; 2],
        cells: Vec<usize>,
    },
}

impl FrameSettings {
    pub fn cells(&self) -> &[usize] {
        match self {
            FrameSettings::Stationary => &[],
            FrameSettings::Translating { cells, .. } => cells.as_slice(),
        }
    }
}

pub fn create_frame_motion(mesh: &FvMesh, settings: &FrameSettings) -> FrameMotionEnum {
    match settings {
        FrameSettings::Stationary => FrameMotionEnum::Stationary(StationaryFrame),
        FrameSettings::Translating { velocity, cells } => FrameMotionEnum::Translating(
            TranslatingFrame::new(mesh, Vector2::new(velocity[0], velocity[1]), cells),
        ),
    }
}
