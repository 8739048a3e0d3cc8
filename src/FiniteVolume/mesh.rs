//! # Finite-volume mesh
//!
//! Face-addressed 2-D mesh (unit depth): internal faces come first, boundary
//! faces follow grouped into named patches. Every face stores its area vector
//! `Sf`, which points from owner to neighbour on internal faces and outwards on
//! the boundary.
//!
//! Besides the raw addressing the mesh caches the geometric quantities the
//! operators need:
//! - `weights`: linear interpolation weight of the owner value,
//! - `delta_coeffs`: `1/(n·d)`, the over-relaxed orthogonal coefficient,
//! - `non_orth_corr`: `k = Sf - d |Sf| delta`, the explicit non-orthogonal part.
//!
//! `FvMesh::rectangle` and `FvMesh::skewed_rectangle` build structured
//! quadrilateral blocks; the skewed variant gives parallelogram cells whose
//! centre-to-centre vectors are not aligned with the face normals, which is what
//! exercises the non-orthogonal correctors.
use nalgebra::Vector2;

/// Named group of consecutive boundary faces.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub name: String,
    pub start: usize,
    pub size: usize,
}

impl Patch {
    /// global face indices of the patch
    pub fn faces(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.size
    }
}

#[derive(Debug, Clone)]
pub struct FvMesh {
    pub cell_centres: Vec<Vector2<f64>>,
    pub cell_volumes: Vec<f64>,
    pub face_centres: Vec<Vector2<f64>>,
    pub face_areas: Vec<Vector2<f64>>,
    pub owner: Vec<usize>,
    /// neighbour cell of every internal face
    pub neighbour: Vec<usize>,
    pub patches: Vec<Patch>,
    pub mag_sf: Vec<f64>,
    pub weights: Vec<f64>,
    pub delta_coeffs: Vec<f64>,
    pub non_orth_corr: Vec<Vector2<f64>>,
    /// (patch index, local face index) of each boundary face
    boundary_addressing: Vec<(usize, usize)>,
}

impl FvMesh {
    pub fn new(
        cell_centres: Vec<Vector2<f64>>,
        cell_volumes: Vec<f64>,
        face_centres: Vec<Vector2<f64>>,
        face_areas: Vec<Vector2<f64>>,
        owner: Vec<usize>,
        neighbour: Vec<usize>,
        patches: Vec<Patch>,
    ) -> Self {
        let n_faces = face_areas.len();
        let n_internal = neighbour.len();
        let mut mag_sf = Vec::with_capacity(n_faces);
        let mut weights = Vec::with_capacity(n_faces);
        let mut delta_coeffs = Vec::with_capacity(n_faces);
        let mut non_orth_corr = Vec::with_capacity(n_faces);

        for f in 0..n_faces {
            let sf = face_areas[f];
            let mag = sf.norm();
            let n = sf / mag;
            let c_own = cell_centres[owner[f]];
            mag_sf.push(mag);
            if f < n_internal {
                let c_nei = cell_centres[neighbour[f]];
                let d = c_nei - c_own;
                let d_own = n.dot(&(face_centres[f] - c_own)).abs();
                let d_nei = n.dot(&(c_nei - face_centres[f])).abs();
                weights.push(d_nei / (d_own + d_nei));
                let delta = 1.0 / n.dot(&d);
                delta_coeffs.push(delta);
                non_orth_corr.push(sf - d * (mag * delta));
            } else {
                let d = face_centres[f] - c_own;
                weights.push(1.0);
                delta_coeffs.push(1.0 / n.dot(&d));
                non_orth_corr.push(Vector2::zeros());
            }
        }

        let mut boundary_addressing = vec![(0, 0); n_faces - n_internal];
        for (patch_i, patch) in patches.iter().enumerate() {
            for (local, face) in patch.faces().enumerate() {
                boundary_addressing[face - n_internal] = (patch_i, local);
            }
        }

        Self {
            cell_centres,
            cell_volumes,
            face_centres,
            face_areas,
            owner,
            neighbour,
            patches,
            mag_sf,
            weights,
            delta_coeffs,
            non_orth_corr,
            boundary_addressing,
        }
    }

    /// Orthogonal block of `nx × ny` rectangular cells.
    pub fn rectangle(nx: usize, ny: usize, lx: f64, ly: f64) -> Self {
        Self::skewed_rectangle(nx, ny, lx, ly, 0.0)
    }

    /// Block of parallelogram cells: node `(i, j)` sits at
    /// `(i dx + j dy tan(skew), j dy)`. Patches: left, right, bottom, top.
    pub fn skewed_rectangle(nx: usize, ny: usize, lx: f64, ly: f64, skew: f64) -> Self {
        let dx = lx / nx as f64;
        let dy = ly / ny as f64;
        let shear = skew.tan();
        let node = |i: usize, j: usize| Vector2::new(i as f64 * dx + j as f64 * dy * shear, j as f64 * dy);
        let cell = |i: usize, j: usize| j * nx + i;

        let mut cell_centres = Vec::with_capacity(nx * ny);
        let mut cell_volumes = Vec::with_capacity(nx * ny);
        for j in 0..ny {
            for i in 0..nx {
                let centre = (node(i, j) + node(i + 1, j) + node(i, j + 1) + node(i + 1, j + 1)) * 0.25;
                cell_centres.push(centre);
                cell_volumes.push(dx * dy);
            }
        }

        let mut face_centres = Vec::new();
        let mut face_areas = Vec::new();
        let mut owner = Vec::new();
        let mut neighbour = Vec::new();
        let mut push_face = |a: Vector2<f64>, b: Vector2<f64>, own: usize, direction: Vector2<f64>| {
            let centre = (a + b) * 0.5;
            let edge = b - a;
            let mut sf = Vector2::new(edge.y, -edge.x);
            if sf.dot(&direction) < 0.0 {
                sf = -sf;
            }
            face_centres.push(centre);
            face_areas.push(sf);
            owner.push(own);
        };

        // internal faces, east-west first
        for j in 0..ny {
            for i in 0..nx.saturating_sub(1) {
                let (o, n) = (cell(i, j), cell(i + 1, j));
                push_face(node(i + 1, j), node(i + 1, j + 1), o, cell_centres[n] - cell_centres[o]);
                neighbour.push(n);
            }
        }
        for j in 0..ny.saturating_sub(1) {
            for i in 0..nx {
                let (o, n) = (cell(i, j), cell(i, j + 1));
                push_face(node(i, j + 1), node(i + 1, j + 1), o, cell_centres[n] - cell_centres[o]);
                neighbour.push(n);
            }
        }

        let mut patches = Vec::with_capacity(4);
        let mut start = neighbour.len();
        let mut add_patch = |name: &str, size: usize, patches: &mut Vec<Patch>| {
            patches.push(Patch {
                name: name.to_string(),
                start,
                size,
            });
            start += size;
        };

        for j in 0..ny {
            let (a, b, o) = (node(0, j), node(0, j + 1), cell(0, j));
            push_face(a, b, o, (a + b) * 0.5 - cell_centres[o]);
        }
        add_patch("left", ny, &mut patches);
        for j in 0..ny {
            let (a, b, o) = (node(nx, j), node(nx, j + 1), cell(nx - 1, j));
            push_face(a, b, o, (a + b) * 0.5 - cell_centres[o]);
        }
        add_patch("right", ny, &mut patches);
        for i in 0..nx {
            let (a, b, o) = (node(i, 0), node(i + 1, 0), cell(i, 0));
            push_face(a, b, o, (a + b) * 0.5 - cell_centres[o]);
        }
        add_patch("bottom", nx, &mut patches);
        for i in 0..nx {
            let (a, b, o) = (node(i, ny), node(i + 1, ny), cell(i, ny - 1));
            push_face(a, b, o, (a + b) * 0.5 - cell_centres[o]);
        }
        add_patch("top", nx, &mut patches);

        Self::new(
            cell_centres,
            cell_volumes,
            face_centres,
            face_areas,
            owner,
            neighbour,
            patches,
        )
    }

    pub fn n_cells(&self) -> usize {
        self.cell_volumes.len()
    }

    pub fn n_faces(&self) -> usize {
        self.face_areas.len()
    }

    pub fn n_internal_faces(&self) -> usize {
        self.neighbour.len()
    }

    pub fn is_internal(&self, face: usize) -> bool {
        face < self.neighbour.len()
    }

    pub fn patch_index(&self, name: &str) -> Option<usize> {
        self.patches.iter().position(|p| p.name == name)
    }

    /// (patch, local index) of a boundary face
    pub fn boundary_face(&self, face: usize) -> (usize, usize) {
        self.boundary_addressing[face - self.neighbour.len()]
    }

    pub fn total_volume(&self) -> f64 {
        self.cell_volumes.iter().sum()
    }

    /// true when any internal face has a non-vanishing correction vector
    pub fn is_non_orthogonal(&self) -> bool {
        self.non_orth_corr[..self.n_internal_faces()]
            .iter()
            .zip(&self.mag_sf)
            .any(|(k, mag)| k.norm() > 1e-10 * mag)
    }
}
