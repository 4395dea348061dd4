//! Reciprocal-space point-group operations and irreducible grid points.
//!
//! Rotations are 3x3 integer matrices acting on reduced (fractional)
//! coordinates. Grid reduction stays in integer arithmetic throughout:
//! shifted grids use doubled addresses (`2*addr + shift`) so half-divisor
//! shifts never leave the integers.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::lattice::{rotation_to_real, similarity_transform, Mat3};
use crate::mesh::{grid_address, grid_index, GridAddress, Mesh};

/// Rotation matrix in reduced coordinates.
pub type Rotation = [[i32; 3]; 3];

pub const IDENTITY: Rotation = [[1, 0, 0], [0, 1, 0], [0, 0, 1]];

/// Reciprocal-space point group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointGroup {
    rotations: Vec<Rotation>,
}

impl PointGroup {
    pub fn new(rotations: Vec<Rotation>) -> Self {
        assert!(!rotations.is_empty(), "point group needs at least one rotation");
        Self { rotations }
    }

    /// Trivial group, used when symmetry-star averaging is disabled.
    pub fn identity() -> Self {
        Self {
            rotations: vec![IDENTITY],
        }
    }

    pub fn rotations(&self) -> &[Rotation] {
        &self.rotations
    }

    pub fn len(&self) -> usize {
        self.rotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rotations.is_empty()
    }

    /// Rotations transformed into Cartesian coordinates via the reciprocal
    /// lattice, for group-velocity symmetrization.
    pub fn rotations_cartesian(&self, rec_lat: &Mat3) -> Vec<Mat3> {
        self.rotations
            .iter()
            .map(|r| similarity_transform(rec_lat, &rotation_to_real(r)))
            .collect()
    }
}

/// Rotation rescaled onto a mesh: `k[i][j] = r[i][j] * mesh[i] / mesh[j]`.
///
/// Returns None when the rotation does not map the mesh onto itself (the
/// quotient is not integral); such operations are skipped during reduction.
fn scaled_rotation(r: &Rotation, mesh: Mesh) -> Option<[[i64; 3]; 3]> {
    let m = mesh.0;
    let mut k = [[0i64; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            let num = i64::from(r[i][j]) * m[i] as i64;
            if num % m[j] as i64 != 0 {
                return None;
            }
            k[i][j] = num / m[j] as i64;
        }
    }
    Some(k)
}

/// Apply a scaled rotation to a doubled address, modulo the doubled mesh.
fn rotate_doubled(k: &[[i64; 3]; 3], d: [i64; 3], mesh: Mesh) -> [i64; 3] {
    let mut out = [0i64; 3];
    for i in 0..3 {
        let raw = k[i][0] * d[0] + k[i][1] * d[1] + k[i][2] * d[2];
        out[i] = raw.rem_euclid(2 * mesh.0[i] as i64);
    }
    out
}

/// Irreducible grid points of a mesh with their star multiplicities.
#[derive(Debug, Clone)]
pub struct IrGridPoints {
    /// Representative grid-point indices, ascending.
    pub points: Vec<usize>,
    /// Star size of each representative.
    pub weights: Vec<usize>,
    /// Address table of the full mesh the reduction ran on.
    pub grid_address: Vec<GridAddress>,
}

/// Reduce a mesh to its symmetry-irreducible points.
///
/// Rotations that do not preserve the (possibly shifted) grid are skipped;
/// the identity always survives, so the reduction is total. The weights of
/// the returned points always sum to `mesh.len()`.
pub fn ir_grid_points(mesh: Mesh, group: &PointGroup, shifts: [bool; 3]) -> IrGridPoints {
    let address = grid_address(mesh);
    let n = mesh.len();
    let s = [
        i64::from(shifts[0]),
        i64::from(shifts[1]),
        i64::from(shifts[2]),
    ];

    let usable: Vec<[[i64; 3]; 3]> = group
        .rotations()
        .iter()
        .filter_map(|r| scaled_rotation(r, mesh))
        .filter(|k| {
            // A rotation is compatible with the shift when it maps shifted
            // points back onto shifted points (parity is address-independent).
            let image = rotate_doubled(k, s, mesh);
            (0..3).all(|i| (image[i] - s[i]).rem_euclid(2) == 0)
        })
        .collect();

    let mut representative: Vec<Option<usize>> = vec![None; n];
    for p in 0..n {
        if representative[p].is_some() {
            continue;
        }
        representative[p] = Some(p);
        let a = address[p];
        let d = [
            2 * a[0] as i64 + s[0],
            2 * a[1] as i64 + s[1],
            2 * a[2] as i64 + s[2],
        ];
        for k in &usable {
            let image = rotate_doubled(k, d, mesh);
            let image_addr = [
                ((image[0] - s[0]) / 2) as usize,
                ((image[1] - s[1]) / 2) as usize,
                ((image[2] - s[2]) / 2) as usize,
            ];
            let q = grid_index(image_addr, mesh);
            if representative[q].is_none() {
                representative[q] = Some(p);
            }
        }
    }

    let mut points = Vec::new();
    let mut weight_of = std::collections::HashMap::new();
    for (q, rep) in representative.iter().enumerate() {
        let rep = rep.expect("every grid point belongs to an orbit");
        if rep == q {
            points.push(q);
        }
        *weight_of.entry(rep).or_insert(0usize) += 1;
    }
    let weights = points.iter().map(|p| weight_of[p]).collect();

    IrGridPoints {
        points,
        weights,
        grid_address: address,
    }
}

/// Number of distinct images of a grid address under the group (the order
/// of its star). Works on fine-mesh addresses, shifted or not, because
/// distinctness of `R q mod 1` equals distinctness of `R addr mod mesh`.
pub fn star_order(addr: GridAddress, mesh: Mesh, group: &PointGroup) -> usize {
    let d = [addr[0] as i64 * 2, addr[1] as i64 * 2, addr[2] as i64 * 2];
    let mut images = HashSet::new();
    for r in group.rotations() {
        if let Some(k) = scaled_rotation(r, mesh) {
            images.insert(rotate_doubled(&k, d, mesh));
        }
    }
    images.len().max(1)
}
