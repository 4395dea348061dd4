//! Lattice primitives for 3D crystals.

use serde::{Deserialize, Serialize};

/// 3x3 real matrix stored row-major.
pub type Mat3 = [[f64; 3]; 3];

/// Primitive cell. Rows are the lattice vectors in Angstrom.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Lattice3D {
    pub vectors: Mat3,
}

impl Lattice3D {
    pub fn new(vectors: Mat3) -> Self {
        Self { vectors }
    }

    pub fn cubic(a: f64) -> Self {
        Self {
            vectors: [[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]],
        }
    }

    pub fn orthorhombic(a: f64, b: f64, c: f64) -> Self {
        Self {
            vectors: [[a, 0.0, 0.0], [0.0, b, 0.0], [0.0, 0.0, c]],
        }
    }

    pub fn volume(&self) -> f64 {
        det3(&self.vectors).abs()
    }

    /// Reciprocal cell as the inverse of the cell matrix (no 2*pi factor):
    /// columns are the reciprocal lattice vectors.
    pub fn reciprocal(&self) -> Mat3 {
        inv3(&self.vectors)
    }
}

/// Cell handle exposed by the phonon kernel. Bands per grid point are
/// `3 * num_atoms`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PrimitiveCell {
    pub lattice: Lattice3D,
    pub num_atoms: usize,
}

impl PrimitiveCell {
    pub fn num_bands(&self) -> usize {
        3 * self.num_atoms
    }
}

/// Similarity transform `L * R * L^-1`, mapping a rotation expressed in
/// fractional (reduced) coordinates into Cartesian coordinates.
pub fn similarity_transform(l: &Mat3, r: &Mat3) -> Mat3 {
    matmul3(l, &matmul3(r, &inv3(l)))
}

/// Integer rotation promoted to a real matrix.
pub fn rotation_to_real(r: &[[i32; 3]; 3]) -> Mat3 {
    let mut out = [[0.0; 3]; 3];
    for (row, r_row) in out.iter_mut().zip(r.iter()) {
        for (value, &entry) in row.iter_mut().zip(r_row.iter()) {
            *value = f64::from(entry);
        }
    }
    out
}

pub fn matmul3(a: &Mat3, b: &Mat3) -> Mat3 {
    let mut out = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            out[i][j] = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
        }
    }
    out
}

pub fn matvec3(a: &Mat3, v: &[f64; 3]) -> [f64; 3] {
    [
        a[0][0] * v[0] + a[0][1] * v[1] + a[0][2] * v[2],
        a[1][0] * v[0] + a[1][1] * v[1] + a[1][2] * v[2],
        a[2][0] * v[0] + a[2][1] * v[1] + a[2][2] * v[2],
    ]
}

pub fn det3(m: &Mat3) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

pub fn inv3(m: &Mat3) -> Mat3 {
    let det = det3(m);
    assert!(
        det.abs() > f64::EPSILON,
        "lattice vectors are linearly dependent"
    );
    let inv_det = 1.0 / det;
    [
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ]
}
