//! Fine/coarse reciprocal-space mesh bookkeeping.
//!
//! The fine mesh is the sampling mesh of the phonon kernel; an optional set
//! of integer divisors coarsens it for cheaper lifetime sampling. All of the
//! folding arithmetic is integer-exact: a coarse address times its divisor
//! (plus an optional half-divisor shift) always lands on a fine-mesh point.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::metrics::AXIS_NAMES;

/// Fine-mesh dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mesh(pub [usize; 3]);

impl Mesh {
    pub fn len(&self) -> usize {
        self.0[0] * self.0[1] * self.0[2]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Integer coordinates of one fine-mesh point.
pub type GridAddress = [usize; 3];

/// Full address table for a mesh, first axis fastest.
pub fn grid_address(mesh: Mesh) -> Vec<GridAddress> {
    let [mx, my, mz] = mesh.0;
    let mut table = Vec::with_capacity(mesh.len());
    for iz in 0..mz {
        for iy in 0..my {
            for ix in 0..mx {
                table.push([ix, iy, iz]);
            }
        }
    }
    table
}

/// Inverse of the address table ordering.
#[inline]
pub fn grid_index(addr: GridAddress, mesh: Mesh) -> usize {
    let [mx, my, _] = mesh.0;
    addr[0] + addr[1] * mx + addr[2] * mx * my
}

/// Diagnostic emitted when an incompatible divisor or shift is corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FoldingDiagnostic {
    DivisorFallback {
        axis: usize,
        mesh_number: usize,
        divisor: usize,
    },
    ShiftDisabled {
        axis: usize,
        divisor: usize,
    },
}

/// Validated mesh-divisor folding between the fine and the coarse mesh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshFolding {
    mesh: Mesh,
    divisors: [usize; 3],
    shifts: [bool; 3],
    #[serde(skip)]
    diagnostics: Vec<FoldingDiagnostic>,
}

impl MeshFolding {
    /// Validate divisors and shifts against the fine mesh.
    ///
    /// A divisor that does not evenly divide its mesh number falls back to 1;
    /// a shift on an axis whose effective divisor is odd is reset to false.
    /// Both degradations are logged and recorded, never fatal.
    pub fn new(mesh: Mesh, divisors: Option<[usize; 3]>, shifts: Option<[bool; 3]>) -> Self {
        let mut diagnostics = Vec::new();
        let mut effective = [1usize; 3];
        if let Some(requested) = divisors {
            for axis in 0..3 {
                let m = mesh.0[axis];
                let d = requested[axis];
                if d > 0 && m % d == 0 {
                    effective[axis] = d;
                } else {
                    warn!(
                        "mesh number {} for the {} axis is not dividable by divisor {}",
                        m, AXIS_NAMES[axis], d
                    );
                    diagnostics.push(FoldingDiagnostic::DivisorFallback {
                        axis,
                        mesh_number: m,
                        divisor: d,
                    });
                }
            }
        }
        let mut effective_shifts = [false; 3];
        if let Some(requested) = shifts {
            for axis in 0..3 {
                if !requested[axis] {
                    continue;
                }
                if effective[axis] % 2 == 0 {
                    effective_shifts[axis] = true;
                } else {
                    warn!(
                        "coarse grid along the {} axis can not be shifted (divisor {})",
                        AXIS_NAMES[axis], effective[axis]
                    );
                    diagnostics.push(FoldingDiagnostic::ShiftDisabled {
                        axis,
                        divisor: effective[axis],
                    });
                }
            }
        }
        Self {
            mesh,
            divisors: effective,
            shifts: effective_shifts,
            diagnostics,
        }
    }

    pub fn mesh(&self) -> Mesh {
        self.mesh
    }

    pub fn divisors(&self) -> [usize; 3] {
        self.divisors
    }

    pub fn shifts(&self) -> [bool; 3] {
        self.shifts
    }

    pub fn diagnostics(&self) -> &[FoldingDiagnostic] {
        &self.diagnostics
    }

    /// Exact integer quotient; guaranteed by divisor validation.
    pub fn coarse_mesh(&self) -> Mesh {
        Mesh([
            self.mesh.0[0] / self.divisors[0],
            self.mesh.0[1] / self.divisors[1],
            self.mesh.0[2] / self.divisors[2],
        ])
    }

    fn shift_offset(&self, axis: usize) -> usize {
        if self.shifts[axis] {
            self.divisors[axis] / 2
        } else {
            0
        }
    }

    /// Map coarse-grid indices onto their fine-mesh counterparts.
    pub fn coarse_to_dense(
        &self,
        coarse_points: &[usize],
        coarse_address: &[GridAddress],
    ) -> Vec<usize> {
        coarse_points
            .iter()
            .map(|&cp| {
                let ca = coarse_address[cp];
                let dense = [
                    ca[0] * self.divisors[0] + self.shift_offset(0),
                    ca[1] * self.divisors[1] + self.shift_offset(1),
                    ca[2] * self.divisors[2] + self.shift_offset(2),
                ];
                grid_index(dense, self.mesh)
            })
            .collect()
    }

    /// Keep the fine-mesh points that sit on the coarse representation,
    /// dropping duplicates while preserving order.
    pub fn reduce_explicit_points(
        &self,
        points: &[usize],
        grid_address: &[GridAddress],
    ) -> Vec<usize> {
        let mut seen = std::collections::HashSet::new();
        points
            .iter()
            .copied()
            .filter(|&p| {
                let addr = grid_address[p];
                let on_coarse = (0..3).all(|axis| {
                    let offset = self.shift_offset(axis);
                    addr[axis] >= offset && (addr[axis] - offset) % self.divisors[axis] == 0
                });
                on_coarse && seen.insert(p)
            })
            .collect()
    }
}
