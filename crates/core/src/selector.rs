//! Grid-point selection: which fine-mesh indices a run visits, and with
//! what star multiplicities.

use thiserror::Error;

use crate::mesh::{grid_address, GridAddress, MeshFolding};
use crate::symmetry::{ir_grid_points, PointGroup};

/// Caller intent, fixed at `initialize` time. The three modes are mutually
/// exclusive.
#[derive(Debug, Clone)]
pub enum GridPointSelection<'a> {
    /// Visit exactly these fine-mesh indices (reduced through the divisor
    /// folding; weights are irrelevant and treated as 1).
    Explicit(&'a [usize]),
    /// Visit every coarse-grid point; no symmetry-star averaging.
    AllPoints,
    /// Visit the symmetry-irreducible coarse points with their star sizes.
    Automatic,
}

/// Resolved visit plan.
#[derive(Debug, Clone)]
pub struct SelectedGridPoints {
    /// Ordered fine-mesh indices, no duplicates.
    pub points: Vec<usize>,
    /// Star multiplicity per point (all 1 outside automatic mode).
    pub weights: Vec<usize>,
}

#[derive(Debug, Error)]
pub enum SelectionError {
    /// The irreducible weights did not add up to the coarse-mesh size; the
    /// symmetry table and the mesh disagree.
    #[error("irreducible weights sum to {actual}, expected {expected} (coarse mesh size)")]
    WeightSumMismatch { expected: usize, actual: usize },
}

/// Resolve a selection against the folding and the point group.
///
/// `fine_grid_address` is the full fine-mesh address table from the phonon
/// kernel; only explicit mode consults it.
pub fn select_grid_points(
    folding: &MeshFolding,
    group: &PointGroup,
    selection: GridPointSelection<'_>,
    fine_grid_address: &[GridAddress],
) -> Result<SelectedGridPoints, SelectionError> {
    match selection {
        GridPointSelection::Explicit(requested) => {
            let points = folding.reduce_explicit_points(requested, fine_grid_address);
            let weights = vec![1; points.len()];
            Ok(SelectedGridPoints { points, weights })
        }
        GridPointSelection::AllPoints => {
            let coarse = folding.coarse_mesh();
            let coarse_address = grid_address(coarse);
            let coarse_points: Vec<usize> = (0..coarse.len()).collect();
            let points = folding.coarse_to_dense(&coarse_points, &coarse_address);
            let weights = vec![1; points.len()];
            Ok(SelectedGridPoints { points, weights })
        }
        GridPointSelection::Automatic => {
            let coarse = folding.coarse_mesh();
            let ir = ir_grid_points(coarse, group, folding.shifts());
            let expected = coarse.len();
            let actual: usize = ir.weights.iter().sum();
            if actual != expected {
                return Err(SelectionError::WeightSumMismatch { expected, actual });
            }
            let points = folding.coarse_to_dense(&ir.points, &ir.grid_address);
            Ok(SelectedGridPoints {
                points,
                weights: ir.weights,
            })
        }
    }
}
