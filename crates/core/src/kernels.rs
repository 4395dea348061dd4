//! Capability interfaces for the external physical kernels.
//!
//! The driver treats the phonon (interaction), imaginary-self-energy, and
//! isotope-scattering engines as black boxes behind these traits; their
//! failures propagate unmodified through [`KernelError`].

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lattice::PrimitiveCell;
use crate::mesh::{GridAddress, Mesh};
use crate::tensors::Tensor2;

/// Opaque kernel failure, passed through without interpretation.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct KernelError(pub Box<dyn std::error::Error + Send + Sync>);

impl KernelError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self(message.into().into())
    }

    pub fn from_err(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Box::new(err))
    }
}

pub type KernelResult<T> = Result<T, KernelError>;

/// Delta-function broadening for energy conservation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Smearing {
    /// Tetrahedron-method integration instead of Gaussian smearing.
    Tetrahedron,
    /// Gaussian smearing with the given width in THz.
    Gaussian(f64),
}

impl Smearing {
    pub fn is_tetrahedron(self) -> bool {
        matches!(self, Smearing::Tetrahedron)
    }
}

/// Frequencies and eigenvectors primed for a set of grid points.
///
/// Arrays are indexed by fine-mesh grid index; `done` marks which points the
/// kernel has actually solved.
#[derive(Debug, Clone)]
pub struct PhononSet {
    /// [fine_grid_index][band], in the kernel's native frequency unit.
    pub frequencies: Tensor2,
    /// [fine_grid_index][band][band], row-major eigenvector matrices.
    pub eigenvectors: Vec<Complex64>,
    pub done: Vec<bool>,
}

/// Phonon-phonon interaction engine (frequencies, eigenvectors, static
/// configuration).
pub trait PhononKernel {
    fn primitive(&self) -> PrimitiveCell;
    fn mesh_numbers(&self) -> Mesh;
    fn grid_address(&self) -> Vec<GridAddress>;
    /// Conversion from the kernel's native frequency unit to THz; the
    /// driver applies it when gathering frequencies.
    fn frequency_factor_to_thz(&self) -> f64;
    fn cutoff_frequency(&self) -> f64;

    /// Prime frequencies/eigenvectors for the given fine-mesh indices.
    /// Called exactly once per `initialize`.
    fn set_phonon(&mut self, grid_points: &[usize]) -> KernelResult<()>;
    fn phonons(&self) -> &PhononSet;

    /// Group velocity per band at a fractional q-point, from the dynamical
    /// matrix the kernel owns.
    fn group_velocities(&mut self, qpoint: [f64; 3]) -> KernelResult<Vec<[f64; 3]>>;
}

/// Imaginary-self-energy (ph-ph linewidth) engine.
pub trait SelfEnergyKernel {
    fn set_grid_point(&mut self, grid_point: usize) -> KernelResult<()>;
    fn set_sigma(&mut self, sigma: Smearing);
    /// Tetrahedron integration weights; called once per sigma, not per
    /// temperature.
    fn set_integration_weights(&mut self) -> KernelResult<()>;
    fn set_temperature(&mut self, temperature: f64);
    fn run(&mut self) -> KernelResult<()>;
    /// One value per band for the configured grid point, in THz.
    fn imag_self_energy(&self) -> &[f64];
}

/// Isotope-scattering engine (mass-variance channel).
pub trait IsotopeKernel {
    fn set_sigma(&mut self, sigma: Smearing);
    fn set_phonons(&mut self, phonons: &PhononSet);
    fn set_grid_point(&mut self, grid_point: usize) -> KernelResult<()>;
    fn run(&mut self) -> KernelResult<()>;
    /// One value per band, in THz.
    fn gamma(&self) -> &[f64];
}

/// Placeholder satisfying the isotope bound when isotope scattering is off.
/// The driver never calls it without mass variances configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIsotope;

impl IsotopeKernel for NoIsotope {
    fn set_sigma(&mut self, _sigma: Smearing) {}

    fn set_phonons(&mut self, _phonons: &PhononSet) {}

    fn set_grid_point(&mut self, _grid_point: usize) -> KernelResult<()> {
        Err(KernelError::msg("isotope scattering is not configured"))
    }

    fn run(&mut self) -> KernelResult<()> {
        Err(KernelError::msg("isotope scattering is not configured"))
    }

    fn gamma(&self) -> &[f64] {
        &[]
    }
}
