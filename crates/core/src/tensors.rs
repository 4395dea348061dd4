//! Contiguous flat-Vec storage for the per-grid-point result tensors.
//!
//! Shapes are fixed at allocation; the grid-point dimension never changes
//! afterwards. Indexing is row-major with the last axis fastest, and the
//! per-mode runs along the last axis are exposed as slices so the driver can
//! write one grid point's block in a single pass.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("externally supplied linewidth tensor has shape {actual:?}, expected {expected:?}")]
pub struct ShapeMismatch {
    pub expected: [usize; 4],
    pub actual: [usize; 4],
}

macro_rules! tensor_type {
    ($name:ident, $rank:expr) => {
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            shape: [usize; $rank],
            data: Vec<f64>,
        }

        impl $name {
            pub fn zeros(shape: [usize; $rank]) -> Self {
                Self {
                    data: vec![0.0; shape.iter().product()],
                    shape,
                }
            }

            pub fn from_vec(shape: [usize; $rank], data: Vec<f64>) -> Self {
                assert_eq!(
                    data.len(),
                    shape.iter().product::<usize>(),
                    "data length must match tensor shape"
                );
                Self { shape, data }
            }

            pub fn shape(&self) -> [usize; $rank] {
                self.shape
            }

            #[inline]
            fn offset(&self, index: [usize; $rank]) -> usize {
                let mut offset = 0;
                for axis in 0..$rank {
                    debug_assert!(index[axis] < self.shape[axis]);
                    offset = offset * self.shape[axis] + index[axis];
                }
                offset
            }

            #[inline]
            pub fn at(&self, index: [usize; $rank]) -> f64 {
                self.data[self.offset(index)]
            }

            #[inline]
            pub fn at_mut(&mut self, index: [usize; $rank]) -> &mut f64 {
                let offset = self.offset(index);
                &mut self.data[offset]
            }

            /// Slice covering the full last axis at the given leading index.
            pub fn run(&self, lead: [usize; $rank - 1]) -> &[f64] {
                let (start, len) = self.run_span(lead);
                &self.data[start..start + len]
            }

            pub fn run_mut(&mut self, lead: [usize; $rank - 1]) -> &mut [f64] {
                let (start, len) = self.run_span(lead);
                &mut self.data[start..start + len]
            }

            fn run_span(&self, lead: [usize; $rank - 1]) -> (usize, usize) {
                let mut full = [0usize; $rank];
                full[..$rank - 1].copy_from_slice(&lead);
                (self.offset(full), self.shape[$rank - 1])
            }

            pub fn as_slice(&self) -> &[f64] {
                &self.data
            }

            pub fn len(&self) -> usize {
                self.data.len()
            }

            pub fn is_empty(&self) -> bool {
                self.data.is_empty()
            }
        }
    };
}

tensor_type!(Tensor2, 2);
tensor_type!(Tensor3, 3);
tensor_type!(Tensor4, 4);
tensor_type!(Tensor5, 5);

/// Where the linewidth tensor came from. An external tensor is read-only for
/// the whole run; the driver never writes through it.
#[derive(Debug, Clone)]
pub enum LinewidthSource {
    Computed(Tensor4),
    External(Tensor4),
}

impl LinewidthSource {
    pub fn tensor(&self) -> &Tensor4 {
        match self {
            LinewidthSource::Computed(t) | LinewidthSource::External(t) => t,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, LinewidthSource::External(_))
    }

    /// Mutable access to the computed tensor; None when externally supplied.
    pub fn computed_mut(&mut self) -> Option<&mut Tensor4> {
        match self {
            LinewidthSource::Computed(t) => Some(t),
            LinewidthSource::External(_) => None,
        }
    }
}

/// All per-grid-point output tensors, allocated once per `initialize`.
#[derive(Debug, Clone)]
pub struct ResultTensorStore {
    /// Conductivity tensor, Voigt components: [sigma][gp][T][band][6].
    pub kappa: Tensor5,
    /// Phonon linewidth: [sigma][gp][T][band].
    pub gamma: LinewidthSource,
    /// Isotope-scattering linewidth (temperature independent): [sigma][gp][band].
    pub gamma_iso: Tensor3,
    /// Group velocity: [gp][band][3].
    pub gv: Tensor3,
    /// Mode heat capacity: [gp][T][band].
    pub cv: Tensor3,
}

impl ResultTensorStore {
    /// Zero-filled tensors for the given run dimensions. When a linewidth
    /// tensor was pre-supplied it becomes the backing store untouched; a
    /// shape mismatch fails here rather than mid-iteration.
    pub fn allocate(
        num_sigmas: usize,
        num_grid_points: usize,
        num_temperatures: usize,
        num_bands: usize,
        external_gamma: Option<Tensor4>,
    ) -> Result<Self, ShapeMismatch> {
        let gamma_shape = [num_sigmas, num_grid_points, num_temperatures, num_bands];
        let gamma = match external_gamma {
            Some(tensor) => {
                if tensor.shape() != gamma_shape {
                    return Err(ShapeMismatch {
                        expected: gamma_shape,
                        actual: tensor.shape(),
                    });
                }
                LinewidthSource::External(tensor)
            }
            None => LinewidthSource::Computed(Tensor4::zeros(gamma_shape)),
        };
        Ok(Self {
            kappa: Tensor5::zeros([
                num_sigmas,
                num_grid_points,
                num_temperatures,
                num_bands,
                6,
            ]),
            gamma,
            gamma_iso: Tensor3::zeros([num_sigmas, num_grid_points, num_bands]),
            gv: Tensor3::zeros([num_grid_points, num_bands, 3]),
            cv: Tensor3::zeros([num_grid_points, num_temperatures, num_bands]),
        })
    }
}
