//! Lattice thermal-conductivity driver (single-mode RTA).
//!
//! The driver owns the result tensors and walks the selected grid points as
//! an explicit state machine: `initialize` resolves the mesh folding and the
//! grid-point selection, then `step`/`run` process one point at a time,
//! invoking the external self-energy and isotope kernels per smearing width
//! and temperature and folding each point's contribution into the
//! conductivity tensor over its symmetry star.

use std::time::Instant;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::kernels::{
    IsotopeKernel, KernelError, NoIsotope, PhononKernel, SelfEnergyKernel, Smearing,
};
use crate::lattice::{matvec3, Mat3, PrimitiveCell};
use crate::mesh::{FoldingDiagnostic, GridAddress, Mesh, MeshFolding};
use crate::metrics::{MetricsEvent, MetricsRecorder, AXIS_NAMES};
use crate::selector::{select_grid_points, GridPointSelection, SelectedGridPoints, SelectionError};
use crate::symmetry::{star_order, PointGroup};
use crate::tensors::{ResultTensorStore, ShapeMismatch, Tensor2, Tensor3, Tensor4, Tensor5};
use crate::units::{mode_heat_capacity, THZ, UNIT_TO_WMK};

// ============================================================================
// Options
// ============================================================================

/// Run configuration with the documented defaults of the reference tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConductivityOptions {
    /// Temperature sweep in Kelvin. Default: 0..=1000 in steps of 10.
    pub temperatures: Vec<f64>,
    /// Smearing widths; each entry selects Gaussian broadening or the
    /// tetrahedron method. Default: tetrahedron only.
    pub sigmas: Vec<Smearing>,
    /// Optional coarsening divisors for the lifetime sampling mesh.
    pub mesh_divisors: Option<[usize; 3]>,
    /// Optional half-divisor shifts of the coarse mesh.
    pub coarse_mesh_shifts: Option<[bool; 3]>,
    /// Modes with lifetimes longer than this (seconds) are dropped from the
    /// conductivity sum.
    pub cutoff_lifetime: f64,
    /// Average over symmetry stars. Disabling forces the identity point
    /// group and visits every coarse point ("all points" mode).
    pub kappa_star_averaging: bool,
}

impl Default for ConductivityOptions {
    fn default() -> Self {
        Self {
            temperatures: (0..=100).map(|t| f64::from(t) * 10.0).collect(),
            sigmas: vec![Smearing::Tetrahedron],
            mesh_divisors: None,
            coarse_mesh_shifts: None,
            cutoff_lifetime: 1e-4,
            kappa_star_averaging: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Verbose,
}

impl Verbosity {
    fn enabled(self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

// ============================================================================
// Errors and step outcome
// ============================================================================

/// Driver-level errors. Kernel failures pass through unmodified.
#[derive(Debug, thiserror::Error)]
pub enum ConductivityError {
    #[error("driver is not initialized")]
    NotInitialized,

    #[error("linewidth tensor can only be supplied before initialize")]
    GammaAfterInitialize,

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    GammaShape(#[from] ShapeMismatch),

    #[error(transparent)]
    Kernel(#[from] KernelError),
}

/// Result of one `step` call. Exhaustion is a normal terminal signal, not a
/// failure; repeated steps in the exhausted state stay no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Processed the grid point at this position in the selected sequence.
    Progressed(usize),
    /// All selected grid points have been processed.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Uninitialized,
    Ready,
    Running,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SelectionMode {
    Explicit,
    AllPoints,
    Automatic,
}

// ============================================================================
// Driver
// ============================================================================

/// Stateful cursor over the selected grid points.
///
/// Generic over the phonon, self-energy, and isotope kernel implementations;
/// the isotope parameter defaults to [`NoIsotope`] for runs without isotope
/// scattering.
pub struct Conductivity<P: PhononKernel, S: SelfEnergyKernel, I: IsotopeKernel = NoIsotope> {
    pp: P,
    self_energy: S,
    isotope: Option<I>,
    mass_variances: Option<Vec<f64>>,
    options: ConductivityOptions,
    verbosity: Verbosity,

    primitive: PrimitiveCell,
    conversion_factor: f64,
    point_group: PointGroup,
    rotations_cartesian: Vec<Mat3>,
    folding: MeshFolding,

    state: DriverState,
    mode: SelectionMode,
    selected: Option<SelectedGridPoints>,
    grid_address: Vec<GridAddress>,
    qpoints: Vec<[f64; 3]>,
    frequencies: Option<Tensor2>,
    store: Option<ResultTensorStore>,
    staged_gamma: Option<Tensor4>,
    grid_point_count: usize,
    sum_num_kstar: usize,
}

impl<P: PhononKernel, S: SelfEnergyKernel, I: IsotopeKernel> Conductivity<P, S, I> {
    pub fn new(
        pp: P,
        self_energy: S,
        symmetry: PointGroup,
        options: ConductivityOptions,
    ) -> Self {
        let primitive = pp.primitive();
        let point_group = if options.kappa_star_averaging {
            symmetry
        } else {
            PointGroup::identity()
        };
        let rec_lat = primitive.lattice.reciprocal();
        let rotations_cartesian = point_group.rotations_cartesian(&rec_lat);
        let folding = MeshFolding::new(
            pp.mesh_numbers(),
            options.mesh_divisors,
            options.coarse_mesh_shifts,
        );
        debug!(
            "lifetime sampling mesh: {:?}",
            folding.coarse_mesh().0
        );
        let conversion_factor = UNIT_TO_WMK / primitive.lattice.volume();
        Self {
            pp,
            self_energy,
            isotope: None,
            mass_variances: None,
            options,
            verbosity: Verbosity::Quiet,
            primitive,
            conversion_factor,
            point_group,
            rotations_cartesian,
            folding,
            state: DriverState::Uninitialized,
            mode: SelectionMode::Automatic,
            selected: None,
            grid_address: Vec::new(),
            qpoints: Vec::new(),
            frequencies: None,
            store: None,
            staged_gamma: None,
            grid_point_count: 0,
            sum_num_kstar: 0,
        }
    }

    /// Attach an isotope-scattering kernel. The mass-variance array (one
    /// entry per atom of the primitive cell) gates all isotope work.
    pub fn with_isotope(mut self, kernel: I, mass_variances: Vec<f64>) -> Self {
        self.isotope = Some(kernel);
        self.mass_variances = Some(mass_variances);
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Pre-supply the linewidth tensor. The driver then never computes or
    /// overwrites gamma; only isotope and conductivity accumulation run.
    /// The tensor stays staged, so re-initialization keeps the run in
    /// external mode (re-validating the shape against the new selection).
    pub fn set_gamma(&mut self, gamma: Tensor4) -> Result<(), ConductivityError> {
        if self.state != DriverState::Uninitialized {
            return Err(ConductivityError::GammaAfterInitialize);
        }
        self.staged_gamma = Some(gamma);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Resolve the grid-point selection, allocate the result tensors, and
    /// prime the phonon kernel. Uninitialized -> Ready.
    pub fn initialize(
        &mut self,
        grid_points: Option<&[usize]>,
        metrics: Option<&MetricsRecorder>,
    ) -> Result<(), ConductivityError> {
        self.grid_address = self.pp.grid_address();
        let (selection, mode) = match grid_points {
            Some(points) => (GridPointSelection::Explicit(points), SelectionMode::Explicit),
            None if !self.options.kappa_star_averaging => {
                (GridPointSelection::AllPoints, SelectionMode::AllPoints)
            }
            None => (GridPointSelection::Automatic, SelectionMode::Automatic),
        };
        let selected = select_grid_points(
            &self.folding,
            &self.point_group,
            selection,
            &self.grid_address,
        )?;
        self.mode = mode;

        let mesh = self.folding.mesh();
        self.qpoints = selected
            .points
            .iter()
            .map(|&gp| {
                let addr = self.grid_address[gp];
                [
                    addr[0] as f64 / mesh.0[0] as f64,
                    addr[1] as f64 / mesh.0[1] as f64,
                    addr[2] as f64 / mesh.0[2] as f64,
                ]
            })
            .collect();

        let num_bands = self.primitive.num_bands();
        let store = ResultTensorStore::allocate(
            self.options.sigmas.len(),
            selected.points.len(),
            self.options.temperatures.len(),
            num_bands,
            self.staged_gamma.clone(),
        )?;

        self.pp.set_phonon(&selected.points)?;
        let factor = self.pp.frequency_factor_to_thz();
        let phonons = self.pp.phonons();
        let mut frequencies =
            Tensor2::zeros([selected.points.len(), num_bands]);
        for (i, &gp) in selected.points.iter().enumerate() {
            let row = frequencies.run_mut([i]);
            row.copy_from_slice(phonons.frequencies.run([gp]));
            for freq in row.iter_mut() {
                *freq *= factor;
            }
        }

        if let Some(recorder) = metrics {
            for diagnostic in self.folding.diagnostics() {
                recorder.emit(match *diagnostic {
                    FoldingDiagnostic::DivisorFallback {
                        axis,
                        mesh_number,
                        divisor,
                    } => MetricsEvent::DivisorFallback {
                        axis: AXIS_NAMES[axis],
                        mesh_number,
                        divisor,
                    },
                    FoldingDiagnostic::ShiftDisabled { axis, divisor } => {
                        MetricsEvent::ShiftDisabled {
                            axis: AXIS_NAMES[axis],
                            divisor,
                        }
                    }
                });
            }
            recorder.emit(MetricsEvent::InitStart {
                mesh: mesh.0,
                mesh_divisors: self.folding.divisors(),
                coarse_mesh: self.folding.coarse_mesh().0,
                grid_points: selected.points.len(),
                sigmas: self.options.sigmas.len(),
                temperatures: self.options.temperatures.len(),
                bands: num_bands,
            });
        }
        if self.verbosity.enabled() {
            eprintln!(
                "[init] mesh={:?} divisors={:?} coarse={:?} grid_points={} sigmas={} temps={} bands={}",
                mesh.0,
                self.folding.divisors(),
                self.folding.coarse_mesh().0,
                selected.points.len(),
                self.options.sigmas.len(),
                self.options.temperatures.len(),
                num_bands
            );
        }

        self.frequencies = Some(frequencies);
        self.store = Some(store);
        self.selected = Some(selected);
        self.grid_point_count = 0;
        self.sum_num_kstar = 0;
        self.state = DriverState::Ready;
        Ok(())
    }

    /// Process the next selected grid point, or signal exhaustion.
    pub fn step(&mut self) -> Result<StepOutcome, ConductivityError> {
        self.step_with_metrics(None)
    }

    pub fn step_with_metrics(
        &mut self,
        metrics: Option<&MetricsRecorder>,
    ) -> Result<StepOutcome, ConductivityError> {
        let total = match self.selected.as_ref() {
            None => return Err(ConductivityError::NotInitialized),
            Some(selected) => selected.points.len(),
        };
        if self.grid_point_count >= total {
            self.state = DriverState::Done;
            return Ok(StepOutcome::Exhausted);
        }
        let index = self.grid_point_count;
        self.run_at_grid_point(index, metrics)?;
        self.grid_point_count += 1;
        self.state = if self.grid_point_count == total {
            DriverState::Done
        } else {
            DriverState::Running
        };
        Ok(StepOutcome::Progressed(index))
    }

    /// Drive the iterator to completion. Equivalent to stepping until
    /// [`StepOutcome::Exhausted`].
    pub fn run(&mut self) -> Result<(), ConductivityError> {
        self.run_with_metrics(None)
    }

    pub fn run_with_metrics(
        &mut self,
        metrics: Option<&MetricsRecorder>,
    ) -> Result<(), ConductivityError> {
        let start = Instant::now();
        loop {
            match self.step_with_metrics(metrics)? {
                StepOutcome::Progressed(_) => {}
                StepOutcome::Exhausted => break,
            }
        }
        if let Some(recorder) = metrics {
            recorder.emit(MetricsEvent::PipelineDone {
                grid_points: self.grid_point_count,
                sampling_points: self.sum_num_kstar,
                duration_ms: start.elapsed().as_secs_f64() * 1000.0,
            });
        }
        if self.verbosity.enabled() {
            eprintln!(
                "[done] processed {} grid points ({} sampling points) in {:.2?}",
                self.grid_point_count,
                self.sum_num_kstar,
                start.elapsed()
            );
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Per-point processing
    // ------------------------------------------------------------------------

    fn run_at_grid_point(
        &mut self,
        index: usize,
        metrics: Option<&MetricsRecorder>,
    ) -> Result<(), ConductivityError> {
        let timer = Instant::now();
        let gp = self.selected.as_ref().expect("initialized").points[index];

        if !self.store.as_ref().expect("initialized").gamma.is_external() {
            self.set_gamma_at_sigmas(index, gp)?;
        }
        if self.mass_variances.is_some() {
            self.set_gamma_isotope_at_sigmas(index, gp)?;
        }
        self.set_gv_and_cv(index)?;
        let order_kstar = self.accumulate_kappa(index, gp);

        self.sum_num_kstar += order_kstar;
        let weight = self.selected.as_ref().expect("initialized").weights[index];
        if self.mode == SelectionMode::Automatic && order_kstar != weight {
            warn!(
                "number of k-star members {} is unequal to the grid weight {} at grid point {}",
                order_kstar, weight, gp
            );
        }

        if self.verbosity.enabled() {
            let q = self.qpoints[index];
            eprintln!(
                "[solve] gp#{:04} grid_point={} q=({:+.4},{:+.4},{:+.4}) weight={} kstar={} elapsed={:.2?}",
                index,
                gp,
                q[0],
                q[1],
                q[2],
                weight,
                order_kstar,
                timer.elapsed()
            );
        }
        if let Some(recorder) = metrics {
            recorder.emit(MetricsEvent::GridPointSolve {
                index,
                grid_point: gp,
                weight,
                order_kstar,
                duration_ms: timer.elapsed().as_secs_f64() * 1000.0,
            });
        }
        Ok(())
    }

    fn set_gamma_at_sigmas(&mut self, index: usize, gp: usize) -> Result<(), ConductivityError> {
        self.self_energy.set_grid_point(gp)?;
        for (j, &sigma) in self.options.sigmas.iter().enumerate() {
            debug!("calculating ph-ph gamma with {:?}", sigma);
            self.self_energy.set_sigma(sigma);
            if sigma.is_tetrahedron() {
                self.self_energy.set_integration_weights()?;
            }
            for (k, &temperature) in self.options.temperatures.iter().enumerate() {
                self.self_energy.set_temperature(temperature);
                self.self_energy.run()?;
                let values = self.self_energy.imag_self_energy();
                self.store
                    .as_mut()
                    .expect("initialized")
                    .gamma
                    .computed_mut()
                    .expect("external gamma is never recomputed")
                    .run_mut([j, index, k])
                    .copy_from_slice(values);
            }
        }
        Ok(())
    }

    fn set_gamma_isotope_at_sigmas(
        &mut self,
        index: usize,
        gp: usize,
    ) -> Result<(), ConductivityError> {
        let isotope = match self.isotope.as_mut() {
            Some(isotope) => isotope,
            None => return Ok(()),
        };
        for (j, &sigma) in self.options.sigmas.iter().enumerate() {
            debug!("calculating ph-isotope gamma with {:?}", sigma);
            isotope.set_sigma(sigma);
            isotope.set_phonons(self.pp.phonons());
            isotope.set_grid_point(gp)?;
            isotope.run()?;
            self.store
                .as_mut()
                .expect("initialized")
                .gamma_iso
                .run_mut([j, index])
                .copy_from_slice(isotope.gamma());
        }
        Ok(())
    }

    fn set_gv_and_cv(&mut self, index: usize) -> Result<(), ConductivityError> {
        let qpoint = self.qpoints[index];
        let velocities = self.pp.group_velocities(qpoint)?;
        let cutoff = self.pp.cutoff_frequency();
        let store = self.store.as_mut().expect("initialized");
        for (band, v) in velocities.iter().enumerate() {
            store.gv.run_mut([index, band]).copy_from_slice(v);
        }
        let frequencies = self.frequencies.as_ref().expect("initialized");
        let num_bands = self.primitive.num_bands();
        for (k, &temperature) in self.options.temperatures.iter().enumerate() {
            for band in 0..num_bands {
                let freq = frequencies.at([index, band]);
                let cv = if freq > cutoff {
                    mode_heat_capacity(temperature, freq)
                } else {
                    0.0
                };
                *store.cv.at_mut([index, k, band]) = cv;
            }
        }
        Ok(())
    }

    /// Fold this point's contribution into kappa over its symmetry star and
    /// return the star order.
    fn accumulate_kappa(&mut self, index: usize, gp: usize) -> usize {
        let mesh = self.folding.mesh();
        let addr = self.grid_address[gp];
        let order_kstar = star_order(addr, mesh, &self.point_group);
        let num_rotations = self.rotations_cartesian.len();
        let star_scale = order_kstar as f64 / num_rotations as f64;
        let num_bands = self.primitive.num_bands();
        // Keep only modes scattering faster than the lifetime cutoff.
        let gamma_floor = 1.0 / (2.0 * std::f64::consts::TAU * self.options.cutoff_lifetime * THZ);
        let with_isotope = self.mass_variances.is_some();

        let store = self.store.as_mut().expect("initialized");

        // Summed outer products of the rotated group velocities: equals the
        // sum over the star members of this irreducible point.
        let mut gv_by_gv = vec![[0.0f64; 6]; num_bands];
        for (band, outer) in gv_by_gv.iter_mut().enumerate() {
            let gv_run = store.gv.run([index, band]);
            let gv = [gv_run[0], gv_run[1], gv_run[2]];
            for rotation in &self.rotations_cartesian {
                let r = matvec3(rotation, &gv);
                outer[0] += r[0] * r[0];
                outer[1] += r[1] * r[1];
                outer[2] += r[2] * r[2];
                outer[3] += r[1] * r[2];
                outer[4] += r[0] * r[2];
                outer[5] += r[0] * r[1];
            }
            for component in outer.iter_mut() {
                *component *= star_scale;
            }
        }

        for j in 0..self.options.sigmas.len() {
            for k in 0..self.options.temperatures.len() {
                for band in 0..num_bands {
                    let mut gamma = store.gamma.tensor().at([j, index, k, band]);
                    if with_isotope {
                        gamma += store.gamma_iso.at([j, index, band]);
                    }
                    if gamma <= gamma_floor {
                        continue;
                    }
                    let cv = store.cv.at([index, k, band]);
                    let prefactor = cv / (2.0 * gamma) * self.conversion_factor;
                    let dest = store.kappa.run_mut([j, index, k, band]);
                    for (component, &outer) in dest.iter_mut().zip(gv_by_gv[band].iter()) {
                        *component = prefactor * outer;
                    }
                }
            }
        }
        order_kstar
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn mesh_numbers(&self) -> Mesh {
        self.folding.mesh()
    }

    pub fn mesh_divisors(&self) -> [usize; 3] {
        self.folding.divisors()
    }

    pub fn temperatures(&self) -> &[f64] {
        &self.options.temperatures
    }

    pub fn sigmas(&self) -> &[Smearing] {
        &self.options.sigmas
    }

    pub fn grid_points(&self) -> Option<&[usize]> {
        self.selected.as_ref().map(|s| s.points.as_slice())
    }

    pub fn grid_weights(&self) -> Option<&[usize]> {
        self.selected.as_ref().map(|s| s.weights.as_slice())
    }

    pub fn qpoints(&self) -> &[[f64; 3]] {
        &self.qpoints
    }

    /// Frequencies at the selected grid points, [point][band].
    pub fn frequencies(&self) -> Option<&Tensor2> {
        self.frequencies.as_ref()
    }

    pub fn group_velocities(&self) -> Option<&Tensor3> {
        self.store.as_ref().map(|s| &s.gv)
    }

    pub fn mode_heat_capacities(&self) -> Option<&Tensor3> {
        self.store.as_ref().map(|s| &s.cv)
    }

    pub fn gamma(&self) -> Option<&Tensor4> {
        self.store.as_ref().map(|s| s.gamma.tensor())
    }

    pub fn gamma_isotope(&self) -> Option<&Tensor3> {
        self.store.as_ref().map(|s| &s.gamma_iso)
    }

    pub fn kappa(&self) -> Option<&Tensor5> {
        self.store.as_ref().map(|s| &s.kappa)
    }

    pub fn mass_variances(&self) -> Option<&[f64]> {
        self.mass_variances.as_deref()
    }

    /// Running total of sampled star members; 0 before any step.
    pub fn number_of_sampling_points(&self) -> usize {
        self.sum_num_kstar
    }

    /// Authoritative count of grid points actually processed.
    pub fn grid_point_count(&self) -> usize {
        self.grid_point_count
    }
}
