#![cfg(test)]

use std::cell::Cell;
use std::f64::consts::TAU;
use std::rc::Rc;

use num_complex::Complex64;

use super::conductivity::{
    Conductivity, ConductivityError, ConductivityOptions, DriverState, StepOutcome,
};
use super::kernels::{
    IsotopeKernel, KernelResult, PhononKernel, PhononSet, SelfEnergyKernel, Smearing,
};
use super::lattice::{Lattice3D, PrimitiveCell};
use super::mesh::{grid_address, GridAddress, Mesh};
use super::symmetry::{PointGroup, Rotation, IDENTITY};
use super::tensors::{Tensor2, Tensor4, Tensor5};

const MIRROR_X: Rotation = [[-1, 0, 0], [0, 1, 0], [0, 0, 1]];

const BANDS: usize = 3;

// ============================================================================
// Mock kernels
// ============================================================================

struct MockPhonon {
    mesh: Mesh,
    address: Vec<GridAddress>,
    phonons: PhononSet,
    factor: f64,
    set_phonon_calls: Rc<Cell<usize>>,
}

impl MockPhonon {
    fn new(mesh: [usize; 3]) -> Self {
        let mesh = Mesh(mesh);
        let address = grid_address(mesh);
        let phonons = PhononSet {
            frequencies: Tensor2::zeros([mesh.len(), BANDS]),
            eigenvectors: vec![Complex64::new(0.0, 0.0); mesh.len() * BANDS * BANDS],
            done: vec![false; mesh.len()],
        };
        Self {
            mesh,
            address,
            phonons,
            factor: 1.0,
            set_phonon_calls: Rc::new(Cell::new(0)),
        }
    }

    /// Frequency model symmetric under q -> -q, distinct per band.
    fn frequency(&self, gp: usize, band: usize) -> f64 {
        let q0 = self.address[gp][0] as f64 / self.mesh.0[0] as f64;
        (band as f64 + 1.0) * (2.0 + (TAU * q0).cos())
    }
}

impl PhononKernel for MockPhonon {
    fn primitive(&self) -> PrimitiveCell {
        PrimitiveCell {
            lattice: Lattice3D::cubic(1.0),
            num_atoms: 1,
        }
    }

    fn mesh_numbers(&self) -> Mesh {
        self.mesh
    }

    fn grid_address(&self) -> Vec<GridAddress> {
        self.address.clone()
    }

    fn frequency_factor_to_thz(&self) -> f64 {
        self.factor
    }

    fn cutoff_frequency(&self) -> f64 {
        1e-4
    }

    fn set_phonon(&mut self, grid_points: &[usize]) -> KernelResult<()> {
        self.set_phonon_calls.set(self.set_phonon_calls.get() + 1);
        for &gp in grid_points {
            for band in 0..BANDS {
                *self.phonons.frequencies.at_mut([gp, band]) = self.frequency(gp, band);
            }
            self.phonons.done[gp] = true;
        }
        Ok(())
    }

    fn phonons(&self) -> &PhononSet {
        &self.phonons
    }

    fn group_velocities(&mut self, qpoint: [f64; 3]) -> KernelResult<Vec<[f64; 3]>> {
        // Odd x-component, even y-component: consistent with the mirror
        // symmetry the tests use.
        Ok((0..BANDS)
            .map(|band| {
                let scale = band as f64 + 1.0;
                [scale * (TAU * qpoint[0]).sin(), 0.3 * scale, 0.0]
            })
            .collect())
    }
}

struct MockSelfEnergy {
    sigma: Option<Smearing>,
    temperature: f64,
    grid_point: usize,
    scale: f64,
    values: Vec<f64>,
    run_calls: Rc<Cell<usize>>,
    weight_calls: Rc<Cell<usize>>,
}

impl MockSelfEnergy {
    fn new(scale: f64) -> Self {
        Self {
            sigma: None,
            temperature: 0.0,
            grid_point: 0,
            scale,
            values: vec![0.0; BANDS],
            run_calls: Rc::new(Cell::new(0)),
            weight_calls: Rc::new(Cell::new(0)),
        }
    }
}

impl SelfEnergyKernel for MockSelfEnergy {
    fn set_grid_point(&mut self, grid_point: usize) -> KernelResult<()> {
        self.grid_point = grid_point;
        Ok(())
    }

    fn set_sigma(&mut self, sigma: Smearing) {
        self.sigma = Some(sigma);
    }

    fn set_integration_weights(&mut self) -> KernelResult<()> {
        self.weight_calls.set(self.weight_calls.get() + 1);
        Ok(())
    }

    fn set_temperature(&mut self, temperature: f64) {
        self.temperature = temperature;
    }

    fn run(&mut self) -> KernelResult<()> {
        assert!(self.sigma.is_some(), "sigma must be configured before run");
        self.run_calls.set(self.run_calls.get() + 1);
        for (band, value) in self.values.iter_mut().enumerate() {
            *value = self.scale * (band as f64 + 1.0) * (1.0 + 0.001 * self.temperature);
        }
        Ok(())
    }

    fn imag_self_energy(&self) -> &[f64] {
        &self.values
    }
}

struct MockIsotope {
    values: Vec<f64>,
    run_calls: Rc<Cell<usize>>,
}

impl MockIsotope {
    fn new() -> Self {
        Self {
            values: vec![0.0; BANDS],
            run_calls: Rc::new(Cell::new(0)),
        }
    }
}

impl IsotopeKernel for MockIsotope {
    fn set_sigma(&mut self, _sigma: Smearing) {}

    fn set_phonons(&mut self, phonons: &PhononSet) {
        assert!(phonons.done.iter().any(|&d| d), "phonons must be primed");
    }

    fn set_grid_point(&mut self, _grid_point: usize) -> KernelResult<()> {
        Ok(())
    }

    fn run(&mut self) -> KernelResult<()> {
        self.run_calls.set(self.run_calls.get() + 1);
        for (band, value) in self.values.iter_mut().enumerate() {
            *value = 0.02 * (band as f64 + 1.0);
        }
        Ok(())
    }

    fn gamma(&self) -> &[f64] {
        &self.values
    }
}

fn options(temperatures: Vec<f64>, sigmas: Vec<Smearing>) -> ConductivityOptions {
    ConductivityOptions {
        temperatures,
        sigmas,
        ..ConductivityOptions::default()
    }
}

fn driver(
    mesh: [usize; 3],
    symmetry: PointGroup,
    options: ConductivityOptions,
) -> Conductivity<MockPhonon, MockSelfEnergy> {
    Conductivity::new(
        MockPhonon::new(mesh),
        MockSelfEnergy::new(0.05),
        symmetry,
        options,
    )
}

/// Sum kappa over the grid-point axis: [sigma][T][band][component] totals.
fn aggregate_kappa(kappa: &Tensor5) -> Vec<f64> {
    let [ns, ngp, nt, nb, nc] = kappa.shape();
    let mut totals = vec![0.0; ns * nt * nb * nc];
    for j in 0..ns {
        for i in 0..ngp {
            for k in 0..nt {
                for b in 0..nb {
                    for c in 0..nc {
                        totals[((j * nt + k) * nb + b) * nc + c] += kappa.at([j, i, k, b, c]);
                    }
                }
            }
        }
    }
    totals
}

// ============================================================================
// Literal scenario and lifecycle
// ============================================================================

#[test]
fn four_cubed_identity_mesh_visits_all_64_points() {
    let opts = options(vec![0.0, 300.0], vec![Smearing::Tetrahedron]);
    let mut driver = driver([4, 4, 4], PointGroup::identity(), opts);
    driver.initialize(None, None).unwrap();

    let points = driver.grid_points().unwrap();
    assert_eq!(points.len(), 64);
    assert_eq!(points, (0..64).collect::<Vec<_>>().as_slice());
    assert!(driver.grid_weights().unwrap().iter().all(|&w| w == 1));
    assert_eq!(driver.number_of_sampling_points(), 0);
    assert_eq!(driver.grid_point_count(), 0);
    assert_eq!(driver.state(), DriverState::Ready);

    driver.run().unwrap();
    assert_eq!(driver.grid_point_count(), 64);
    assert_eq!(driver.number_of_sampling_points(), 64);
    assert_eq!(driver.state(), DriverState::Done);
}

#[test]
fn step_before_initialize_is_an_error() {
    let opts = options(vec![300.0], vec![Smearing::Gaussian(0.1)]);
    let mut driver = driver([2, 2, 2], PointGroup::identity(), opts);
    assert!(matches!(
        driver.step(),
        Err(ConductivityError::NotInitialized)
    ));
}

#[test]
fn exhaustion_is_terminal_and_idempotent() {
    let opts = options(vec![300.0], vec![Smearing::Gaussian(0.1)]);
    let mut driver = driver([2, 1, 1], PointGroup::identity(), opts);
    driver.initialize(None, None).unwrap();

    assert_eq!(driver.step().unwrap(), StepOutcome::Progressed(0));
    assert_eq!(driver.state(), DriverState::Running);
    assert_eq!(driver.step().unwrap(), StepOutcome::Progressed(1));
    assert_eq!(driver.state(), DriverState::Done);

    let snapshot = driver.kappa().unwrap().clone();
    for _ in 0..3 {
        assert_eq!(driver.step().unwrap(), StepOutcome::Exhausted);
    }
    assert_eq!(driver.kappa().unwrap(), &snapshot);
    assert_eq!(driver.grid_point_count(), 2);
}

#[test]
fn run_equals_manual_stepping() {
    let opts = options(vec![100.0, 300.0], vec![Smearing::Gaussian(0.2)]);
    let mut a = driver([3, 2, 1], PointGroup::identity(), opts.clone());
    let mut b = driver([3, 2, 1], PointGroup::identity(), opts);
    a.initialize(None, None).unwrap();
    b.initialize(None, None).unwrap();

    a.run().unwrap();
    while b.step().unwrap() != StepOutcome::Exhausted {}

    assert_eq!(a.kappa().unwrap(), b.kappa().unwrap());
    assert_eq!(a.gamma().unwrap(), b.gamma().unwrap());
    assert_eq!(a.number_of_sampling_points(), b.number_of_sampling_points());
}

// ============================================================================
// Per-point computation
// ============================================================================

#[test]
fn every_slice_is_written_exactly_once() {
    let pp = MockPhonon::new([2, 2, 2]);
    let ise = MockSelfEnergy::new(0.05);
    let run_calls = ise.run_calls.clone();
    let weight_calls = ise.weight_calls.clone();
    let opts = options(vec![100.0, 300.0], vec![Smearing::Tetrahedron]);
    let mut driver: Conductivity<_, _> =
        Conductivity::new(pp, ise, PointGroup::identity(), opts);
    driver.initialize(None, None).unwrap();
    driver.run().unwrap();

    // 8 points x 1 sigma x 2 temperatures.
    assert_eq!(run_calls.get(), 16);
    // Integration weights once per sigma per point, not per temperature.
    assert_eq!(weight_calls.get(), 8);

    let gamma = driver.gamma().unwrap();
    assert!(gamma.as_slice().iter().all(|&g| g > 0.0));
    let cv = driver.mode_heat_capacities().unwrap();
    assert!(cv.as_slice().iter().all(|&v| v > 0.0));
    let kappa = driver.kappa().unwrap();
    let [ns, ngp, nt, nb, _] = kappa.shape();
    for j in 0..ns {
        for i in 0..ngp {
            for k in 0..nt {
                for b in 0..nb {
                    // The diagonal yy component is nonzero for every mode of
                    // the mock (gv_y never vanishes).
                    assert!(kappa.at([j, i, k, b, 1]) > 0.0);
                }
            }
        }
    }
}

#[test]
fn gaussian_sigma_never_requests_integration_weights() {
    let pp = MockPhonon::new([2, 1, 1]);
    let ise = MockSelfEnergy::new(0.05);
    let weight_calls = ise.weight_calls.clone();
    let opts = options(vec![300.0], vec![Smearing::Gaussian(0.1)]);
    let mut driver: Conductivity<_, _> =
        Conductivity::new(pp, ise, PointGroup::identity(), opts);
    driver.initialize(None, None).unwrap();
    driver.run().unwrap();
    assert_eq!(weight_calls.get(), 0);
}

#[test]
fn phonon_kernel_is_primed_exactly_once() {
    let pp = MockPhonon::new([2, 2, 1]);
    let calls = pp.set_phonon_calls.clone();
    let ise = MockSelfEnergy::new(0.05);
    let opts = options(vec![300.0], vec![Smearing::Gaussian(0.1)]);
    let mut driver: Conductivity<_, _> =
        Conductivity::new(pp, ise, PointGroup::identity(), opts);
    driver.initialize(None, None).unwrap();
    driver.run().unwrap();
    assert_eq!(calls.get(), 1);
}

#[test]
fn frequencies_are_gathered_at_selected_points() {
    let opts = options(vec![300.0], vec![Smearing::Gaussian(0.1)]);
    let mut driver = driver([4, 1, 1], PointGroup::identity(), opts);
    driver.initialize(None, None).unwrap();
    let freqs = driver.frequencies().unwrap();
    assert_eq!(freqs.shape(), [4, BANDS]);
    // q = 0 has the band maximum 3.0 * (band + 1) of the mock model.
    assert!((freqs.at([0, 0]) - 3.0).abs() < 1e-12);
    assert!((freqs.at([0, 2]) - 9.0).abs() < 1e-12);
    // q = 1/2 sits at the band minimum.
    assert!((freqs.at([2, 0]) - 1.0).abs() < 1e-12);
}

#[test]
fn frequency_factor_converts_gathered_frequencies_to_thz() {
    let mut pp = MockPhonon::new([2, 1, 1]);
    pp.factor = 2.0;
    let ise = MockSelfEnergy::new(0.05);
    let opts = options(vec![300.0], vec![Smearing::Gaussian(0.1)]);
    let mut driver: Conductivity<_, _> =
        Conductivity::new(pp, ise, PointGroup::identity(), opts);
    driver.initialize(None, None).unwrap();
    let freqs = driver.frequencies().unwrap();
    // Kernel-native 3.0 * (band + 1) at q = 0, doubled on the way in.
    assert!((freqs.at([0, 0]) - 6.0).abs() < 1e-12);
    assert!((freqs.at([0, 2]) - 18.0).abs() < 1e-12);
}

#[test]
fn vanishing_linewidth_contributes_no_kappa() {
    let pp = MockPhonon::new([2, 1, 1]);
    let ise = MockSelfEnergy::new(0.0);
    let opts = options(vec![300.0], vec![Smearing::Gaussian(0.1)]);
    let mut driver: Conductivity<_, _> =
        Conductivity::new(pp, ise, PointGroup::identity(), opts);
    driver.initialize(None, None).unwrap();
    driver.run().unwrap();
    assert!(driver.kappa().unwrap().as_slice().iter().all(|&v| v == 0.0));
}

#[test]
fn kappa_voigt_block_is_consistent_with_gv_outer_product() {
    let opts = options(vec![300.0], vec![Smearing::Gaussian(0.1)]);
    let mut driver = driver([4, 1, 1], PointGroup::identity(), opts);
    driver.initialize(None, None).unwrap();
    driver.run().unwrap();
    let kappa = driver.kappa().unwrap();
    // With identity symmetry the off-diagonal xy component is
    // gv_x * gv_y scaled by the same prefactor as the diagonals.
    let i = 1; // q = 1/4, gv_x > 0
    for band in 0..BANDS {
        let xx = kappa.at([0, i, 0, band, 0]);
        let yy = kappa.at([0, i, 0, band, 1]);
        let xy = kappa.at([0, i, 0, band, 5]);
        assert!(xx > 0.0 && yy > 0.0);
        assert!((xy * xy - xx * yy).abs() < 1e-10 * xx * yy.max(1.0));
    }
}

// ============================================================================
// External gamma
// ============================================================================

#[test]
fn external_gamma_is_never_overwritten() {
    let pp = MockPhonon::new([2, 2, 1]);
    let ise = MockSelfEnergy::new(0.05);
    let run_calls = ise.run_calls.clone();
    let opts = options(vec![300.0], vec![Smearing::Gaussian(0.1)]);
    let mut driver: Conductivity<_, _> =
        Conductivity::new(pp, ise, PointGroup::identity(), opts);

    let data: Vec<f64> = (0..4 * BANDS).map(|v| 0.5 + v as f64 * 0.01).collect();
    let external = Tensor4::from_vec([1, 4, 1, BANDS], data.clone());
    driver.set_gamma(external).unwrap();
    driver.initialize(None, None).unwrap();
    driver.run().unwrap();

    // The self-energy kernel never ran; gamma is bit-identical.
    assert_eq!(run_calls.get(), 0);
    assert_eq!(driver.gamma().unwrap().as_slice(), data.as_slice());
    // Conductivity accumulation still executed.
    assert!(driver.kappa().unwrap().as_slice().iter().any(|&v| v > 0.0));
}

#[test]
fn external_gamma_survives_reinitialize() {
    let pp = MockPhonon::new([2, 2, 1]);
    let ise = MockSelfEnergy::new(0.05);
    let run_calls = ise.run_calls.clone();
    let opts = options(vec![300.0], vec![Smearing::Gaussian(0.1)]);
    let mut driver: Conductivity<_, _> =
        Conductivity::new(pp, ise, PointGroup::identity(), opts);

    let data: Vec<f64> = (0..4 * BANDS).map(|v| 0.5 + v as f64 * 0.01).collect();
    driver
        .set_gamma(Tensor4::from_vec([1, 4, 1, BANDS], data.clone()))
        .unwrap();
    driver.initialize(None, None).unwrap();
    driver.run().unwrap();

    // A second initialize stays in external mode.
    driver.initialize(None, None).unwrap();
    driver.run().unwrap();
    assert_eq!(run_calls.get(), 0);
    assert_eq!(driver.gamma().unwrap().as_slice(), data.as_slice());
}

#[test]
fn external_gamma_with_wrong_shape_fails_at_initialize() {
    let opts = options(vec![300.0], vec![Smearing::Gaussian(0.1)]);
    let mut driver = driver([2, 2, 1], PointGroup::identity(), opts);
    driver
        .set_gamma(Tensor4::zeros([1, 3, 1, BANDS]))
        .unwrap();
    assert!(matches!(
        driver.initialize(None, None),
        Err(ConductivityError::GammaShape(_))
    ));
}

#[test]
fn gamma_cannot_be_supplied_after_initialize() {
    let opts = options(vec![300.0], vec![Smearing::Gaussian(0.1)]);
    let mut driver = driver([2, 2, 1], PointGroup::identity(), opts);
    driver.initialize(None, None).unwrap();
    assert!(matches!(
        driver.set_gamma(Tensor4::zeros([1, 4, 1, BANDS])),
        Err(ConductivityError::GammaAfterInitialize)
    ));
}

// ============================================================================
// Isotope channel
// ============================================================================

#[test]
fn isotope_kernel_fills_gamma_iso_and_damps_kappa() {
    let opts = options(vec![300.0], vec![Smearing::Gaussian(0.1)]);

    let mut without: Conductivity<_, _> = Conductivity::new(
        MockPhonon::new([2, 1, 1]),
        MockSelfEnergy::new(0.05),
        PointGroup::identity(),
        opts.clone(),
    );
    without.initialize(None, None).unwrap();
    without.run().unwrap();

    let isotope = MockIsotope::new();
    let iso_runs = isotope.run_calls.clone();
    let mut with: Conductivity<_, _, MockIsotope> = Conductivity::new(
        MockPhonon::new([2, 1, 1]),
        MockSelfEnergy::new(0.05),
        PointGroup::identity(),
        opts,
    )
    .with_isotope(isotope, vec![1.2e-4]);
    with.initialize(None, None).unwrap();
    with.run().unwrap();

    // One isotope run per sigma per grid point.
    assert_eq!(iso_runs.get(), 2);
    let gamma_iso = with.gamma_isotope().unwrap();
    for i in 0..2 {
        for band in 0..BANDS {
            let expected = 0.02 * (band as f64 + 1.0);
            assert!((gamma_iso.at([0, i, band]) - expected).abs() < 1e-12);
        }
    }

    // Extra scattering shortens lifetimes, so kappa must drop.
    let base = without.kappa().unwrap();
    let damped = with.kappa().unwrap();
    for (&a, &b) in base.as_slice().iter().zip(damped.as_slice().iter()) {
        if a > 0.0 {
            assert!(b < a);
        }
    }
}

#[test]
fn no_isotope_leaves_gamma_iso_zeroed() {
    let opts = options(vec![300.0], vec![Smearing::Gaussian(0.1)]);
    let mut driver = driver([2, 1, 1], PointGroup::identity(), opts);
    driver.initialize(None, None).unwrap();
    driver.run().unwrap();
    assert!(driver
        .gamma_isotope()
        .unwrap()
        .as_slice()
        .iter()
        .all(|&v| v == 0.0));
}

// ============================================================================
// Symmetry consistency
// ============================================================================

fn run_and_aggregate(
    mesh: [usize; 3],
    symmetry: PointGroup,
    star_averaging: bool,
) -> (Vec<f64>, usize) {
    let opts = ConductivityOptions {
        temperatures: vec![300.0],
        sigmas: vec![Smearing::Gaussian(0.1)],
        kappa_star_averaging: star_averaging,
        ..ConductivityOptions::default()
    };
    let mut driver: Conductivity<_, _> = Conductivity::new(
        MockPhonon::new(mesh),
        MockSelfEnergy::new(0.05),
        symmetry,
        opts,
    );
    driver.initialize(None, None).unwrap();
    driver.run().unwrap();
    (
        aggregate_kappa(driver.kappa().unwrap()),
        driver.number_of_sampling_points(),
    )
}

#[test]
fn two_irreducible_points_match_full_enumeration() {
    // Two-point axis with a mirror: both points are their own star,
    // weights {1, 1} covering the coarse mesh of size 2.
    let group = PointGroup::new(vec![IDENTITY, MIRROR_X]);
    let (auto, auto_samples) = run_and_aggregate([2, 1, 1], group, true);
    let (full, full_samples) = run_and_aggregate([2, 1, 1], PointGroup::identity(), false);
    assert_eq!(auto_samples, 2);
    assert_eq!(full_samples, 2);
    for (&a, &f) in auto.iter().zip(full.iter()) {
        assert!((a - f).abs() < 1e-9 * f.abs().max(1.0));
    }
}

#[test]
fn star_folding_matches_full_enumeration() {
    // Mesh [4,1,1] under the mirror: irreducible points {0, 1, 2} with
    // weights {1, 2, 1}; the weighted star sum must reproduce the plain
    // sum over all four points.
    let group = PointGroup::new(vec![IDENTITY, MIRROR_X]);
    let (auto, auto_samples) = run_and_aggregate([4, 1, 1], group, true);
    let (full, full_samples) = run_and_aggregate([4, 1, 1], PointGroup::identity(), false);
    assert_eq!(auto_samples, 4);
    assert_eq!(full_samples, 4);
    for (&a, &f) in auto.iter().zip(full.iter()) {
        assert!((a - f).abs() < 1e-9 * f.abs().max(1.0));
    }
}

#[test]
fn automatic_mode_reports_star_weights() {
    let group = PointGroup::new(vec![IDENTITY, MIRROR_X]);
    let opts = options(vec![300.0], vec![Smearing::Gaussian(0.1)]);
    let mut driver = driver([4, 1, 1], group, opts);
    driver.initialize(None, None).unwrap();
    assert_eq!(driver.grid_points().unwrap(), &[0, 1, 2]);
    assert_eq!(driver.grid_weights().unwrap(), &[1, 2, 1]);
}

// ============================================================================
// Explicit selection and qpoints
// ============================================================================

#[test]
fn explicit_grid_points_are_honored() {
    let opts = options(vec![300.0], vec![Smearing::Gaussian(0.1)]);
    let mut driver = driver([4, 4, 4], PointGroup::identity(), opts);
    driver.initialize(Some(&[0, 5, 9]), None).unwrap();
    assert_eq!(driver.grid_points().unwrap(), &[0, 5, 9]);
    assert!(driver.grid_weights().unwrap().iter().all(|&w| w == 1));
    driver.run().unwrap();
    assert_eq!(driver.grid_point_count(), 3);
}

#[test]
fn qpoints_are_addresses_over_mesh() {
    let opts = options(vec![300.0], vec![Smearing::Gaussian(0.1)]);
    let mut driver = driver([4, 2, 1], PointGroup::identity(), opts);
    driver.initialize(None, None).unwrap();
    let qpoints = driver.qpoints();
    assert_eq!(qpoints.len(), 8);
    assert_eq!(qpoints[0], [0.0, 0.0, 0.0]);
    assert_eq!(qpoints[1], [0.25, 0.0, 0.0]);
    assert_eq!(qpoints[4], [0.0, 0.5, 0.0]);
}

// ============================================================================
// Mesh divisors through the driver
// ============================================================================

#[test]
fn divisors_coarsen_the_visited_set() {
    let opts = ConductivityOptions {
        temperatures: vec![300.0],
        sigmas: vec![Smearing::Gaussian(0.1)],
        mesh_divisors: Some([2, 2, 2]),
        ..ConductivityOptions::default()
    };
    let mut driver = driver([4, 4, 4], PointGroup::identity(), opts);
    driver.initialize(None, None).unwrap();
    assert_eq!(driver.mesh_divisors(), [2, 2, 2]);
    assert_eq!(driver.grid_points().unwrap().len(), 8);
    driver.run().unwrap();
    assert_eq!(driver.number_of_sampling_points(), 8);
}

#[test]
fn incompatible_divisor_degrades_to_full_mesh_axis() {
    let opts = ConductivityOptions {
        temperatures: vec![300.0],
        sigmas: vec![Smearing::Gaussian(0.1)],
        mesh_divisors: Some([3, 2, 2]),
        ..ConductivityOptions::default()
    };
    let mut driver = driver([4, 4, 4], PointGroup::identity(), opts);
    driver.initialize(None, None).unwrap();
    assert_eq!(driver.mesh_divisors(), [1, 2, 2]);
    assert_eq!(driver.grid_points().unwrap().len(), 16);
}
