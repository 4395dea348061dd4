//! Physical constants and unit conversions for phonon transport.
//!
//! Constants follow the phonopy-lineage CODATA values so that conductivity
//! numbers line up with the reference tool chain.

/// Electron volt in Joule.
pub const EV: f64 = 1.60217733e-19;
/// Angstrom in meter.
pub const ANGSTROM: f64 = 1.0e-10;
/// Terahertz in Hertz.
pub const THZ: f64 = 1.0e12;
/// Boltzmann constant in eV/K.
pub const KB_EV: f64 = 8.6173382e-5;
/// Conversion from THz (ordinary frequency) to eV.
pub const THZ_TO_EV: f64 = 4.13566733e-3;

/// Mode-resolved kappa to W/(m.K), before division by the cell volume in
/// Angstrom^3. The 2*pi comes from the definition of the lifetime.
pub const UNIT_TO_WMK: f64 =
    (THZ * ANGSTROM) * (THZ * ANGSTROM) / (ANGSTROM * ANGSTROM * ANGSTROM) * EV / THZ
        / std::f64::consts::TAU;

/// Bose-Einstein mode heat capacity in eV/K.
///
/// `kB x^2 e^x / (e^x - 1)^2` with `x = h_bar omega / kB T`. Returns zero
/// at (or numerically near) T = 0 and for non-positive frequencies.
pub fn mode_heat_capacity(temperature: f64, freq_thz: f64) -> f64 {
    if temperature < 1e-12 || freq_thz < 1e-12 {
        return 0.0;
    }
    let x = freq_thz * THZ_TO_EV / (KB_EV * temperature);
    if x > 100.0 {
        // exp(x) would overflow; the occupancy factor is already ~0.
        return 0.0;
    }
    let expm1 = x.exp_m1();
    KB_EV * x * x * (expm1 + 1.0) / (expm1 * expm1)
}
