//! Core math, physics, and driver APIs for the RTA thermal-conductivity engine.

pub mod conductivity;
pub mod kernels;
pub mod lattice;
pub mod mesh;
pub mod metrics;
pub mod selector;
pub mod symmetry;
pub mod tensors;
pub mod units;

#[cfg(test)]
mod _tests_conductivity;
