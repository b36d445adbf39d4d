//! Image formation utilities for the simulator.

pub mod psf;

pub use psf::add_gaussian_spot;
