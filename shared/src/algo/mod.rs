//! General purpose algorithms shared across the simulator crates.

pub mod parallel;

pub use parallel::{band_seed, for_each_seeded_band, map_seeded};
