//! Image processing primitives shared by the simulator crates.

pub mod noise;

pub use noise::sample_sensor_electrons;
