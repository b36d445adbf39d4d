//! Hardware models for the imaging path

pub mod camera;

pub use camera::{Camera, CameraConfig, CameraError, Frame};
