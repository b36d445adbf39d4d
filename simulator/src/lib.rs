//! Blinking emitter simulation for localization microscopy.
//!
//! This crate generates synthetic camera frames of a population of
//! stochastically blinking fluorophores:
//!
//! - [`hardware`]: the camera noise and quantization model
//! - [`photophysics`]: emitter parameter bundles and the blinking state machine
//! - [`image_proc`]: PSF rendering into photon accumulators
//! - [`generator`]: the per-tick image generator with ground-truth history
//!
//! # Example
//!
//! ```
//! use simulator::{
//!     BlinkingKinetics, Camera, CameraConfig, FluorophoreProperties, GeneratorConfig,
//!     ImageGenerator,
//! };
//!
//! let camera = Camera::new(CameraConfig::default()).unwrap();
//! let props = FluorophoreProperties::new(200.0, 5.0, BlinkingKinetics::default()).unwrap();
//! let mut generator =
//!     ImageGenerator::with_random_population(camera, props, 25, GeneratorConfig::default())
//!         .unwrap();
//!
//! generator.next_image().unwrap();
//! assert_eq!(generator.frame_count(), 1);
//! assert!(generator.true_signal(1).is_ok());
//! ```

pub mod generator;
pub mod hardware;
pub mod image_proc;
pub mod photophysics;

pub use generator::{GeneratorConfig, GeneratorError, ImageGenerator};
pub use hardware::{Camera, CameraConfig, CameraError, Frame};
pub use photophysics::{
    BlinkingKinetics, Fluorophore, FluorophoreProperties, FluorophoreState, PhotophysicsError,
};
