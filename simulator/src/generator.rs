//! Frame-by-frame image generation from a blinking emitter population.
//!
//! The [`ImageGenerator`] owns the camera, the emitters and the single master
//! RNG of a simulation run. Each call to [`ImageGenerator::next_image`] is one
//! tick:
//!
//! 1. every emitter advances its state, in population order
//! 2. emitter photons and the global background are accumulated
//! 3. the camera renders the accumulator into a digital frame
//! 4. the frame and the true active-emitter count are appended to history
//!
//! # Randomness
//!
//! All draws come from one seeded `ChaCha8Rng`. Per tick the draw order is
//! fixed: one uniform per non-bleached emitter in population order, then one
//! `u64` that seeds the camera's noise streams. Two generators built from the
//! same configuration and seed therefore produce identical stacks.

use std::sync::Arc;

use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use shared::{History, HistoryError};
use thiserror::Error;

use crate::hardware::{Camera, CameraError, Frame};
use crate::photophysics::{Fluorophore, FluorophoreProperties};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeneratorError {
    #[error("activation rate range [{min}, {max}] is invalid")]
    InvalidActivationRange { min: f64, max: f64 },
    #[error("global background must be a non-negative photon count, got {0}")]
    NegativeBackground(f64),
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
}

/// Run-level settings of the image generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Seed of the master RNG
    pub seed: u64,
    /// Photons per pixel per frame added everywhere
    pub global_background: f64,
    /// Activation rate applied before the first controller update
    pub initial_activation_rate: f64,
    /// Lowest activation rate the generator accepts
    pub min_activation_rate: f64,
    /// Highest activation rate the generator accepts
    pub max_activation_rate: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 1,
            global_background: 0.0,
            initial_activation_rate: 0.1,
            min_activation_rate: 0.0,
            max_activation_rate: 1.0,
        }
    }
}

impl GeneratorConfig {
    fn validate(&self) -> Result<(), GeneratorError> {
        let (min, max) = (self.min_activation_rate, self.max_activation_rate);
        if !min.is_finite() || !max.is_finite() || min < 0.0 || min > max {
            return Err(GeneratorError::InvalidActivationRange { min, max });
        }
        if !self.global_background.is_finite() || self.global_background < 0.0 {
            return Err(GeneratorError::NegativeBackground(self.global_background));
        }
        Ok(())
    }

    /// Clamp a requested rate into the configured range. NaN maps to the minimum.
    pub fn clamp_activation_rate(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.min_activation_rate;
        }
        value.clamp(self.min_activation_rate, self.max_activation_rate)
    }
}

/// Owns the emitter population and produces one frame per tick.
pub struct ImageGenerator {
    camera: Arc<Camera>,
    emitters: Vec<Fluorophore>,
    config: GeneratorConfig,
    activation_rate: f64,
    rng: ChaCha8Rng,
    stack: Vec<Frame>,
    true_signal: History<f64>,
}

impl ImageGenerator {
    /// Build a generator with one emitter per position.
    ///
    /// Positions are (column, row) pairs in pixels.
    pub fn new(
        camera: Camera,
        properties: FluorophoreProperties,
        positions: &[(f64, f64)],
        config: GeneratorConfig,
    ) -> Result<Self, GeneratorError> {
        let camera = Arc::new(camera);
        let properties = Arc::new(properties);
        let emitters = positions
            .iter()
            .map(|&(x, y)| properties.create_fluorophore(&camera, x, y))
            .collect();
        Self::from_emitters(camera, emitters, config)
    }

    /// Build a generator with `count` emitters placed uniformly over the sensor.
    ///
    /// Positions are drawn from the master RNG before the first tick, so they
    /// are part of the reproducible draw sequence.
    pub fn with_random_population(
        camera: Camera,
        properties: FluorophoreProperties,
        count: usize,
        config: GeneratorConfig,
    ) -> Result<Self, GeneratorError> {
        let camera = Arc::new(camera);
        let properties = Arc::new(properties);
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let (width, height) = camera.dimensions();

        let emitters = (0..count)
            .map(|_| {
                let x = rng.random::<f64>() * width as f64;
                let y = rng.random::<f64>() * height as f64;
                properties.create_fluorophore(&camera, x, y)
            })
            .collect();

        let mut generator = Self::from_emitters(camera, emitters, config)?;
        generator.rng = rng;
        Ok(generator)
    }

    /// Build a generator from pre-made emitters.
    ///
    /// Emitters may come from different [`FluorophoreProperties`] but should be
    /// bound to `camera`.
    pub fn from_emitters(
        camera: Arc<Camera>,
        emitters: Vec<Fluorophore>,
        config: GeneratorConfig,
    ) -> Result<Self, GeneratorError> {
        config.validate()?;
        let activation_rate = config.clamp_activation_rate(config.initial_activation_rate);
        let rng = ChaCha8Rng::seed_from_u64(config.seed);

        info!(
            "Image generator: {} emitters on {}x{} sensor (PSF FWHM {:.2} px), seed {}, activation rate {:.4}",
            emitters.len(),
            camera.dimensions().0,
            camera.dimensions().1,
            camera.psf_fwhm_px(),
            config.seed,
            activation_rate
        );

        Ok(Self {
            camera,
            emitters,
            config,
            activation_rate,
            rng,
            stack: Vec::new(),
            true_signal: History::new(),
        })
    }

    /// Advance one tick and return the newly rendered frame.
    pub fn next_image(&mut self) -> Result<&Frame, GeneratorError> {
        let mut photons = self.camera.blank_photon_image();
        photons.fill(self.config.global_background);

        let mut active = 0usize;
        for emitter in &mut self.emitters {
            emitter.advance(self.activation_rate, &mut self.rng);
            if emitter.is_on() {
                active += 1;
            }
            emitter.emit(&mut photons);
        }

        let frame = self.camera.render(&photons, &mut self.rng)?;
        self.stack.push(frame);
        let index = self.true_signal.push(active as f64);

        debug!(
            "frame {index}: {active} active emitters at activation rate {:.4}",
            self.activation_rate
        );

        Ok(&self.stack[index - 1])
    }

    /// Number of frames produced so far.
    pub fn frame_count(&self) -> usize {
        self.stack.len()
    }

    /// Every frame produced so far, oldest first.
    pub fn stack(&self) -> &[Frame] {
        &self.stack
    }

    /// Frame at the 1-based `index`.
    pub fn frame(&self, index: usize) -> Result<&Frame, HistoryError> {
        index
            .checked_sub(1)
            .and_then(|i| self.stack.get(i))
            .ok_or(HistoryError::OutOfRange {
                index,
                len: self.stack.len(),
            })
    }

    /// True active-emitter count recorded for the 1-based frame `index`.
    pub fn true_signal(&self, index: usize) -> Result<f64, HistoryError> {
        self.true_signal.value(index)
    }

    pub fn true_signal_history(&self) -> &History<f64> {
        &self.true_signal
    }

    pub fn activation_rate(&self) -> f64 {
        self.activation_rate
    }

    /// Apply a new activation rate, clamped to the configured range.
    ///
    /// Returns the value actually applied.
    pub fn set_activation_rate(&mut self, value: f64) -> f64 {
        let applied = self.config.clamp_activation_rate(value);
        if applied != value {
            warn!(
                "activation rate {value} outside [{}, {}], clamped to {applied}",
                self.config.min_activation_rate, self.config.max_activation_rate
            );
        }
        self.activation_rate = applied;
        applied
    }

    /// Valid activation rate range as (min, max).
    pub fn activation_rate_range(&self) -> (f64, f64) {
        (
            self.config.min_activation_rate,
            self.config.max_activation_rate,
        )
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn emitters(&self) -> &[Fluorophore] {
        &self.emitters
    }

    /// Emitters that have not bleached yet.
    pub fn live_emitter_count(&self) -> usize {
        self.emitters.iter().filter(|e| !e.is_bleached()).count()
    }
}
