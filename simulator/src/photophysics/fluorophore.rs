//! Stochastic blinking emitter bound to one camera and one position.

use std::sync::Arc;

use ndarray::Array2;
use rand::Rng;

use crate::hardware::Camera;
use crate::image_proc::psf::add_gaussian_spot;
use crate::photophysics::properties::FluorophoreProperties;

/// Photophysical state of an emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FluorophoreState {
    /// Dark, can be activated
    Off,
    /// Emitting
    On,
    /// Permanently dark, terminal
    Bleached,
}

/// A single blinking point emitter.
///
/// The tick duration is the exposure of the bound camera, so transition
/// probabilities follow the simulated frame time.
#[derive(Debug, Clone)]
pub struct Fluorophore {
    camera: Arc<Camera>,
    properties: Arc<FluorophoreProperties>,
    x: f64,
    y: f64,
    state: FluorophoreState,
}

impl Fluorophore {
    pub(crate) fn new(
        camera: Arc<Camera>,
        properties: Arc<FluorophoreProperties>,
        x: f64,
        y: f64,
    ) -> Self {
        Self {
            camera,
            properties,
            x,
            y,
            state: FluorophoreState::Off,
        }
    }

    pub fn state(&self) -> FluorophoreState {
        self.state
    }

    /// Position as (column, row) in pixels
    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    pub fn properties(&self) -> &FluorophoreProperties {
        &self.properties
    }

    pub fn is_on(&self) -> bool {
        self.state == FluorophoreState::On
    }

    pub fn is_bleached(&self) -> bool {
        self.state == FluorophoreState::Bleached
    }

    /// Draw the next photophysical state for one tick.
    ///
    /// Consumes exactly one uniform draw from `rng` unless the emitter is
    /// bleached, in which case nothing is drawn and the state never changes.
    ///
    /// # Arguments
    /// * `activation_rate` - Laser-driven activation scale; OFF → ON rate is
    ///   `activation_rate / off_lifetime_s`
    /// * `rng` - Shared simulation RNG
    pub fn advance<R: Rng + ?Sized>(&mut self, activation_rate: f64, rng: &mut R) -> FluorophoreState {
        let kinetics = self.properties.kinetics();
        let dt = self.camera.exposure_s();

        self.state = match self.state {
            FluorophoreState::Bleached => FluorophoreState::Bleached,
            FluorophoreState::Off => {
                let u: f64 = rng.random();
                if u < kinetics.activation_probability(activation_rate, dt) {
                    FluorophoreState::On
                } else {
                    FluorophoreState::Off
                }
            }
            FluorophoreState::On => {
                let u: f64 = rng.random();
                let p_exit = kinetics.on_exit_probability(dt);
                if u < p_exit * kinetics.bleach_fraction() {
                    FluorophoreState::Bleached
                } else if u < p_exit {
                    FluorophoreState::Off
                } else {
                    FluorophoreState::On
                }
            }
        };

        self.state
    }

    /// Add this emitter's photons for the current tick to `photons`.
    ///
    /// Background is always added; the signal only while ON. Both are spread
    /// by the camera's PSF around the emitter position.
    pub fn emit(&self, photons: &mut Array2<f64>) {
        let flux = if self.is_on() {
            self.properties.signal() + self.properties.background()
        } else {
            self.properties.background()
        };
        add_gaussian_spot(photons, self.x, self.y, flux, self.camera.psf_sigma_px());
    }

    #[cfg(test)]
    pub(crate) fn force_state(&mut self, state: FluorophoreState) {
        self.state = state;
    }
}
