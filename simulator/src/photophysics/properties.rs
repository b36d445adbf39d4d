//! Emitter parameter bundles and blinking kinetics.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hardware::Camera;
use crate::photophysics::fluorophore::Fluorophore;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhotophysicsError {
    #[error("signal must be a non-negative photon count, got {0}")]
    NegativeSignal(f64),
    #[error("background must be a non-negative photon count, got {0}")]
    NegativeBackground(f64),
    #[error("lifetime {name} must be positive, got {value}")]
    InvalidLifetime { name: &'static str, value: f64 },
}

/// Mean lifetimes of the three-state blinking model, in seconds.
///
/// Transitions are competing exponential processes:
/// - OFF → ON at rate `activation_rate / off_lifetime_s`
/// - ON → OFF at rate `1 / on_lifetime_s`
/// - ON → BLEACHED at rate `1 / bleach_lifetime_s`
///
/// An infinite bleach lifetime disables photobleaching.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlinkingKinetics {
    /// Mean time spent ON before switching off
    pub on_lifetime_s: f64,
    /// Mean time spent OFF before activation at unit activation rate
    pub off_lifetime_s: f64,
    /// Mean accumulated ON time before photobleaching
    pub bleach_lifetime_s: f64,
}

impl Default for BlinkingKinetics {
    fn default() -> Self {
        Self {
            on_lifetime_s: 0.025,
            off_lifetime_s: 2.0,
            bleach_lifetime_s: 1.0,
        }
    }
}

impl BlinkingKinetics {
    pub fn new(
        on_lifetime_s: f64,
        off_lifetime_s: f64,
        bleach_lifetime_s: f64,
    ) -> Result<Self, PhotophysicsError> {
        let kinetics = Self {
            on_lifetime_s,
            off_lifetime_s,
            bleach_lifetime_s,
        };
        kinetics.validate()?;
        Ok(kinetics)
    }

    /// Kinetics without photobleaching.
    pub fn non_bleaching(on_lifetime_s: f64, off_lifetime_s: f64) -> Result<Self, PhotophysicsError> {
        Self::new(on_lifetime_s, off_lifetime_s, f64::INFINITY)
    }

    pub fn validate(&self) -> Result<(), PhotophysicsError> {
        let finite = [
            ("on_lifetime_s", self.on_lifetime_s),
            ("off_lifetime_s", self.off_lifetime_s),
        ];
        for (name, value) in finite {
            if !value.is_finite() || value <= 0.0 {
                return Err(PhotophysicsError::InvalidLifetime { name, value });
            }
        }
        // Infinity is allowed here and disables bleaching
        if self.bleach_lifetime_s.is_nan() || self.bleach_lifetime_s <= 0.0 {
            return Err(PhotophysicsError::InvalidLifetime {
                name: "bleach_lifetime_s",
                value: self.bleach_lifetime_s,
            });
        }
        Ok(())
    }

    /// Probability that an OFF emitter turns ON within `dt_s`.
    pub fn activation_probability(&self, activation_rate: f64, dt_s: f64) -> f64 {
        let rate = activation_rate.max(0.0) / self.off_lifetime_s;
        -(-rate * dt_s).exp_m1()
    }

    /// Total rate of leaving the ON state, per second.
    pub fn on_exit_rate(&self) -> f64 {
        1.0 / self.on_lifetime_s + 1.0 / self.bleach_lifetime_s
    }

    /// Probability that an ON emitter leaves the ON state within `dt_s`.
    pub fn on_exit_probability(&self, dt_s: f64) -> f64 {
        -(-self.on_exit_rate() * dt_s).exp_m1()
    }

    /// Fraction of ON exits that end in the bleached state.
    pub fn bleach_fraction(&self) -> f64 {
        (1.0 / self.bleach_lifetime_s) / self.on_exit_rate()
    }

    /// Steady-state ON fraction at a given activation rate, ignoring bleaching.
    pub fn duty_cycle(&self, activation_rate: f64) -> f64 {
        let k_on = activation_rate.max(0.0) / self.off_lifetime_s;
        let k_off = 1.0 / self.on_lifetime_s;
        k_on / (k_on + k_off)
    }
}

/// Immutable parameter bundle shared by every emitter it spawns.
///
/// Acts as the factory for [`Fluorophore`]s: see
/// [`FluorophoreProperties::create_fluorophore`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FluorophoreProperties {
    signal: f64,
    background: f64,
    kinetics: BlinkingKinetics,
}

impl FluorophoreProperties {
    /// Validate and build a parameter bundle.
    ///
    /// # Arguments
    /// * `signal` - Photons emitted per frame while ON
    /// * `background` - Photons added per frame regardless of state
    /// * `kinetics` - Blinking lifetimes
    ///
    /// # Errors
    /// Fails for negative or non-finite `signal` or `background`, and for
    /// invalid lifetimes. The check runs once here, never per emitter.
    pub fn new(
        signal: f64,
        background: f64,
        kinetics: BlinkingKinetics,
    ) -> Result<Self, PhotophysicsError> {
        if !signal.is_finite() || signal < 0.0 {
            return Err(PhotophysicsError::NegativeSignal(signal));
        }
        if !background.is_finite() || background < 0.0 {
            return Err(PhotophysicsError::NegativeBackground(background));
        }
        kinetics.validate()?;

        Ok(Self {
            signal,
            background,
            kinetics,
        })
    }

    pub fn signal(&self) -> f64 {
        self.signal
    }

    pub fn background(&self) -> f64 {
        self.background
    }

    pub fn kinetics(&self) -> &BlinkingKinetics {
        &self.kinetics
    }

    /// Spawn an emitter bound to `camera` at column `x`, row `y`.
    ///
    /// The emitter starts in the OFF state.
    pub fn create_fluorophore(self: &Arc<Self>, camera: &Arc<Camera>, x: f64, y: f64) -> Fluorophore {
        Fluorophore::new(Arc::clone(camera), Arc::clone(self), x, y)
    }
}
