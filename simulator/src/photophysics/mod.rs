//! Emitter photophysics: parameter bundles, blinking kinetics and the
//! per-emitter stochastic state machine.

pub mod fluorophore;
pub mod properties;

pub use fluorophore::{Fluorophore, FluorophoreState};
pub use properties::{BlinkingKinetics, FluorophoreProperties, PhotophysicsError};
