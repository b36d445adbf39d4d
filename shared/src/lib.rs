//! Shared building blocks for the blinking-emitter simulator.
//!
//! - [`history`]: append-only, 1-based histories used for every per-frame record
//! - [`parameters`]: insertion-ordered integer parameter maps for analyzers
//! - [`algo`]: deterministic parallel array processing
//! - [`image_proc`]: sensor noise primitives

pub mod algo;
pub mod history;
pub mod image_proc;
pub mod parameters;

pub use history::{History, HistoryError};
pub use parameters::CustomParameters;
