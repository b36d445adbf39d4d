//! Frame analysis strategies.
//!
//! An [`EvaluationAlgorithm`] consumes frames one at a time and records one
//! scalar per frame in its own append-only history. Strategies are
//! interchangeable and are kept, keyed by name, in an [`AnalyzerSet`].
//!
//! Error-signal indices are 1-based and aligned with frame numbers: the entry
//! at index `i` was computed from frame `i`.

pub mod spot_counter;
pub mod threshold_regions;
pub mod thresholding;

use shared::{CustomParameters, History, HistoryError};
use simulator::Frame;
use thiserror::Error;

pub use spot_counter::SpotCounter;
pub use threshold_regions::ThresholdRegions;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("{algorithm} has no parameter named {name:?}")]
    UnknownParameter { algorithm: String, name: String },
    #[error("parameter {name:?} cannot be {value}: {reason}")]
    InvalidParameter {
        name: String,
        value: i32,
        reason: &'static str,
    },
    #[error("an analyzer named {0:?} is already registered")]
    DuplicateAnalyzer(String),
    #[error("no analyzer named {0:?}")]
    UnknownAnalyzer(String),
}

/// Capability shared by every frame analysis strategy.
pub trait EvaluationAlgorithm: Send {
    /// Identifier used as the key in an [`AnalyzerSet`].
    fn name(&self) -> &str;

    /// Analyze one frame and append exactly one entry to the error history.
    fn process_image(&mut self, frame: &Frame);

    /// Every value recorded so far, oldest first.
    fn error_history(&self) -> &History<f64>;

    /// Value recorded for the 1-based frame `index`.
    fn error_signal(&self, index: usize) -> Result<f64, HistoryError> {
        self.error_history().value(index)
    }

    /// Number of frames processed so far.
    fn processed_count(&self) -> usize {
        self.error_history().len()
    }

    /// Tunable parameters in display order.
    fn custom_parameters(&self) -> CustomParameters;

    /// Update the named parameters; keys not present are left unchanged.
    ///
    /// # Errors
    /// Unknown names or invalid values reject the whole update and leave the
    /// current parameters untouched.
    fn set_custom_parameters(&mut self, params: &CustomParameters) -> Result<(), EvaluationError>;
}

/// Reject any key in `params` that is not in `known`.
pub(crate) fn check_known_parameters(
    algorithm: &str,
    known: &[&str],
    params: &CustomParameters,
) -> Result<(), EvaluationError> {
    match params.names().find(|name| !known.contains(name)) {
        Some(name) => Err(EvaluationError::UnknownParameter {
            algorithm: algorithm.to_string(),
            name: name.to_string(),
        }),
        None => Ok(()),
    }
}

/// Reject negative values for the named parameter.
pub(crate) fn non_negative(name: &str, value: i32) -> Result<i32, EvaluationError> {
    if value < 0 {
        return Err(EvaluationError::InvalidParameter {
            name: name.to_string(),
            value,
            reason: "must be non-negative",
        });
    }
    Ok(value)
}

/// Name-keyed collection of analyzers in registration order.
#[derive(Default)]
pub struct AnalyzerSet {
    analyzers: Vec<Box<dyn EvaluationAlgorithm>>,
}

impl AnalyzerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an analyzer under its own name.
    pub fn insert(&mut self, analyzer: Box<dyn EvaluationAlgorithm>) -> Result<(), EvaluationError> {
        if self.contains(analyzer.name()) {
            return Err(EvaluationError::DuplicateAnalyzer(analyzer.name().to_string()));
        }
        self.analyzers.push(analyzer);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&dyn EvaluationAlgorithm> {
        self.analyzers
            .iter()
            .find(|a| a.name() == name)
            .map(|a| a.as_ref())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut dyn EvaluationAlgorithm> {
        let analyzer: &mut dyn EvaluationAlgorithm =
            self.analyzers.iter_mut().find(|a| a.name() == name)?.as_mut();
        Some(analyzer)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.analyzers.iter().map(|a| a.name())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn EvaluationAlgorithm> {
        self.analyzers.iter().map(|a| a.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn EvaluationAlgorithm>> {
        self.analyzers.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.analyzers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analyzers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_and_lookup() {
        let mut set = AnalyzerSet::new();
        set.insert(Box::new(SpotCounter::named("b"))).unwrap();
        set.insert(Box::new(ThresholdRegions::named("a"))).unwrap();

        assert_eq!(set.names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert!(set.get("a").is_some());
        assert!(set.get("c").is_none());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut set = AnalyzerSet::new();
        set.insert(Box::new(SpotCounter::named("spots"))).unwrap();
        assert_eq!(
            set.insert(Box::new(ThresholdRegions::named("spots"))),
            Err(EvaluationError::DuplicateAnalyzer("spots".to_string()))
        );
    }

    #[test]
    fn test_check_known_parameters() {
        let params = CustomParameters::new().with("threshold", 1).with("bogus", 2);
        let err = check_known_parameters("X", &["threshold"], &params).unwrap_err();
        assert_eq!(
            err,
            EvaluationError::UnknownParameter {
                algorithm: "X".to_string(),
                name: "bogus".to_string()
            }
        );
    }
}
