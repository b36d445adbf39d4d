//! Frame analysis and closed-loop density control.
//!
//! - [`analysis`]: the [`EvaluationAlgorithm`] capability and its strategies
//! - [`control`]: control laws and the [`FeedbackController`]
//! - [`tester`]: the [`AlgorithmTester`] tick driver
//! - [`config`]: JSON configuration of a complete run
//!
//! # Example
//!
//! ```
//! use feedback::SimulationConfig;
//!
//! let mut config = SimulationConfig::default();
//! config.fluorophores.count = 20;
//!
//! let mut tester = config.build().unwrap();
//! let report = tester.step().unwrap();
//! assert_eq!(report.frame, 1);
//! assert_eq!(
//!     tester.controller().setpoint_history(1),
//!     Ok(config.controller.setpoint)
//! );
//! ```

pub mod analysis;
pub mod config;
pub mod control;
pub mod tester;

pub use analysis::{
    AnalyzerSet, EvaluationAlgorithm, EvaluationError, SpotCounter, ThresholdRegions,
};
pub use config::{ConfigError, SimulationConfig};
pub use control::{
    ControlError, ControlLaw, ControlLawConfig, FeedbackController, Pid, Proportional,
};
pub use tester::{AlgorithmTester, HistoryRow, TesterError, TickReport};
