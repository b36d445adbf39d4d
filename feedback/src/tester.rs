//! Tick driver that runs the generator, the analyzers and the controller in
//! lockstep.

use log::{debug, info};
use serde::Serialize;
use shared::{CustomParameters, HistoryError};
use simulator::{GeneratorError, ImageGenerator};
use thiserror::Error;

use crate::analysis::{AnalyzerSet, EvaluationAlgorithm, EvaluationError};
use crate::control::{ControlError, FeedbackController};

#[derive(Error, Debug)]
pub enum TesterError {
    #[error("generator error: {0}")]
    Generator(#[from] GeneratorError),
    #[error("control error: {0}")]
    Control(#[from] ControlError),
    #[error("analyzer error: {0}")]
    Evaluation(#[from] EvaluationError),
    #[error(transparent)]
    History(#[from] HistoryError),
}

/// Values produced by one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    /// 1-based frame number
    pub frame: usize,
    /// Emitters ON during the frame
    pub true_signal: f64,
    /// Primary analyzer value for the frame
    pub measured: f64,
    pub setpoint: f64,
    /// Activation rate applied for the next frame
    pub output: f64,
}

/// One reporting row per frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoryRow {
    pub frame: usize,
    pub true_signal: f64,
    pub error_signal: f64,
    pub setpoint: f64,
    pub output: f64,
}

/// Owns a full closed-loop run.
///
/// The primary analyzer lives inside the controller; every other analyzer sees
/// the same frames but does not influence actuation.
pub struct AlgorithmTester {
    generator: ImageGenerator,
    controller: FeedbackController,
    analyzers: AnalyzerSet,
}

impl AlgorithmTester {
    /// # Errors
    /// Fails when a secondary analyzer shares the primary analyzer's name.
    pub fn new(
        generator: ImageGenerator,
        controller: FeedbackController,
        analyzers: AnalyzerSet,
    ) -> Result<Self, TesterError> {
        let primary = controller.analyzer().name();
        if analyzers.contains(primary) {
            return Err(EvaluationError::DuplicateAnalyzer(primary.to_string()).into());
        }

        info!(
            "Closed loop: primary analyzer {primary:?}, {} secondary, setpoint {}",
            analyzers.len(),
            controller.target()
        );

        Ok(Self {
            generator,
            controller,
            analyzers,
        })
    }

    /// Render one frame, analyze it everywhere and adjust the activation rate.
    ///
    /// An error from the controller leaves the new frame and its analyses in
    /// place; the tick is not rolled back.
    pub fn step(&mut self) -> Result<TickReport, TesterError> {
        let frame = self.generator.next_image()?;
        self.controller.analyzer_mut().process_image(frame);
        for analyzer in self.analyzers.iter_mut() {
            analyzer.process_image(frame);
        }

        let output = self.controller.adjust(&mut self.generator)?;
        let index = self.generator.frame_count();

        let report = TickReport {
            frame: index,
            true_signal: self.generator.true_signal(index)?,
            measured: self.controller.analyzer().error_signal(index)?,
            setpoint: self.controller.setpoint_history(index)?,
            output,
        };
        debug!("{report:?}");
        Ok(report)
    }

    /// Run `ticks` steps, calling `on_tick` after each.
    pub fn run_with<F>(&mut self, ticks: usize, mut on_tick: F) -> Result<(), TesterError>
    where
        F: FnMut(&TickReport),
    {
        for _ in 0..ticks {
            let report = self.step()?;
            on_tick(&report);
        }
        Ok(())
    }

    /// Run `ticks` steps and collect their reports.
    pub fn run(&mut self, ticks: usize) -> Result<Vec<TickReport>, TesterError> {
        let mut reports = Vec::with_capacity(ticks);
        self.run_with(ticks, |report| reports.push(*report))?;
        Ok(reports)
    }

    pub fn set_setpoint(&mut self, setpoint: f64) -> Result<(), TesterError> {
        Ok(self.controller.set_target(setpoint)?)
    }

    /// Analyzer by name, primary included.
    pub fn analyzer(&self, name: &str) -> Option<&dyn EvaluationAlgorithm> {
        if self.controller.analyzer().name() == name {
            Some(self.controller.analyzer())
        } else {
            self.analyzers.get(name)
        }
    }

    fn analyzer_mut(&mut self, name: &str) -> Option<&mut dyn EvaluationAlgorithm> {
        if self.controller.analyzer().name() == name {
            Some(self.controller.analyzer_mut())
        } else {
            self.analyzers.get_mut(name)
        }
    }

    /// Primary analyzer first, then the others in registration order.
    pub fn analyzer_names(&self) -> Vec<&str> {
        std::iter::once(self.controller.analyzer().name())
            .chain(self.analyzers.names())
            .collect()
    }

    pub fn custom_parameters(&self, name: &str) -> Result<CustomParameters, EvaluationError> {
        self.analyzer(name)
            .map(|a| a.custom_parameters())
            .ok_or_else(|| EvaluationError::UnknownAnalyzer(name.to_string()))
    }

    pub fn set_custom_parameters(
        &mut self,
        name: &str,
        params: &CustomParameters,
    ) -> Result<(), EvaluationError> {
        let analyzer = self
            .analyzer_mut(name)
            .ok_or_else(|| EvaluationError::UnknownAnalyzer(name.to_string()))?;
        analyzer.set_custom_parameters(params)?;
        info!("{name} parameters now {}", analyzer.custom_parameters());
        Ok(())
    }

    /// One row per fully completed tick, oldest first.
    pub fn history_rows(&self) -> Vec<HistoryRow> {
        let truth = self.generator.true_signal_history();
        let errors = self.controller.analyzer().error_history();
        let setpoints = self.controller.setpoints();
        let outputs = self.controller.outputs();

        let complete = truth
            .len()
            .min(errors.len())
            .min(setpoints.len())
            .min(outputs.len());

        (0..complete)
            .map(|i| HistoryRow {
                frame: i + 1,
                true_signal: truth.as_slice()[i],
                error_signal: errors.as_slice()[i],
                setpoint: setpoints.as_slice()[i],
                output: outputs.as_slice()[i],
            })
            .collect()
    }

    pub fn generator(&self) -> &ImageGenerator {
        &self.generator
    }

    pub fn controller(&self) -> &FeedbackController {
        &self.controller
    }

    pub fn secondary_analyzers(&self) -> &AnalyzerSet {
        &self.analyzers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{SpotCounter, ThresholdRegions};
    use crate::control::Proportional;
    use simulator::{
        BlinkingKinetics, Camera, CameraConfig, FluorophoreProperties, GeneratorConfig,
    };

    fn tester() -> AlgorithmTester {
        let camera = Camera::new(CameraConfig::noiseless(32, 32)).unwrap();
        let props =
            FluorophoreProperties::new(400.0, 0.0, BlinkingKinetics::new(0.02, 0.1, 10.0).unwrap())
                .unwrap();
        let positions = [(5.0, 5.0), (20.0, 8.0), (10.0, 25.0)];
        let generator =
            ImageGenerator::new(camera, props, &positions, GeneratorConfig::default()).unwrap();

        let mut primary = SpotCounter::new();
        primary
            .set_custom_parameters(&CustomParameters::new().with("threshold", 20))
            .unwrap();
        let controller =
            FeedbackController::new(Box::new(primary), Box::new(Proportional::new(0.2)), 1.0)
                .unwrap();

        let mut secondary = AnalyzerSet::new();
        secondary.insert(Box::new(ThresholdRegions::new())).unwrap();

        AlgorithmTester::new(generator, controller, secondary).unwrap()
    }

    #[test]
    fn test_step_keeps_all_histories_aligned() {
        let mut tester = tester();
        let reports = tester.run(12).unwrap();

        assert_eq!(reports.len(), 12);
        assert_eq!(reports.last().map(|r| r.frame), Some(12));
        for name in tester.analyzer_names() {
            assert_eq!(tester.analyzer(name).unwrap().processed_count(), 12);
        }
        assert_eq!(tester.controller().outputs().len(), 12);
        assert_eq!(tester.history_rows().len(), 12);
    }

    #[test]
    fn test_report_matches_histories() {
        let mut tester = tester();
        let report = tester.step().unwrap();
        let rows = tester.history_rows();

        assert_eq!(rows[0].frame, 1);
        assert_eq!(rows[0].true_signal, report.true_signal);
        assert_eq!(rows[0].error_signal, report.measured);
        assert_eq!(rows[0].output, report.output);
    }

    #[test]
    fn test_analyzer_lookup_and_parameters() {
        let mut tester = tester();
        assert_eq!(
            tester.analyzer_names(),
            vec!["spot_counter", "threshold_regions"]
        );
        assert!(tester.analyzer("nope").is_none());

        tester
            .set_custom_parameters("threshold_regions", &CustomParameters::new().with("min_area", 4))
            .unwrap();
        let params = tester.custom_parameters("threshold_regions").unwrap();
        assert_eq!(params.get("min_area"), Some(4));
        assert_eq!(params.get("threshold"), Some(0));

        assert_eq!(
            tester.custom_parameters("nope"),
            Err(EvaluationError::UnknownAnalyzer("nope".to_string()))
        );
    }

    #[test]
    fn test_duplicate_primary_name_rejected() {
        let camera = Camera::new(CameraConfig::noiseless(8, 8)).unwrap();
        let props = FluorophoreProperties::new(1.0, 0.0, BlinkingKinetics::default()).unwrap();
        let generator =
            ImageGenerator::new(camera, props, &[], GeneratorConfig::default()).unwrap();
        let controller = FeedbackController::new(
            Box::new(SpotCounter::new()),
            Box::new(Proportional::new(1.0)),
            0.0,
        )
        .unwrap();
        let mut secondary = AnalyzerSet::new();
        secondary.insert(Box::new(SpotCounter::new())).unwrap();

        assert!(matches!(
            AlgorithmTester::new(generator, controller, secondary),
            Err(TesterError::Evaluation(EvaluationError::DuplicateAnalyzer(_)))
        ));
    }
}
