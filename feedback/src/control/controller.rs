//! Setpoint tracking through the generator's activation rate.

use log::debug;
use shared::{History, HistoryError};
use simulator::ImageGenerator;
use thiserror::Error;

use crate::analysis::EvaluationAlgorithm;
use crate::control::ControlLaw;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    #[error("primary analyzer not ready: {processed} of {frames} frames processed")]
    NotReady { frames: usize, processed: usize },
    #[error("frame {frame} was already adjusted")]
    AlreadyAdjusted { frame: usize },
    #[error("frame {frame} is the newest but only {recorded} frames were adjusted")]
    MissedFrame { frame: usize, recorded: usize },
    #[error("primary analyzer is ahead of the generator: {processed} processed, {frames} rendered")]
    AnalyzerAhead { frames: usize, processed: usize },
    #[error("control gain {name} must be finite, got {value}")]
    InvalidGain { name: &'static str, value: f64 },
    #[error("setpoint must be finite, got {0}")]
    InvalidSetpoint(f64),
    #[error(transparent)]
    History(#[from] HistoryError),
}

/// Closes the loop between the primary analyzer and the activation rate.
///
/// Each tick, [`FeedbackController::adjust`] reads the primary analyzer's value
/// for the newest frame, runs the control law and applies the result to the
/// generator. The setpoint and the applied (clamped) output are recorded in
/// histories indexed by frame number, so `adjust` must run once per frame.
pub struct FeedbackController {
    analyzer: Box<dyn EvaluationAlgorithm>,
    law: Box<dyn ControlLaw>,
    setpoint: f64,
    setpoints: History<f64>,
    outputs: History<f64>,
}

impl FeedbackController {
    pub fn new(
        analyzer: Box<dyn EvaluationAlgorithm>,
        law: Box<dyn ControlLaw>,
        setpoint: f64,
    ) -> Result<Self, ControlError> {
        check_setpoint(setpoint)?;
        Ok(Self {
            analyzer,
            law,
            setpoint,
            setpoints: History::new(),
            outputs: History::new(),
        })
    }

    /// Change the setpoint used from the next `adjust` on.
    pub fn set_target(&mut self, setpoint: f64) -> Result<(), ControlError> {
        check_setpoint(setpoint)?;
        debug!("setpoint {} -> {}", self.setpoint, setpoint);
        self.setpoint = setpoint;
        Ok(())
    }

    pub fn target(&self) -> f64 {
        self.setpoint
    }

    /// Run one control step for the newest frame of `generator`.
    ///
    /// Returns the activation rate actually applied.
    ///
    /// # Errors
    /// * [`ControlError::NotReady`] when the generator has no frame yet or the
    ///   primary analyzer has not processed the newest one
    /// * [`ControlError::AnalyzerAhead`] when the primary analyzer processed
    ///   more images than the generator rendered
    /// * [`ControlError::AlreadyAdjusted`] when the newest frame already has
    ///   an output entry
    /// * [`ControlError::MissedFrame`] when an earlier frame was never
    ///   adjusted; the histories would no longer line up with frame numbers
    pub fn adjust(&mut self, generator: &mut ImageGenerator) -> Result<f64, ControlError> {
        let frames = generator.frame_count();
        let processed = self.analyzer.processed_count();
        if frames == 0 || processed < frames {
            return Err(ControlError::NotReady { frames, processed });
        }
        if processed > frames {
            return Err(ControlError::AnalyzerAhead { frames, processed });
        }
        let recorded = self.outputs.len();
        if recorded >= frames {
            return Err(ControlError::AlreadyAdjusted { frame: frames });
        }
        if recorded + 1 < frames {
            return Err(ControlError::MissedFrame {
                frame: frames,
                recorded,
            });
        }

        let measured = self.analyzer.error_signal(frames)?;
        let dt_s = generator.camera().exposure_s();
        let requested = self.law.compute(self.setpoint, measured, dt_s);
        let applied = generator.set_activation_rate(requested);

        self.setpoints.push(self.setpoint);
        let index = self.outputs.push(applied);

        debug!(
            "adjust {index}: measured {measured:.3}, setpoint {:.3}, output {applied:.4}",
            self.setpoint
        );
        Ok(applied)
    }

    /// Output applied after the 1-based frame `index`.
    pub fn output_history(&self, index: usize) -> Result<f64, HistoryError> {
        self.outputs.value(index)
    }

    /// Setpoint in effect for the 1-based frame `index`.
    pub fn setpoint_history(&self, index: usize) -> Result<f64, HistoryError> {
        self.setpoints.value(index)
    }

    pub fn outputs(&self) -> &History<f64> {
        &self.outputs
    }

    pub fn setpoints(&self) -> &History<f64> {
        &self.setpoints
    }

    pub fn analyzer(&self) -> &dyn EvaluationAlgorithm {
        self.analyzer.as_ref()
    }

    pub fn analyzer_mut(&mut self) -> &mut dyn EvaluationAlgorithm {
        self.analyzer.as_mut()
    }
}

fn check_setpoint(setpoint: f64) -> Result<(), ControlError> {
    if setpoint.is_finite() {
        Ok(())
    } else {
        Err(ControlError::InvalidSetpoint(setpoint))
    }
}
