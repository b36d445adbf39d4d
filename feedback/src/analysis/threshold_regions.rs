//! Connected-region counting above a fixed or automatic threshold.

use log::trace;
use shared::{CustomParameters, History};
use simulator::Frame;

use super::thresholding::{apply_threshold, connected_region_areas, otsu_threshold};
use super::{check_known_parameters, non_negative, EvaluationAlgorithm, EvaluationError};

pub const DEFAULT_NAME: &str = "threshold_regions";
pub const DEFAULT_MIN_AREA: i32 = 2;

const THRESHOLD: &str = "threshold";
const MIN_AREA: &str = "min_area";

/// Counts 8-connected bright regions of at least `min_area` pixels.
///
/// A `threshold` of 0 selects Otsu's threshold per frame.
#[derive(Debug, Clone)]
pub struct ThresholdRegions {
    name: String,
    threshold: i32,
    min_area: i32,
    history: History<f64>,
}

impl Default for ThresholdRegions {
    fn default() -> Self {
        Self::named(DEFAULT_NAME)
    }
}

impl ThresholdRegions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            threshold: 0,
            min_area: DEFAULT_MIN_AREA,
            history: History::new(),
        }
    }

    /// Threshold applied to `frame`, in DN.
    pub fn effective_threshold(&self, frame: &Frame) -> f64 {
        if self.threshold == 0 {
            otsu_threshold(frame.view(), None)
        } else {
            f64::from(self.threshold)
        }
    }
}

impl EvaluationAlgorithm for ThresholdRegions {
    fn name(&self) -> &str {
        &self.name
    }

    fn process_image(&mut self, frame: &Frame) {
        let threshold = self.effective_threshold(frame);
        let mask = apply_threshold(frame.view(), threshold);
        let min_area = self.min_area as usize;
        let regions = connected_region_areas(mask.view())
            .into_iter()
            .filter(|&area| area >= min_area)
            .count();

        trace!("{}: {regions} regions above {threshold:.1} DN", self.name);
        self.history.push(regions as f64);
    }

    fn error_history(&self) -> &History<f64> {
        &self.history
    }

    fn custom_parameters(&self) -> CustomParameters {
        CustomParameters::new()
            .with(THRESHOLD, self.threshold)
            .with(MIN_AREA, self.min_area)
    }

    fn set_custom_parameters(&mut self, params: &CustomParameters) -> Result<(), EvaluationError> {
        check_known_parameters(&self.name, &[THRESHOLD, MIN_AREA], params)?;

        let threshold = match params.get(THRESHOLD) {
            Some(v) => non_negative(THRESHOLD, v)?,
            None => self.threshold,
        };
        let min_area = match params.get(MIN_AREA) {
            Some(v) => non_negative(MIN_AREA, v)?,
            None => self.min_area,
        };

        self.threshold = threshold;
        self.min_area = min_area;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{s, Array2};

    fn frame_with_blobs() -> Frame {
        let mut frame = Array2::from_elem((40, 40), 100u16);
        frame.slice_mut(s![2..5, 2..5]).fill(800);
        frame.slice_mut(s![20..22, 30..33]).fill(700);
        frame[[35, 10]] = 900;
        frame
    }

    #[test]
    fn test_fixed_threshold_with_min_area() {
        let mut regions = ThresholdRegions::new();
        regions
            .set_custom_parameters(&CustomParameters::new().with("threshold", 500))
            .unwrap();
        regions.process_image(&frame_with_blobs());

        regions
            .set_custom_parameters(&CustomParameters::new().with("min_area", 1))
            .unwrap();
        regions.process_image(&frame_with_blobs());

        assert_eq!(regions.error_history().as_slice(), &[2.0, 3.0]);
    }

    #[test]
    fn test_automatic_threshold() {
        let mut regions = ThresholdRegions::new();
        let frame = frame_with_blobs();
        let t = regions.effective_threshold(&frame);
        assert!(t >= 100.0 && t < 700.0, "threshold {t}");

        regions.process_image(&frame);
        assert_eq!(regions.error_signal(1), Ok(2.0));
    }

    #[test]
    fn test_flat_frame_has_no_regions() {
        let mut regions = ThresholdRegions::new();
        regions.process_image(&Array2::from_elem((10, 10), 100u16));
        assert_eq!(regions.error_signal(1), Ok(0.0));
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let mut regions = ThresholdRegions::new();
        let result = regions.set_custom_parameters(&CustomParameters::new().with("threshold", -3));
        assert!(result.is_err());
        assert_eq!(regions.custom_parameters().get("threshold"), Some(0));
    }
}
