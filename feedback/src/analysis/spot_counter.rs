//! Local-maximum spot counting.

use ndarray::ArrayView2;
use shared::{CustomParameters, History};
use simulator::Frame;

use super::{check_known_parameters, non_negative, EvaluationAlgorithm, EvaluationError};

pub const DEFAULT_NAME: &str = "spot_counter";
pub const DEFAULT_THRESHOLD_DN: i32 = 150;
pub const DEFAULT_BOX_SIZE: i32 = 3;

const THRESHOLD: &str = "threshold";
const BOX_SIZE: &str = "box_size";

/// Counts bright local maxima in each frame.
///
/// A pixel is a spot when its value is strictly above `threshold` and it is the
/// maximum of the `(2·box_size + 1)²` window centred on it, clipped at the
/// frame edges. Equal values inside one window count once, at the first pixel
/// in raster order.
///
/// Parameters: `threshold` (DN), `box_size` (half-width in pixels).
#[derive(Debug, Clone)]
pub struct SpotCounter {
    name: String,
    threshold: i32,
    box_size: i32,
    history: History<f64>,
}

impl Default for SpotCounter {
    fn default() -> Self {
        Self::named(DEFAULT_NAME)
    }
}

impl SpotCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter registered under a custom name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            threshold: DEFAULT_THRESHOLD_DN,
            box_size: DEFAULT_BOX_SIZE,
            history: History::new(),
        }
    }

    pub fn threshold(&self) -> i32 {
        self.threshold
    }

    pub fn box_size(&self) -> i32 {
        self.box_size
    }
}

/// Number of local maxima above `threshold` in `frame`.
pub fn count_local_maxima(frame: ArrayView2<u16>, threshold: i32, box_size: usize) -> usize {
    let (rows, cols) = frame.dim();
    let mut count = 0;

    for ((row, col), &value) in frame.indexed_iter() {
        if i64::from(value) <= i64::from(threshold) {
            continue;
        }

        let r0 = row.saturating_sub(box_size);
        let r1 = (row + box_size).min(rows - 1);
        let c0 = col.saturating_sub(box_size);
        let c1 = (col + box_size).min(cols - 1);

        let mut is_peak = true;
        'window: for r in r0..=r1 {
            for c in c0..=c1 {
                let other = frame[[r, c]];
                let earlier = (r, c) < (row, col);
                if other > value || (other == value && earlier) {
                    is_peak = false;
                    break 'window;
                }
            }
        }

        if is_peak {
            count += 1;
        }
    }

    count
}

impl EvaluationAlgorithm for SpotCounter {
    fn name(&self) -> &str {
        &self.name
    }

    fn process_image(&mut self, frame: &Frame) {
        // box_size is validated non-negative on every update
        let spots = count_local_maxima(frame.view(), self.threshold, self.box_size as usize);
        self.history.push(spots as f64);
    }

    fn error_history(&self) -> &History<f64> {
        &self.history
    }

    fn custom_parameters(&self) -> CustomParameters {
        CustomParameters::new()
            .with(THRESHOLD, self.threshold)
            .with(BOX_SIZE, self.box_size)
    }

    fn set_custom_parameters(&mut self, params: &CustomParameters) -> Result<(), EvaluationError> {
        check_known_parameters(&self.name, &[THRESHOLD, BOX_SIZE], params)?;

        let threshold = params.get(THRESHOLD).unwrap_or(self.threshold);
        let box_size = match params.get(BOX_SIZE) {
            Some(v) => non_negative(BOX_SIZE, v)?,
            None => self.box_size,
        };

        self.threshold = threshold;
        self.box_size = box_size;
        Ok(())
    }
}
