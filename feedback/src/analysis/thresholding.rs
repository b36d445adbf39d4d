//! Thresholding and segmentation primitives for digital frames.

use ndarray::{Array2, ArrayView2};

/// Histogram bins used by [`otsu_threshold`] when the caller passes `None`.
pub const DEFAULT_OTSU_BINS: usize = 256;

const NEIGHBORS_8: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Otsu's threshold of a frame, in DN.
///
/// Picks the histogram split that maximizes the between-class variance of the
/// two pixel populations. The returned value is the brightest pixel of the
/// background class, so [`apply_threshold`] separates exactly the pixels the
/// histogram split put above it. A flat frame returns its single value, so
/// that nothing lies strictly above the threshold.
///
/// # Arguments
/// * `frame` - Digital frame
/// * `bins` - Histogram bins, defaults to [`DEFAULT_OTSU_BINS`]
pub fn otsu_threshold(frame: ArrayView2<u16>, bins: Option<usize>) -> f64 {
    let bins = bins.unwrap_or(DEFAULT_OTSU_BINS).max(2);

    let (min_val, max_val) = frame
        .iter()
        .fold((u16::MAX, u16::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if frame.is_empty() || min_val == max_val {
        return f64::from(min_val);
    }

    let min_val = f64::from(min_val);
    let scale = (bins as f64 - 1.0) / (f64::from(max_val) - min_val);

    let bin_of = |pixel: u16| {
        let bin = ((f64::from(pixel) - min_val) * scale).round() as usize;
        bin.min(bins - 1)
    };

    let mut histogram = vec![0u64; bins];
    for &pixel in frame.iter() {
        histogram[bin_of(pixel)] += 1;
    }

    let total = frame.len() as f64;
    let total_weighted: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &count)| i as f64 * count as f64)
        .sum();

    let mut below = 0u64;
    let mut below_weighted = 0.0;
    let mut best_bin = 0;
    let mut best_variance = 0.0;

    for (t, &count) in histogram.iter().enumerate().take(bins - 1) {
        below += count;
        below_weighted += t as f64 * count as f64;
        if below == 0 || below as f64 == total {
            continue;
        }

        let w_bg = below as f64 / total;
        let w_fg = 1.0 - w_bg;
        let mean_bg = below_weighted / below as f64;
        let mean_fg = (total_weighted - below_weighted) / (total - below as f64);
        let variance = w_bg * w_fg * (mean_bg - mean_fg).powi(2);

        if variance > best_variance {
            best_variance = variance;
            best_bin = t;
        }
    }

    frame
        .iter()
        .filter(|&&pixel| bin_of(pixel) <= best_bin)
        .fold(min_val, |hi, &pixel| hi.max(f64::from(pixel)))
}

/// Binary mask of pixels strictly above `threshold`.
pub fn apply_threshold(frame: ArrayView2<u16>, threshold: f64) -> Array2<bool> {
    frame.mapv(|v| f64::from(v) > threshold)
}

/// Pixel areas of the 8-connected regions of `mask`, in raster order of each
/// region's first pixel.
pub fn connected_region_areas(mask: ArrayView2<bool>) -> Vec<usize> {
    let (rows, cols) = mask.dim();
    let mut visited = Array2::from_elem((rows, cols), false);
    let mut areas = Vec::new();
    let mut stack = Vec::new();

    for ((row, col), &set) in mask.indexed_iter() {
        if !set || visited[[row, col]] {
            continue;
        }

        visited[[row, col]] = true;
        stack.push((row, col));
        let mut area = 0;

        while let Some((r, c)) = stack.pop() {
            area += 1;
            for &(dr, dc) in &NEIGHBORS_8 {
                let (Some(nr), Some(nc)) = (r.checked_add_signed(dr), c.checked_add_signed(dc))
                else {
                    continue;
                };
                if nr < rows && nc < cols && mask[[nr, nc]] && !visited[[nr, nc]] {
                    visited[[nr, nc]] = true;
                    stack.push((nr, nc));
                }
            }
        }

        areas.push(area);
    }

    areas
}
