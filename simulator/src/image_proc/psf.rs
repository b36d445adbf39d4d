//! Gaussian point spread function rendering into photon accumulators.

use ndarray::Array2;

/// Number of sigmas beyond which PSF contributions are dropped.
const PSF_TRUNCATION_SIGMAS: f64 = 4.0;

/// Adds a point source to an image by approximating a Gaussian PSF.
///
/// The spot is centered at column `x`, row `y` (pixel centers sit on integer
/// coordinates) and is sampled at pixel centers within four sigma. The total
/// added flux is approximately `flux` for spots well inside the image; flux
/// falling outside the image bounds is lost. Spots whose truncation window
/// misses the image entirely, or whose center is not finite, add nothing.
///
/// # Arguments
/// * `image` - Photon accumulator indexed `[row, column]`
/// * `x` - Column coordinate of the spot center
/// * `y` - Row coordinate of the spot center
/// * `flux` - Total photons in the spot
/// * `sigma_px` - Standard deviation of the Gaussian PSF in pixels
///
/// # Examples
/// ```
/// use ndarray::Array2;
/// use simulator::image_proc::psf::add_gaussian_spot;
///
/// let mut image = Array2::zeros((100, 100));
/// add_gaussian_spot(&mut image, 50.0, 50.0, 1000.0, 2.0);
/// assert!((image.sum() - 1000.0).abs() < 1.0);
/// ```
pub fn add_gaussian_spot(image: &mut Array2<f64>, x: f64, y: f64, flux: f64, sigma_px: f64) {
    if flux == 0.0 || !(sigma_px > 0.0) {
        return;
    }

    let (rows, cols) = image.dim();
    if rows == 0 || cols == 0 || !x.is_finite() || !y.is_finite() {
        return;
    }

    // Window edges stay in f64 until clipped to the image, so far-away centers
    // never reach an integer cast
    let reach = (sigma_px.max(1.0) * PSF_TRUNCATION_SIGMAS).ceil();
    let last_row = (rows - 1) as f64;
    let last_col = (cols - 1) as f64;
    let (row_lo, row_hi) = (y.round() - reach, y.round() + reach);
    let (col_lo, col_hi) = (x.round() - reach, x.round() + reach);
    if row_hi < 0.0 || col_hi < 0.0 || row_lo > last_row || col_lo > last_col {
        return;
    }

    let row_min = row_lo.max(0.0) as usize;
    let row_max = row_hi.min(last_row) as usize;
    let col_min = col_lo.max(0.0) as usize;
    let col_max = col_hi.min(last_col) as usize;

    let c = 2.0 * sigma_px * sigma_px;
    let pre_term = flux / (c * std::f64::consts::PI);

    for row in row_min..=row_max {
        let dy = row as f64 - y;
        for col in col_min..=col_max {
            let dx = col as f64 - x;
            let distance_squared = dx * dx + dy * dy;
            image[[row, col]] += pre_term * (-distance_squared / c).exp();
        }
    }
}
