//! Seeded parallel traversal of 2D arrays
//!
//! An array is cut into horizontal bands of a fixed number of rows. Band `i`
//! is handed to a rayon worker together with its own `StdRng`, seeded with
//! [`band_seed`]`(seed, i)`. Band boundaries depend only on the array shape and
//! the band height, so a given seed yields the same output on any pool size.

use log::trace;
use ndarray::{s, Array2, ArrayViewMut2, Axis, Zip};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

/// Default number of rows per band.
pub const DEFAULT_BAND_ROWS: usize = 64;

/// Seed of the RNG stream owned by band `index`.
pub fn band_seed(seed: u64, index: usize) -> u64 {
    seed.wrapping_add(index as u64)
}

/// Visit `array` band by band in parallel, mutating it in place.
///
/// `visit` receives the index of the band's first row, a mutable view of the
/// band and the band's RNG. A `band_rows` of zero is treated as one.
pub fn for_each_seeded_band<T, F>(array: &mut Array2<T>, seed: u64, band_rows: usize, visit: F)
where
    T: Send + Sync,
    F: Fn(usize, ArrayViewMut2<T>, &mut StdRng) + Send + Sync,
{
    let band_rows = band_rows.max(1);
    trace!(
        "visiting {}x{} array in {band_rows}-row bands, seed {seed}",
        array.nrows(),
        array.ncols()
    );

    array
        .axis_chunks_iter_mut(Axis(0), band_rows)
        .into_par_iter()
        .enumerate()
        .for_each(|(index, band)| {
            let mut rng = StdRng::seed_from_u64(band_seed(seed, index));
            visit(index * band_rows, band, &mut rng);
        });
}

/// Element-wise random map: `out[r, c] = sample(&input[r, c], rng)`.
///
/// Within a band, elements are drawn in row-major order from that band's RNG.
///
/// # Example
/// ```
/// use ndarray::Array2;
/// use rand::Rng;
/// use shared::algo::parallel::map_seeded;
///
/// let means = Array2::from_elem((10, 4), 1.0);
/// let a = map_seeded(&means, 5, 3, |&m, rng| m + rng.random::<f64>());
/// let b = map_seeded(&means, 5, 3, |&m, rng| m + rng.random::<f64>());
/// assert_eq!(a, b);
/// ```
pub fn map_seeded<T, U, F>(input: &Array2<T>, seed: u64, band_rows: usize, sample: F) -> Array2<U>
where
    T: Sync,
    U: Send + Sync + Clone + Default,
    F: Fn(&T, &mut StdRng) -> U + Send + Sync,
{
    let mut out = Array2::from_elem(input.dim(), U::default());
    for_each_seeded_band(&mut out, seed, band_rows, |first_row, mut band, rng| {
        let source = input.slice(s![first_row..first_row + band.nrows(), ..]);
        Zip::from(&mut band)
            .and(&source)
            .for_each(|dst, src| *dst = sample(src, rng));
    });
    out
}
