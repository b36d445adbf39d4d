//! Camera model for synthetic fluorescence frames.
//!
//! Converts an image of expected photon counts into a noisy digital frame:
//!
//! 1. Photons are converted to expected electrons via the quantum efficiency,
//!    and the dark current accumulated over one exposure is added.
//! 2. Shot noise: each pixel is Poisson-sampled around that expectation.
//! 3. Readout noise: zero-mean Gaussian with the configured RMS.
//! 4. Gain and ADC offset are applied, and the value is rounded and clamped
//!    (never wrapped) to the digital range given by the bit depth.
//!
//! The camera holds no mutable state. Randomness comes from the caller: one
//! `u64` is drawn per frame and seeds the chunked noise streams.

use ndarray::Array2;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use shared::image_proc::noise::sample_sensor_electrons;
use thiserror::Error;

/// Digital frame produced by the camera, indexed `[row, column]`.
pub type Frame = Array2<u16>;

/// Ratio between the Gaussian sigma and λ/NA for a diffraction-limited spot.
const GAUSSIAN_PSF_FACTOR: f64 = 0.21;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    #[error("sensor must have non-zero dimensions, got {width}x{height}")]
    EmptySensor { width: usize, height: usize },
    #[error("invalid camera parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error("bit depth must be between 1 and 16, got {0}")]
    InvalidBitDepth(u8),
    #[error("photon image is {got_rows}x{got_cols}, camera expects {rows}x{cols}")]
    ShapeMismatch {
        rows: usize,
        cols: usize,
        got_rows: usize,
        got_cols: usize,
    },
}

/// Static description of the camera and the imaging optics in front of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Sensor width in pixels
    pub width_px: usize,
    /// Sensor height in pixels
    pub height_px: usize,
    /// Physical pixel pitch in micrometers
    pub pixel_size_um: f64,
    /// Total magnification between sample and sensor
    pub magnification: f64,
    /// Numerical aperture of the objective
    pub numerical_aperture: f64,
    /// Emission wavelength in nanometers
    pub wavelength_nm: f64,
    /// Fraction of photons converted to electrons, in [0, 1]
    pub quantum_efficiency: f64,
    /// Digital numbers per electron
    pub gain_dn_per_e: f64,
    /// Readout noise RMS in electrons
    pub read_noise_e: f64,
    /// Dark current in electrons per pixel per second
    pub dark_current_e_p_s: f64,
    /// Constant ADC baseline in digital numbers
    pub adc_offset_dn: f64,
    /// ADC resolution in bits
    pub bit_depth: u8,
    /// Exposure time of one frame in seconds, also the simulation tick
    pub exposure_s: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width_px: 64,
            height_px: 64,
            pixel_size_um: 6.45,
            magnification: 100.0,
            numerical_aperture: 1.45,
            wavelength_nm: 600.0,
            quantum_efficiency: 0.9,
            gain_dn_per_e: 1.0,
            read_noise_e: 1.6,
            dark_current_e_p_s: 0.06,
            adc_offset_dn: 100.0,
            bit_depth: 16,
            exposure_s: 0.01,
        }
    }
}

impl CameraConfig {
    /// Noise-free camera with unit gain and no offset.
    ///
    /// Useful for tests where frames must equal the rounded photon image.
    pub fn noiseless(width_px: usize, height_px: usize) -> Self {
        Self {
            width_px,
            height_px,
            quantum_efficiency: 1.0,
            gain_dn_per_e: 1.0,
            read_noise_e: 0.0,
            dark_current_e_p_s: 0.0,
            adc_offset_dn: 0.0,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), CameraError> {
        if self.width_px == 0 || self.height_px == 0 {
            return Err(CameraError::EmptySensor {
                width: self.width_px,
                height: self.height_px,
            });
        }
        if self.bit_depth == 0 || self.bit_depth > 16 {
            return Err(CameraError::InvalidBitDepth(self.bit_depth));
        }

        let strictly_positive = [
            ("pixel_size_um", self.pixel_size_um),
            ("magnification", self.magnification),
            ("numerical_aperture", self.numerical_aperture),
            ("wavelength_nm", self.wavelength_nm),
            ("exposure_s", self.exposure_s),
        ];
        for (name, value) in strictly_positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(CameraError::InvalidParameter { name, value });
            }
        }

        let non_negative = [
            ("gain_dn_per_e", self.gain_dn_per_e),
            ("read_noise_e", self.read_noise_e),
            ("dark_current_e_p_s", self.dark_current_e_p_s),
            ("adc_offset_dn", self.adc_offset_dn),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(CameraError::InvalidParameter { name, value });
            }
        }

        if !(0.0..=1.0).contains(&self.quantum_efficiency) {
            return Err(CameraError::InvalidParameter {
                name: "quantum_efficiency",
                value: self.quantum_efficiency,
            });
        }

        Ok(())
    }
}

/// Validated, immutable camera.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    config: CameraConfig,
}

impl Camera {
    /// Create a camera, rejecting invalid configurations.
    ///
    /// # Errors
    /// Returns [`CameraError`] for empty sensors, out-of-range bit depths and
    /// negative, zero or non-finite physical parameters. Nothing is clamped.
    pub fn new(config: CameraConfig) -> Result<Self, CameraError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Sensor dimensions as (width, height)
    pub fn dimensions(&self) -> (usize, usize) {
        (self.config.width_px, self.config.height_px)
    }

    /// Array shape of frames from this camera, (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.config.height_px, self.config.width_px)
    }

    /// Duration of one frame in seconds.
    pub fn exposure_s(&self) -> f64 {
        self.config.exposure_s
    }

    /// Largest digital value the ADC can report.
    pub fn max_value(&self) -> u16 {
        ((1u32 << self.config.bit_depth) - 1) as u16
    }

    /// Effective pixel size projected into the sample plane, in micrometers.
    pub fn sample_pixel_size_um(&self) -> f64 {
        self.config.pixel_size_um / self.config.magnification
    }

    /// Standard deviation of the Gaussian PSF approximation in pixels.
    ///
    /// Uses sigma ≈ 0.21 λ / NA in the sample plane, scaled by the
    /// magnification onto the sensor.
    pub fn psf_sigma_px(&self) -> f64 {
        let sigma_um =
            GAUSSIAN_PSF_FACTOR * (self.config.wavelength_nm * 1e-3) / self.config.numerical_aperture;
        sigma_um / self.sample_pixel_size_um()
    }

    /// Full width at half maximum of the PSF in pixels.
    pub fn psf_fwhm_px(&self) -> f64 {
        self.psf_sigma_px() * 2.0 * (2.0 * std::f64::consts::LN_2).sqrt()
    }

    /// Empty photon accumulator with this camera's shape.
    pub fn blank_photon_image(&self) -> Array2<f64> {
        Array2::zeros(self.shape())
    }

    /// Expected dark electrons per pixel over one exposure.
    pub fn dark_electrons_per_frame(&self) -> f64 {
        self.config.dark_current_e_p_s * self.config.exposure_s
    }

    /// Render an image of expected photon counts into a digital frame.
    ///
    /// Draws exactly one `u64` from `rng`, so a shared RNG stream keeps a
    /// well-defined draw order across the emitters and the camera.
    ///
    /// # Errors
    /// [`CameraError::ShapeMismatch`] if `photons` does not match [`Camera::shape`].
    pub fn render<R: RngCore + ?Sized>(
        &self,
        photons: &Array2<f64>,
        rng: &mut R,
    ) -> Result<Frame, CameraError> {
        let (rows, cols) = self.shape();
        let (got_rows, got_cols) = photons.dim();
        if (rows, cols) != (got_rows, got_cols) {
            return Err(CameraError::ShapeMismatch {
                rows,
                cols,
                got_rows,
                got_cols,
            });
        }

        let seed = rng.next_u64();
        let qe = self.config.quantum_efficiency;
        let dark = self.dark_electrons_per_frame();

        let mean_electrons = photons.mapv(|p| p.max(0.0) * qe + dark);
        let electrons = sample_sensor_electrons(&mean_electrons, self.config.read_noise_e, seed);

        Ok(self.quantize(&electrons))
    }

    /// Apply gain and offset, then round and clamp into the ADC range.
    pub fn quantize(&self, electrons: &Array2<f64>) -> Frame {
        let gain = self.config.gain_dn_per_e;
        let offset = self.config.adc_offset_dn;
        let max = self.max_value() as f64;

        electrons.mapv(|e| (e * gain + offset).round().clamp(0.0, max) as u16)
    }
}
