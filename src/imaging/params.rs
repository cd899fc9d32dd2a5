//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the pipeline (which decides sizes and qualities) and
//! the [`backend`](super::backend) (which does the pixel work), so a mock
//! backend can stand in for the real one in tests.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality on a normalized `(0, 1]` scale. Clamped on construction.
//! - [`Sharpening`]: Unsharp-mask parameters (sigma + threshold) applied after downscaling.
//! - [`ResampleParams`]: Target dimensions plus the sharpening pass to apply.

/// Lowest quality the encoder will ever be asked for.
pub const MIN_QUALITY: f32 = 0.01;

/// Quality setting for lossy image encoding, normalized to `(0, 1]`.
///
/// Callers never see encoder-native units; [`Quality::percent`] is the only
/// conversion to the 1–100 scale the JPEG encoder takes.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Quality(f32);

impl Quality {
    /// Clamp `value` into `(0, 1]`. NaN maps to the minimum.
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self(MIN_QUALITY);
        }
        Self(value.clamp(MIN_QUALITY, 1.0))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Encoder-native 1–100 scale.
    pub fn percent(self) -> u8 {
        (self.0 * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(0.85)
    }
}

/// Sharpening parameters for unsharp mask.
///
/// - `sigma`: Standard deviation of the Gaussian blur (higher = more sharpening)
/// - `threshold`: Minimum brightness difference to sharpen (0 = sharpen all pixels)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sharpening {
    pub sigma: f32,
    pub threshold: i32,
}

impl Sharpening {
    /// Light sharpening that offsets resample softness without halos.
    pub fn light() -> Self {
        Self {
            sigma: 0.5,
            threshold: 0,
        }
    }
}

/// Parameters for a downscale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResampleParams {
    pub width: u32,
    pub height: u32,
    pub sharpening: Sharpening,
}

impl ResampleParams {
    /// Downscale to `(width, height)` with the fixed light sharpening pass.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            sharpening: Sharpening::light(),
        }
    }
}
