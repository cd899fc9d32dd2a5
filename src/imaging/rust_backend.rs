//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, GIF, BMP) | `image::load_from_memory` (pure Rust decoders) |
//! | Resample | `DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Sharpening | `image::imageops::unsharpen` |
//! | Saturation | per-pixel channel spread around the pixel mean |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder`, alpha flattened onto white |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{Quality, ResampleParams};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageEncoder, RgbImage};

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Composite any alpha channel onto white. JPEG has no alpha.
fn flatten_alpha(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as f32 / 255.0;
        let blend = |c: u8| (c as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Push each channel away from the pixel's channel mean by `factor`.
fn boost_saturation(image: DynamicImage, factor: f32) -> DynamicImage {
    let mut rgba = image.into_rgba8();
    for pixel in rgba.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let avg = (r as f32 + g as f32 + b as f32) / 3.0;
        let spread = |c: u8| (avg + (c as f32 - avg) * factor).round().clamp(0.0, 255.0) as u8;
        pixel.0 = [spread(r), spread(g), spread(b), a];
    }
    DynamicImage::ImageRgba8(rgba)
}

impl ImageBackend for RustBackend {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError> {
        image::load_from_memory(bytes)
            .map_err(|e| BackendError::ProcessingFailed(format!("Failed to decode image: {}", e)))
    }

    fn resample(
        &self,
        image: &DynamicImage,
        params: &ResampleParams,
    ) -> Result<DynamicImage, BackendError> {
        let source = Dimensions::of(image);
        if params.width == 0 || params.height == 0 {
            return Err(BackendError::ProcessingFailed(format!(
                "Resample target {}x{} has a zero dimension",
                params.width, params.height
            )));
        }
        if params.width > source.width || params.height > source.height {
            return Err(BackendError::ProcessingFailed(format!(
                "Refusing to upscale {}x{} to {}x{}",
                source.width, source.height, params.width, params.height
            )));
        }
        if (params.width, params.height) == source.as_tuple() {
            return Err(BackendError::ProcessingFailed(format!(
                "Resample target equals source size {}x{}",
                source.width, source.height
            )));
        }

        let resized = image.resize_exact(params.width, params.height, FilterType::Lanczos3);
        let sharpening = params.sharpening;
        Ok(DynamicImage::from(image::imageops::unsharpen(
            &resized,
            sharpening.sigma,
            sharpening.threshold,
        )))
    }

    fn saturate(&self, image: DynamicImage, factor: f32) -> DynamicImage {
        if (factor - 1.0).abs() < f32::EPSILON {
            return image;
        }
        boost_saturation(image, factor)
    }

    fn encode(&self, image: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
        let rgb = flatten_alpha(image);
        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, quality.percent())
            .write_image(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {}", e)))?;
        Ok(buffer)
    }
}
