//! Format normalization for legacy container formats.
//!
//! HEIC, HEIF, and AVIF files cannot go straight to the general decoder, so
//! they are first converted to a universal lossless format. Everything else
//! passes through untouched.
//!
//! The converter is a pluggable [`FormatConverter`]. The built-in
//! [`ContainerConverter`] handles AV1-coded HEIF payloads (AVIF and
//! AV1-in-HEIC); HEVC-coded HEIC needs an injected converter.

use crate::error::CompressError;
use crate::imaging::avif::decode_heif_av1;
use crate::types::SourceImage;
use image::ImageEncoder;
use image::codecs::png::PngEncoder;
use std::borrow::Cow;
use std::path::Path;
use tracing::debug;

const LEGACY_MIME_TYPES: &[&str] = &[
    "image/heic",
    "image/heif",
    "image/heic-sequence",
    "image/heif-sequence",
    "image/avif",
];

const LEGACY_EXTENSIONS: &[&str] = &["heic", "heif", "hif", "avif"];

/// True when either the declared MIME type or the file extension names a
/// legacy container format. Both checks are case-insensitive.
pub fn is_legacy_format(mime_type: &str, file_name: &str) -> bool {
    let mime = mime_type.trim().to_ascii_lowercase();
    if LEGACY_MIME_TYPES.contains(&mime.as_str()) {
        return true;
    }
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| LEGACY_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Converts legacy-format bytes into a format the image backend decodes.
pub trait FormatConverter: Send + Sync {
    /// Return the converted image. Must not lose quality.
    fn convert(&self, source: &SourceImage) -> Result<SourceImage, CompressError>;
}

/// Built-in converter: HEIF container → AV1 decode → lossless PNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContainerConverter;

impl FormatConverter for ContainerConverter {
    fn convert(&self, source: &SourceImage) -> Result<SourceImage, CompressError> {
        let image = decode_heif_av1(&source.bytes).map_err(|e| {
            CompressError::Conversion(format!("{}: {}", source.file_name, e))
        })?;

        let rgba = image.to_rgba8();
        let mut png = Vec::new();
        PngEncoder::new(&mut png)
            .write_image(
                rgba.as_raw(),
                rgba.width(),
                rgba.height(),
                image::ExtendedColorType::Rgba8,
            )
            .map_err(|e| CompressError::Conversion(format!("PNG write failed: {}", e)))?;

        let stem = Path::new(&source.file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "converted".to_string());
        Ok(SourceImage::new(png, "image/png", format!("{stem}.png")))
    }
}

/// A source after normalization. Non-legacy input is borrowed, not copied.
#[derive(Debug, Clone)]
pub struct NormalizedSource<'a> {
    pub source: Cow<'a, SourceImage>,
    /// The input was a legacy format and went through the converter.
    pub converted: bool,
}

/// Convert legacy formats, pass everything else through.
///
/// Conversion failure is fatal and not retried.
pub fn normalize<'a>(
    source: &'a SourceImage,
    converter: &dyn FormatConverter,
) -> Result<NormalizedSource<'a>, CompressError> {
    if !is_legacy_format(&source.mime_type, &source.file_name) {
        return Ok(NormalizedSource {
            source: Cow::Borrowed(source),
            converted: false,
        });
    }

    debug!(file = %source.file_name, mime = %source.mime_type, "converting legacy format");
    let converted = converter.convert(source)?;
    debug!(
        file = %source.file_name,
        from = source.len(),
        to = converted.len(),
        "legacy conversion complete"
    );
    Ok(NormalizedSource {
        source: Cow::Owned(converted),
        converted: true,
    })
}
