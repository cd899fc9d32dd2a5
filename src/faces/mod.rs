//! Face detection: a pluggable detector trait plus the best-effort glue the
//! pipeline calls.
//!
//! Detection only steers quality selection, so it must never abort a
//! compression. [`detect_faces`] turns every failure mode (no detector,
//! detector error, detector panic) into a zero-face [`DetectionResult`].
//!
//! Detectors are explicitly owned handles. Build one at startup, wrap it in
//! an `Arc`, and hand it to every [`Compressor`](crate::Compressor) that
//! should share it. Implementations must tolerate concurrent `detect` calls.

pub mod rustface_backend;

pub use rustface_backend::{DetectorSettings, RustfaceDetector};

use image::DynamicImage;
use image::imageops::FilterType;
use std::panic::{AssertUnwindSafe, catch_unwind};
use thiserror::Error;
use tracing::{debug, warn};

/// Why a detector could not produce a result. Never fatal to a run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionFailure {
    #[error("face model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("face detection failed: {0}")]
    Runtime(String),
}

/// Bounding box of a detected face, in source image pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Detector-specific confidence score.
    pub confidence: f64,
}

/// Faces found in one image. Only `count` feeds quality selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionResult {
    pub faces: Vec<FaceBounds>,
}

impl DetectionResult {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.faces.len()
    }
}

/// Pluggable face detection backend.
///
/// Implement this trait to provide a custom detector (ONNX, dlib, a remote
/// service, ...) and pass it to
/// [`Compressor::with_face_detector`](crate::Compressor::with_face_detector).
pub trait FaceDetector: Send + Sync {
    /// Detect faces in a row-major grayscale buffer of `width` × `height` bytes.
    fn detect(
        &self,
        gray: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<FaceBounds>, DetectionFailure>;
}

/// Run `detector` over `image`, downgrading every failure to zero faces.
///
/// Images whose longer edge exceeds `max_edge` are downsampled before
/// detection (0 disables this); returned boxes are mapped back to the
/// original coordinates.
pub fn detect_faces(
    detector: Option<&dyn FaceDetector>,
    image: &DynamicImage,
    max_edge: u32,
) -> DetectionResult {
    let Some(detector) = detector else {
        debug!("face detection disabled");
        return DetectionResult::none();
    };

    let (width, height) = (image.width(), image.height());
    let longer = width.max(height);
    let (gray, scale) = if max_edge > 0 && longer > max_edge {
        let scale = max_edge as f64 / longer as f64;
        let w = ((width as f64 * scale).round() as u32).max(1);
        let h = ((height as f64 * scale).round() as u32).max(1);
        (image.resize_exact(w, h, FilterType::Triangle).to_luma8(), scale)
    } else {
        (image.to_luma8(), 1.0)
    };

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        detector.detect(gray.as_raw(), gray.width(), gray.height())
    }));

    match outcome {
        Ok(Ok(faces)) => {
            let faces: Vec<FaceBounds> = faces
                .into_iter()
                .map(|f| FaceBounds {
                    x: f.x / scale,
                    y: f.y / scale,
                    width: f.width / scale,
                    height: f.height / scale,
                    confidence: f.confidence,
                })
                .collect();
            debug!(count = faces.len(), "face detection complete");
            DetectionResult { faces }
        }
        Ok(Err(e)) => {
            warn!(error = %e, "face detection unavailable, assuming no faces");
            DetectionResult::none()
        }
        Err(_) => {
            warn!("face detector panicked, assuming no faces");
            DetectionResult::none()
        }
    }
}
