//! The compression pipeline.
//!
//! ```text
//! SourceImage
//!   → normalize   legacy containers converted losslessly
//!   → decode
//!   → detect      face count (best-effort, never fatal)
//!   → plan        target dimensions under the profile ceiling
//!   → resample    Lanczos3 + light sharpening, only when shrinking
//!   → saturate    platform profiles only
//!   → encode      quality policy from [`crate::quality`]
//!   → CompressionOutcome
//! ```
//!
//! A [`Compressor`] owns its collaborators: the image backend, the format
//! converter, and an optional shared face detector. It holds no per-run
//! state, so one instance can serve many runs in parallel
//! ([`Compressor::compress_batch`]).

use crate::config::CompressConfig;
use crate::error::CompressError;
use crate::faces::{DetectionResult, FaceDetector, RustfaceDetector, detect_faces};
use crate::imaging::{
    Dimensions, ImageBackend, Quality, ResampleParams, RustBackend, needs_resample,
    plan_dimensions,
};
use crate::normalize::{ContainerConverter, FormatConverter, normalize};
use crate::outcome::{Advisory, CompressionOutcome};
use crate::profile::Platform;
use crate::quality::{Verdict, encode_with_safety_valve, search_legacy, select_initial_quality};
use crate::types::{EncodedCandidate, SourceImage};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Compressor<B: ImageBackend = RustBackend> {
    backend: B,
    config: CompressConfig,
    converter: Box<dyn FormatConverter>,
    detector: Option<Arc<dyn FaceDetector>>,
}

impl Compressor<RustBackend> {
    /// Pure-Rust backend, built-in converter, no face detector.
    pub fn new(config: CompressConfig) -> Self {
        Self::with_backend(RustBackend::new(), config)
    }

    /// Like [`Compressor::new`], plus a SeetaFace detector when
    /// `faces.enabled` is set and a model path is configured.
    ///
    /// Detection enabled without a model logs a warning; every run then
    /// reports zero faces.
    pub fn from_config(config: CompressConfig) -> Self {
        let detector = match (config.faces.enabled, &config.faces.model_path) {
            (true, Some(path)) => Some(Arc::new(RustfaceDetector::new(
                path.clone(),
                config.faces.detector_settings(),
            )) as Arc<dyn FaceDetector>),
            (true, None) => {
                warn!("face detection is enabled but faces.model_path is not set; face-aware quality is off");
                None
            }
            (false, _) => None,
        };
        let mut compressor = Self::new(config);
        compressor.detector = detector;
        compressor
    }
}

impl<B: ImageBackend> Compressor<B> {
    pub fn with_backend(backend: B, config: CompressConfig) -> Self {
        Self {
            backend,
            config,
            converter: Box::new(ContainerConverter),
            detector: None,
        }
    }

    /// Share a face detector with this compressor.
    pub fn with_face_detector(mut self, detector: Arc<dyn FaceDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Replace the built-in legacy format converter.
    pub fn with_converter(mut self, converter: impl FormatConverter + 'static) -> Self {
        self.converter = Box::new(converter);
        self
    }

    pub fn config(&self) -> &CompressConfig {
        &self.config
    }

    pub fn has_face_detector(&self) -> bool {
        self.detector.is_some()
    }

    /// Run the pipeline once.
    pub fn compress(
        &self,
        source: &SourceImage,
        platform: Platform,
    ) -> Result<CompressionOutcome, CompressError> {
        if source.is_empty() {
            return Err(CompressError::Decode(format!(
                "{}: empty input",
                source.file_name
            )));
        }

        let normalized = normalize(source, self.converter.as_ref())?;
        let image = self
            .backend
            .decode(&normalized.source.bytes)
            .map_err(|e| CompressError::Decode(format!("{}: {}", source.file_name, e)))?;
        let decoded = Dimensions::of(&image);
        debug!(file = %source.file_name, width = decoded.width, height = decoded.height, "decoded");

        let faces = self.detect(&image).count();

        let settings = platform.settings(&self.config);
        let target = plan_dimensions(decoded.as_tuple(), settings.ceiling());
        let image = if needs_resample(decoded.as_tuple(), target) {
            debug!(from = ?decoded.as_tuple(), to = ?target, "resampling");
            self.backend
                .resample(&image, &ResampleParams::new(target.0, target.1))
                .map_err(|e| CompressError::Resample(format!("{}: {}", source.file_name, e)))?
        } else {
            image
        };

        let image = if (settings.saturation_boost - 1.0).abs() > f32::EPSILON {
            self.backend.saturate(image, settings.saturation_boost)
        } else {
            image
        };
        let output = Dimensions::of(&image);

        let original_size = source.len();
        let encode = |quality: Quality| {
            self.backend
                .encode(&image, quality)
                .map(|bytes| EncodedCandidate {
                    bytes,
                    quality: quality.value(),
                })
                .map_err(|e| CompressError::Encode(format!("{}: {}", source.file_name, e)))
        };

        let outcome = if normalized.converted {
            let result = search_legacy(&self.config.legacy, original_size, encode)?;
            debug!(
                attempts = result.attempts,
                accepted = result.accepted,
                "legacy quality search"
            );
            CompressionOutcome::reencoded(
                result.candidate,
                original_size,
                faces,
                output,
                Some(Advisory::FormatConverted),
            )
        } else {
            let initial = select_initial_quality(settings.quality, faces, &self.config.quality);
            match encode_with_safety_valve(initial, original_size, &self.config.thresholds, encode)? {
                Verdict::Reencoded(candidate) => {
                    CompressionOutcome::reencoded(candidate, original_size, faces, output, None)
                }
                Verdict::KeepOriginal => CompressionOutcome::already_optimized(source, faces),
            }
        };

        info!(
            file = %source.file_name,
            platform = platform.name(),
            original = outcome.original_size,
            compressed = outcome.compressed_size,
            faces,
            advisory = ?outcome.advisory,
            "compressed"
        );
        Ok(outcome)
    }

    /// Compress independent sources in parallel on the rayon pool.
    ///
    /// Results are returned in input order; one failure does not affect
    /// the others.
    pub fn compress_batch(
        &self,
        sources: &[SourceImage],
        platform: Platform,
    ) -> Vec<Result<CompressionOutcome, CompressError>> {
        sources
            .par_iter()
            .map(|source| self.compress(source, platform))
            .collect()
    }

    fn detect(&self, image: &image::DynamicImage) -> DetectionResult {
        if !self.config.faces.enabled {
            return DetectionResult::none();
        }
        detect_faces(
            self.detector.as_deref(),
            image,
            self.config.faces.detection_max_edge,
        )
    }
}
