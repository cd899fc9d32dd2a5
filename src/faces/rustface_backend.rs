//! Face detector backed by the `rustface` crate (SeetaFace engine).

use super::{DetectionFailure, FaceBounds, FaceDetector};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

/// Tuning knobs passed straight to the SeetaFace cascade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorSettings {
    pub min_face_size: u32,
    pub score_threshold: f64,
    pub pyramid_scale_factor: f32,
    pub slide_window_step: u32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            min_face_size: 20,
            score_threshold: 2.0,
            pyramid_scale_factor: 0.8,
            slide_window_step: 4,
        }
    }
}

/// SeetaFace frontal face detector.
///
/// The model file is read lazily on the first `detect` call and kept for
/// the detector's lifetime; a failed load is remembered too, so a missing
/// model costs one filesystem probe per process rather than one per image.
/// Each call builds a fresh cascade from the shared model, which keeps
/// concurrent calls independent.
pub struct RustfaceDetector {
    model_path: PathBuf,
    settings: DetectorSettings,
    model: OnceLock<Result<rustface::Model, String>>,
}

impl RustfaceDetector {
    pub fn new(model_path: impl Into<PathBuf>, settings: DetectorSettings) -> Self {
        Self {
            model_path: model_path.into(),
            settings,
            model: OnceLock::new(),
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    fn model(&self) -> Result<&rustface::Model, DetectionFailure> {
        self.model
            .get_or_init(|| {
                let file = std::fs::File::open(&self.model_path)
                    .map_err(|e| format!("{}: {}", self.model_path.display(), e))?;
                let model = rustface::read_model(std::io::BufReader::new(file))
                    .map_err(|e| format!("{}: {}", self.model_path.display(), e))?;
                info!(path = %self.model_path.display(), "loaded face model");
                Ok(model)
            })
            .as_ref()
            .map_err(|e| DetectionFailure::ModelUnavailable(e.clone()))
    }
}

impl FaceDetector for RustfaceDetector {
    fn detect(
        &self,
        gray: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<FaceBounds>, DetectionFailure> {
        let model = self.model()?.clone();
        let mut detector = rustface::create_detector_with_model(model);
        detector.set_min_face_size(self.settings.min_face_size);
        detector.set_score_thresh(self.settings.score_threshold);
        detector.set_pyramid_scale_factor(self.settings.pyramid_scale_factor);
        detector.set_slide_window_step(
            self.settings.slide_window_step,
            self.settings.slide_window_step,
        );

        let faces = detector.detect(&rustface::ImageData::new(gray, width, height));
        debug!(count = faces.len(), width, height, "rustface pass");

        Ok(faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                FaceBounds {
                    x: bbox.x() as f64,
                    y: bbox.y() as f64,
                    width: bbox.width() as f64,
                    height: bbox.height() as f64,
                    confidence: face.score(),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_is_a_detection_failure() {
        let detector =
            RustfaceDetector::new("/nonexistent/seeta_fd_frontal_v1.0.bin", Default::default());
        let gray = vec![0u8; 16 * 16];
        let result = detector.detect(&gray, 16, 16);
        assert!(matches!(result, Err(DetectionFailure::ModelUnavailable(_))));
    }

    #[test]
    fn failed_load_is_cached() {
        let detector = RustfaceDetector::new("/nonexistent/model.bin", Default::default());
        let gray = vec![0u8; 4];
        let first = detector.detect(&gray, 2, 2).unwrap_err();
        let second = detector.detect(&gray, 2, 2).unwrap_err();
        assert_eq!(first, second);
        assert!(detector.model.get().is_some());
    }

    #[test]
    fn model_path_is_kept() {
        let detector = RustfaceDetector::new("models/seeta.bin", Default::default());
        assert_eq!(detector.model_path(), Path::new("models/seeta.bin"));
        assert!(detector.model.get().is_none());
    }

    #[test]
    fn default_settings_match_seeta_recommendations() {
        let s = DetectorSettings::default();
        assert_eq!(s.min_face_size, 20);
        assert_eq!(s.score_threshold, 2.0);
        assert_eq!(s.pyramid_scale_factor, 0.8);
        assert_eq!(s.slide_window_step, 4);
    }
}
