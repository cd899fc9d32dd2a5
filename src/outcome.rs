//! Result assembly.
//!
//! A [`CompressionOutcome`] is what callers get back from a run: the chosen
//! bytes behind a cheap [`Payload`] handle plus the numbers needed to show
//! the user what happened.

use crate::imaging::{Dimensions, Quality};
use crate::types::{EncodedCandidate, SourceImage};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// Immutable output bytes. Cloning shares the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    bytes: Arc<[u8]>,
    mime_type: String,
}

impl Payload {
    pub fn new(bytes: impl Into<Arc<[u8]>>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Suggested file extension for the payload's MIME type.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/webp" => "webp",
            "image/gif" => "gif",
            "image/bmp" => "bmp",
            "image/tiff" => "tiff",
            "image/heic" => "heic",
            "image/heif" => "heif",
            "image/avif" => "avif",
            _ => "bin",
        }
    }

    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &self.bytes)
    }
}

/// Why the outcome is not a plain re-encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Advisory {
    /// Re-encoding did not pay off; the payload is the original input.
    AlreadyOptimized,
    /// The input was a legacy format and was converted. The payload may be
    /// larger than the original.
    FormatConverted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompressionOutcome {
    pub payload: Payload,
    pub original_size: usize,
    pub compressed_size: usize,
    pub faces_detected: usize,
    pub advisory: Option<Advisory>,
    /// Encode quality of the payload; `None` when the original was returned.
    pub quality_used: Option<f32>,
    /// Output dimensions; `None` when the original was returned.
    pub dimensions: Option<Dimensions>,
}

impl CompressionOutcome {
    /// The original bytes, untouched.
    pub fn already_optimized(source: &SourceImage, faces_detected: usize) -> Self {
        Self {
            payload: Payload::new(source.bytes.as_slice(), source.mime_type.clone()),
            original_size: source.len(),
            compressed_size: source.len(),
            faces_detected,
            advisory: Some(Advisory::AlreadyOptimized),
            quality_used: None,
            dimensions: None,
        }
    }

    /// A new JPEG encode. `advisory` is `FormatConverted` for legacy sources.
    pub fn reencoded(
        candidate: EncodedCandidate,
        original_size: usize,
        faces_detected: usize,
        dimensions: Dimensions,
        advisory: Option<Advisory>,
    ) -> Self {
        let compressed_size = candidate.size();
        Self {
            payload: Payload::new(candidate.bytes, "image/jpeg"),
            original_size,
            compressed_size,
            faces_detected,
            advisory,
            quality_used: Some(candidate.quality),
            dimensions: Some(dimensions),
        }
    }

    /// Percentage saved relative to the original. Negative when the output
    /// grew (possible for converted legacy formats).
    pub fn savings_percent(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        (self.original_size as f64 - self.compressed_size as f64) / self.original_size as f64
            * 100.0
    }

    pub fn summary(&self, file_name: &str) -> OutcomeSummary {
        OutcomeSummary {
            file: file_name.to_string(),
            original_size: self.original_size,
            compressed_size: self.compressed_size,
            savings_percent: (self.savings_percent() * 10.0).round() / 10.0,
            faces_detected: self.faces_detected,
            advisory: self.advisory,
            quality: self.quality_used.map(|q| Quality::new(q).percent()),
            mime_type: self.payload.mime_type().to_string(),
            width: self.dimensions.map(|d| d.width),
            height: self.dimensions.map(|d| d.height),
        }
    }
}

/// Flat, serializable view of an outcome for `--json` output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeSummary {
    pub file: String,
    pub original_size: usize,
    pub compressed_size: usize,
    pub savings_percent: f64,
    pub faces_detected: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory: Option<Advisory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn jpeg_source(len: usize) -> SourceImage {
        SourceImage::new(vec![7; len], "image/jpeg", "a.jpg")
    }

    #[test]
    fn already_optimized_returns_original_bytes() {
        let source = jpeg_source(500);
        let outcome = CompressionOutcome::already_optimized(&source, 1);

        assert_eq!(outcome.payload.as_bytes(), source.bytes.as_slice());
        assert_eq!(outcome.compressed_size, outcome.original_size);
        assert_eq!(outcome.advisory, Some(Advisory::AlreadyOptimized));
        assert_eq!(outcome.savings_percent(), 0.0);
        assert_eq!(outcome.payload.extension(), "jpg");
    }

    #[test]
    fn reencoded_reports_savings() {
        let candidate = EncodedCandidate {
            bytes: vec![0; 250],
            quality: 0.85,
        };
        let dims = Dimensions {
            width: 100,
            height: 50,
        };
        let outcome = CompressionOutcome::reencoded(candidate, 1000, 0, dims, None);

        assert_eq!(outcome.compressed_size, 250);
        assert_eq!(outcome.savings_percent(), 75.0);
        assert_eq!(outcome.payload.mime_type(), "image/jpeg");
        assert_eq!(outcome.quality_used, Some(0.85));
    }

    #[test]
    fn converted_outcome_can_grow() {
        let candidate = EncodedCandidate {
            bytes: vec![0; 1200],
            quality: 0.72,
        };
        let dims = Dimensions {
            width: 10,
            height: 10,
        };
        let outcome = CompressionOutcome::reencoded(
            candidate,
            1000,
            0,
            dims,
            Some(Advisory::FormatConverted),
        );
        assert!(outcome.savings_percent() < 0.0);
    }

    #[test]
    fn payload_clones_share_buffer() {
        let payload = Payload::new(vec![1, 2, 3], "image/png");
        let clone = payload.clone();
        assert!(std::ptr::eq(payload.as_bytes(), clone.as_bytes()));
        assert_eq!(clone.extension(), "png");
    }

    #[test]
    fn payload_write_to_creates_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out/nested/a.jpg");
        Payload::new(vec![1, 2, 3], "image/jpeg")
            .write_to(&path)
            .unwrap();
        assert_eq!(fs::read(&path).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn summary_serializes_kebab_case_advisory() {
        let outcome = CompressionOutcome::already_optimized(&jpeg_source(10), 0);
        let json = serde_json::to_value(outcome.summary("a.jpg")).unwrap();
        assert_eq!(json["advisory"], "already-optimized");
        assert_eq!(json["file"], "a.jpg");
        assert!(json.get("quality").is_none());
    }
}
