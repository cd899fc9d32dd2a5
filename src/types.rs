//! Input and intermediate types shared across the pipeline.

use std::fs;
use std::io;
use std::path::Path;

/// An image as handed to the compressor. Immutable once received.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    pub bytes: Vec<u8>,
    /// Declared MIME type (e.g. `image/jpeg`). May be empty when unknown.
    pub mime_type: String,
    pub file_name: String,
}

impl SourceImage {
    pub fn new(
        bytes: Vec<u8>,
        mime_type: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            file_name: file_name.into(),
        }
    }

    /// Read a file, declaring its MIME type from the extension.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = path
            .extension()
            .and_then(|e| e.to_str())
            .map(mime_for_extension)
            .unwrap_or("");
        Ok(Self::new(bytes, mime_type, file_name))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Map a file extension (case-insensitive) to the MIME type it implies.
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "heic" => "image/heic",
        "heif" | "hif" => "image/heif",
        "avif" => "image/avif",
        _ => "",
    }
}

/// One encode attempt. Many may be produced and discarded per run.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedCandidate {
    pub bytes: Vec<u8>,
    pub quality: f32,
}

impl EncodedCandidate {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}
