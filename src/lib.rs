//! # Slimshot
//!
//! Adaptive image re-encoding: given an arbitrary user-supplied image,
//! produce a smaller file that keeps its perceived quality. Faces get a
//! quality boost, legacy container formats are converted first, and files
//! that would not meaningfully shrink are returned untouched.
//!
//! ```no_run
//! use slimshot::{CompressConfig, Compressor, Platform, SourceImage};
//! use std::path::Path;
//!
//! let compressor = Compressor::from_config(CompressConfig::default());
//! let source = SourceImage::from_path(Path::new("photo.jpg"))?;
//! let outcome = compressor.compress(&source, Platform::Instagram)?;
//! outcome.payload.write_to(Path::new("photo.min.jpg"))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Pipeline
//!
//! ```text
//! normalize → decode → detect faces → plan → resample → encode → decide
//! ```
//!
//! Each run is synchronous and self-contained. Independent runs may share a
//! [`Compressor`] across threads; see [`Compressor::compress_batch`].
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`compress`] | The [`Compressor`] orchestrating one run end to end |
//! | [`normalize`] | Legacy format detection and lossless conversion |
//! | [`imaging`] | Dimension planning, decode, Lanczos3 resample, JPEG encode |
//! | [`faces`] | Pluggable face detection; rustface (SeetaFace) backend |
//! | [`quality`] | Face-aware quality selection, the encode decision, quality search |
//! | [`outcome`] | Result assembly: payload handle, sizes, advisory |
//! | [`profile`] | Platform profiles (default, Instagram, LinkedIn, TikTok) |
//! | [`config`] | `slimshot.toml` loading, validation, merging |
//! | [`types`] | Source image and encode candidate types |
//! | [`error`] | Fatal pipeline errors |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## The Decision Is a Pure Function
//!
//! Whether to keep a candidate, retry at high quality, or hand back the
//! original is decided by [`quality::decide`] over byte counts alone. The
//! encoder is a closure, so every threshold path is unit-tested without
//! touching pixels.
//!
//! ## Injected Face Detector
//!
//! The detector is an explicit `Arc<dyn FaceDetector>` handle passed to the
//! compressor, never a process-wide singleton. The rustface model is loaded
//! lazily inside that handle, once.
//!
//! ## Pure-Rust Imaging
//!
//! Decode, resample, and encode use the `image` crate; HEIF/AVIF containers
//! are read with `avif-parse` and AV1 payloads decoded with `rav1d`. No
//! system libraries are needed.

pub mod compress;
pub mod config;
pub mod error;
pub mod faces;
pub mod imaging;
pub mod normalize;
pub mod outcome;
pub mod output;
pub mod profile;
pub mod quality;
pub mod types;

pub use compress::Compressor;
pub use config::CompressConfig;
pub use error::CompressError;
pub use outcome::{Advisory, CompressionOutcome, Payload};
pub use profile::Platform;
pub use types::SourceImage;
