//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the four pixel operations the
//! compression pipeline needs: decode, resample, saturate, and encode.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust with
//! everything statically linked into the binary. Tests substitute the
//! recording `MockBackend` so the quality state machine can be driven
//! with scripted encode sizes.

use super::params::{Quality, ResampleParams};
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn of(image: &DynamicImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Trait for image processing backends.
///
/// Every backend must implement all four operations so the pipeline stays
/// backend-agnostic. `Sync` is required because batch compression shares a
/// single backend across rayon workers.
pub trait ImageBackend: Sync {
    /// Decode a universally decodable payload (JPEG, PNG, WebP, TIFF, ...).
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError>;

    /// Downscale to exactly `params.width` × `params.height`, then sharpen.
    fn resample(
        &self,
        image: &DynamicImage,
        params: &ResampleParams,
    ) -> Result<DynamicImage, BackendError>;

    /// Scale chroma by `factor` (1.0 = unchanged).
    fn saturate(&self, image: DynamicImage, factor: f32) -> DynamicImage;

    /// Lossy encode at `quality`.
    fn encode(&self, image: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Mock backend that records operations without touching pixels.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    ///
    /// `decode` yields a blank image of the scripted dimensions, and `encode`
    /// yields zero-filled payloads whose lengths are popped from
    /// `encode_sizes` in order.
    #[derive(Default)]
    pub struct MockBackend {
        pub decode_dims: Mutex<Option<Dimensions>>,
        pub encode_sizes: Mutex<VecDeque<usize>>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Decode(usize),
        Resample {
            width: u32,
            height: u32,
            sigma: f32,
        },
        Saturate(f32),
        Encode {
            quality: f32,
            size: usize,
        },
    }

    impl MockBackend {
        pub fn new(width: u32, height: u32, encode_sizes: Vec<usize>) -> Self {
            Self {
                decode_dims: Mutex::new(Some(Dimensions { width, height })),
                encode_sizes: Mutex::new(encode_sizes.into()),
                operations: Mutex::new(Vec::new()),
            }
        }

        /// A backend whose decode always fails.
        pub fn undecodable() -> Self {
            Self::default()
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn encode_qualities(&self) -> Vec<f32> {
            self.get_operations()
                .into_iter()
                .filter_map(|op| match op {
                    RecordedOp::Encode { quality, .. } => Some(quality),
                    _ => None,
                })
                .collect()
        }

        pub fn resampled(&self) -> bool {
            self.get_operations()
                .iter()
                .any(|op| matches!(op, RecordedOp::Resample { .. }))
        }
    }

    impl ImageBackend for MockBackend {
        fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Decode(bytes.len()));

            let dims = (*self.decode_dims.lock().unwrap())
                .ok_or_else(|| BackendError::ProcessingFailed("No mock dimensions".to_string()))?;
            Ok(DynamicImage::new_rgb8(dims.width, dims.height))
        }

        fn resample(
            &self,
            _image: &DynamicImage,
            params: &ResampleParams,
        ) -> Result<DynamicImage, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Resample {
                width: params.width,
                height: params.height,
                sigma: params.sharpening.sigma,
            });
            Ok(DynamicImage::new_rgb8(params.width, params.height))
        }

        fn saturate(&self, image: DynamicImage, factor: f32) -> DynamicImage {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Saturate(factor));
            image
        }

        fn encode(
            &self,
            _image: &DynamicImage,
            quality: Quality,
        ) -> Result<Vec<u8>, BackendError> {
            let size = self
                .encode_sizes
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| BackendError::ProcessingFailed("No mock encode size".to_string()))?;
            self.operations.lock().unwrap().push(RecordedOp::Encode {
                quality: quality.value(),
                size,
            });
            Ok(vec![0u8; size])
        }
    }

    #[test]
    fn mock_decode_yields_scripted_dimensions() {
        let backend = MockBackend::new(800, 600, vec![]);

        let image = backend.decode(&[1, 2, 3]).unwrap();
        assert_eq!(Dimensions::of(&image).as_tuple(), (800, 600));

        let ops = backend.get_operations();
        assert_eq!(ops, vec![RecordedOp::Decode(3)]);
    }

    #[test]
    fn mock_undecodable_errors() {
        let backend = MockBackend::undecodable();
        assert!(backend.decode(b"junk").is_err());
    }

    #[test]
    fn mock_encode_pops_sizes_in_order() {
        let backend = MockBackend::new(10, 10, vec![100, 50]);
        let image = DynamicImage::new_rgb8(10, 10);

        assert_eq!(backend.encode(&image, Quality::new(0.9)).unwrap().len(), 100);
        assert_eq!(backend.encode(&image, Quality::new(0.5)).unwrap().len(), 50);
        assert!(backend.encode(&image, Quality::new(0.5)).is_err());
        assert_eq!(backend.encode_qualities(), vec![0.9, 0.5]);
    }

    #[test]
    fn mock_records_resample_with_sharpening() {
        let backend = MockBackend::new(100, 100, vec![]);
        let image = DynamicImage::new_rgb8(100, 100);

        let out = backend
            .resample(&image, &ResampleParams::new(50, 40))
            .unwrap();
        assert_eq!(Dimensions::of(&out).as_tuple(), (50, 40));
        assert!(backend.resampled());
        assert!(matches!(
            &backend.get_operations()[0],
            RecordedOp::Resample {
                width: 50,
                height: 40,
                sigma,
            } if *sigma == 0.5
        ));
    }
}
