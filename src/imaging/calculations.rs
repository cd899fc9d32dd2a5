//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Maximum output size policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ceiling {
    /// One global limit applied to both edges.
    Square(u32),
    /// Separate width and height limits (platform profiles).
    Box { max_width: u32, max_height: u32 },
}

impl Ceiling {
    fn limits(self) -> (u32, u32) {
        match self {
            Ceiling::Square(max) => (max, max),
            Ceiling::Box {
                max_width,
                max_height,
            } => (max_width, max_height),
        }
    }
}

/// Calculate the downscale target for `source` under `ceiling`.
///
/// If both dimensions already fit, the source is returned unchanged. Otherwise
/// the limiting edge is set to its ceiling and the other edge is derived from
/// the exact aspect ratio, rounded to the nearest pixel. Never upscales.
///
/// # Arguments
/// * `source` - Decoded image dimensions (width, height)
/// * `ceiling` - Maximum dimension policy
///
/// # Returns
/// * `(width, height)` - Target dimensions, each `>= 1` and `<=` the source
///
/// # Examples
/// ```
/// # use slimshot::imaging::{plan_dimensions, Ceiling};
/// // 4000x3000 under a 2048 ceiling → 2048x1536
/// assert_eq!(plan_dimensions((4000, 3000), Ceiling::Square(2048)), (2048, 1536));
///
/// // Already small enough → untouched
/// assert_eq!(plan_dimensions((800, 600), Ceiling::Square(2048)), (800, 600));
/// ```
pub fn plan_dimensions(source: (u32, u32), ceiling: Ceiling) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (max_w, max_h) = ceiling.limits();

    if src_w <= max_w && src_h <= max_h {
        return source;
    }

    let scale_w = max_w as f64 / src_w as f64;
    let scale_h = max_h as f64 / src_h as f64;

    if scale_w <= scale_h {
        // Width is the limiting edge
        let w = max_w;
        let h = (src_h as f64 * scale_w).round() as u32;
        (w.max(1), h.clamp(1, src_h))
    } else {
        // Height is the limiting edge
        let h = max_h;
        let w = (src_w as f64 * scale_h).round() as u32;
        (w.clamp(1, src_w), h.max(1))
    }
}

/// Whether a planned target actually requires resampling.
pub fn needs_resample(source: (u32, u32), target: (u32, u32)) -> bool {
    source != target
}
