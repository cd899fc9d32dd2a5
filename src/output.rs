//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Single image
//!
//! ```text
//! photo.jpg
//!     10.00 MB → 4096 KB (60.0% smaller)
//!     Quality 85, 2 faces, 2048x1536
//!     Saved: out/photo.jpg
//! ```
//!
//! An image that did not benefit from re-encoding:
//!
//! ```text
//! icon.jpg
//!     Already optimized, original kept (49 KB)
//! ```
//!
//! ## Batch
//!
//! One block per image as above, failures as `name: error`, then a totals
//! line:
//!
//! ```text
//! 3 images: 24.50 MB → 6.12 MB (75.0% smaller), 1 failed
//! ```
//!
//! # Architecture
//!
//! Each `format_*` function returns `Vec<String>` for testability and has a
//! `print_*` wrapper that writes to stdout. Format functions are pure and do
//! no I/O.

use crate::imaging::Quality;
use crate::outcome::{Advisory, CompressionOutcome, OutcomeSummary};
use std::path::Path;

const KB: f64 = 1024.0;
const MB: f64 = 1024.0 * 1024.0;

/// Human-readable byte count: MB with two decimals from 1 MB up, whole KB below.
pub fn format_size(bytes: usize) -> String {
    let bytes = bytes as f64;
    if bytes >= MB {
        format!("{:.2} MB", bytes / MB)
    } else {
        format!("{:.0} KB", bytes / KB)
    }
}

fn savings_phrase(percent: f64) -> String {
    if percent >= 0.0 {
        format!("{:.1}% smaller", percent)
    } else {
        format!("{:.1}% larger", -percent)
    }
}

/// Lines describing one outcome. `saved_to` is shown when the payload was written.
pub fn format_outcome(
    file_name: &str,
    outcome: &CompressionOutcome,
    saved_to: Option<&Path>,
) -> Vec<String> {
    let mut lines = vec![file_name.to_string()];

    if outcome.advisory == Some(Advisory::AlreadyOptimized) {
        lines.push(format!(
            "    Already optimized, original kept ({})",
            format_size(outcome.original_size)
        ));
    } else {
        lines.push(format!(
            "    {} → {} ({})",
            format_size(outcome.original_size),
            format_size(outcome.compressed_size),
            savings_phrase(outcome.savings_percent())
        ));

        let mut details = Vec::new();
        if let Some(q) = outcome.quality_used {
            details.push(format!("Quality {}", Quality::new(q).percent()));
        }
        match outcome.faces_detected {
            0 => {}
            1 => details.push("1 face".to_string()),
            n => details.push(format!("{} faces", n)),
        }
        if let Some(d) = outcome.dimensions {
            details.push(format!("{}x{}", d.width, d.height));
        }
        if !details.is_empty() {
            lines.push(format!("    {}", details.join(", ")));
        }
        if outcome.advisory == Some(Advisory::FormatConverted) {
            lines.push("    Converted from a legacy format".to_string());
        }
    }

    if let Some(path) = saved_to {
        lines.push(format!("    Saved: {}", path.display()));
    }
    lines
}

/// Totals across a batch. Failed images do not count toward the byte totals.
pub fn format_batch_summary(outcomes: &[OutcomeSummary], failed: usize) -> Vec<String> {
    let original: usize = outcomes.iter().map(|o| o.original_size).sum();
    let compressed: usize = outcomes.iter().map(|o| o.compressed_size).sum();
    let percent = if original == 0 {
        0.0
    } else {
        (original as f64 - compressed as f64) / original as f64 * 100.0
    };

    let noun = if outcomes.len() == 1 { "image" } else { "images" };
    let mut line = format!(
        "{} {}: {} → {} ({})",
        outcomes.len(),
        noun,
        format_size(original),
        format_size(compressed),
        savings_phrase(percent)
    );
    if failed > 0 {
        line.push_str(&format!(", {} failed", failed));
    }
    vec![line]
}

pub fn format_failure(file_name: &str, error: &dyn std::error::Error) -> Vec<String> {
    vec![format!("{}: {}", file_name, error)]
}

pub fn print_outcome(file_name: &str, outcome: &CompressionOutcome, saved_to: Option<&Path>) {
    for line in format_outcome(file_name, outcome, saved_to) {
        println!("{}", line);
    }
}

pub fn print_batch_summary(outcomes: &[OutcomeSummary], failed: usize) {
    for line in format_batch_summary(outcomes, failed) {
        println!("{}", line);
    }
}

pub fn print_failure(file_name: &str, error: &dyn std::error::Error) {
    for line in format_failure(file_name, error) {
        eprintln!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompressError;
    use crate::imaging::Dimensions;
    use crate::types::{EncodedCandidate, SourceImage};

    fn reencoded(original: usize, compressed: usize, faces: usize) -> CompressionOutcome {
        CompressionOutcome::reencoded(
            EncodedCandidate {
                bytes: vec![0; compressed],
                quality: 0.85,
            },
            original,
            faces,
            Dimensions {
                width: 2048,
                height: 1536,
            },
            None,
        )
    }

    // =========================================================================
    // format_size
    // =========================================================================

    #[test]
    fn sizes_below_a_megabyte_are_kilobytes() {
        assert_eq!(format_size(50 * 1024), "50 KB");
        assert_eq!(format_size(0), "0 KB");
    }

    #[test]
    fn sizes_from_a_megabyte_are_megabytes() {
        assert_eq!(format_size(1024 * 1024), "1.00 MB");
        assert_eq!(format_size(10 * 1024 * 1024 + 512 * 1024), "10.50 MB");
    }

    // =========================================================================
    // format_outcome
    // =========================================================================

    #[test]
    fn reencoded_outcome_lines() {
        let outcome = reencoded(4 * 1024 * 1024, 1024 * 1024, 2);
        let lines = format_outcome("photo.jpg", &outcome, Some(Path::new("out/photo.jpg")));
        assert_eq!(
            lines,
            vec![
                "photo.jpg",
                "    4.00 MB → 1.00 MB (75.0% smaller)",
                "    Quality 85, 2 faces, 2048x1536",
                "    Saved: out/photo.jpg",
            ]
        );
    }

    #[test]
    fn single_face_is_singular() {
        let lines = format_outcome("a.jpg", &reencoded(2000, 1000, 1), None);
        assert_eq!(lines[2], "    Quality 85, 1 face, 2048x1536");
    }

    #[test]
    fn already_optimized_outcome_lines() {
        let source = SourceImage::new(vec![0; 49 * 1024], "image/jpeg", "icon.jpg");
        let outcome = CompressionOutcome::already_optimized(&source, 0);
        let lines = format_outcome("icon.jpg", &outcome, None);
        assert_eq!(
            lines,
            vec!["icon.jpg", "    Already optimized, original kept (49 KB)"]
        );
    }

    #[test]
    fn converted_outcome_that_grew() {
        let mut outcome = reencoded(1000 * 1024, 1100 * 1024, 0);
        outcome.advisory = Some(Advisory::FormatConverted);
        let lines = format_outcome("a.heic", &outcome, None);
        assert_eq!(lines[1], "    1000 KB → 1.07 MB (10.0% larger)");
        assert_eq!(lines[3], "    Converted from a legacy format");
    }

    // =========================================================================
    // Batch
    // =========================================================================

    #[test]
    fn batch_summary_totals() {
        let a = reencoded(3 * 1024 * 1024, 1024 * 1024, 0).summary("a.jpg");
        let b = reencoded(1024 * 1024, 0, 0).summary("b.jpg");
        let lines = format_batch_summary(&[a, b], 1);
        assert_eq!(
            lines,
            vec!["2 images: 4.00 MB → 1.00 MB (75.0% smaller), 1 failed"]
        );
    }

    #[test]
    fn empty_batch_summary() {
        assert_eq!(
            format_batch_summary(&[], 0),
            vec!["0 images: 0 KB → 0 KB (0.0% smaller)"]
        );
    }

    #[test]
    fn failure_line() {
        let err = CompressError::Decode("bad bytes".into());
        assert_eq!(
            format_failure("x.jpg", &err),
            vec!["x.jpg: Decode error: bad bytes"]
        );
    }
}
