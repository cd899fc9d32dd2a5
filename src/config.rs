//! Compression configuration module.
//!
//! Handles loading, validating, and merging `slimshot.toml` files. Stock
//! defaults are overridden by whatever keys the user file specifies.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! max_dimension = 2048           # Longest edge for the default profile
//!
//! [quality]
//! base = 0.85                    # Default-profile encode quality (0-1)
//! face_boost = 0.05              # Added when faces are detected
//! face_ceiling = 0.95            # Upper bound for the boosted quality
//!
//! [thresholds]
//! already_optimized_ratio = 0.95 # Candidate >= ratio × original → keep original
//! over_reduction_ratio = 0.70    # Reduction above this → one high-quality retry
//! escalation_quality = 0.98      # Quality used for that retry
//!
//! [legacy]
//! start_quality = 0.88           # First attempt for converted HEIC/HEIF/AVIF
//! step = 0.04                    # Decrement per attempt
//! floor = 0.70                   # Never go below this
//! max_attempts = 5
//!
//! [faces]
//! enabled = true
//! model_path = "seeta_fd_frontal_v1.0.bin"
//! min_face_size = 20
//! score_threshold = 2.0
//! pyramid_scale_factor = 0.8
//! slide_window_step = 4
//! detection_max_edge = 800       # Downsample before detection (0 = never)
//!
//! [processing]
//! max_processes = 4              # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [thresholds]
//! over_reduction_ratio = 0.8
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::faces::DetectorSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_MAX_DIMENSION: u32 = 2048;
pub const DEFAULT_BASE_QUALITY: f32 = 0.85;
pub const DEFAULT_FACE_BOOST: f32 = 0.05;
pub const DEFAULT_FACE_CEILING: f32 = 0.95;
pub const DEFAULT_ALREADY_OPTIMIZED_RATIO: f64 = 0.95;
pub const DEFAULT_OVER_REDUCTION_RATIO: f64 = 0.70;
pub const DEFAULT_ESCALATION_QUALITY: f32 = 0.98;
pub const DEFAULT_LEGACY_START: f32 = 0.88;
pub const DEFAULT_LEGACY_STEP: f32 = 0.04;
pub const DEFAULT_LEGACY_FLOOR: f32 = 0.70;
pub const DEFAULT_LEGACY_ATTEMPTS: u32 = 5;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Compression configuration loaded from `slimshot.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressConfig {
    /// Longest allowed edge for the default profile. Platform profiles carry
    /// their own width/height box.
    pub max_dimension: u32,
    /// Initial quality selection.
    pub quality: QualityConfig,
    /// Already-optimized and safety-valve cutoffs.
    pub thresholds: ThresholdsConfig,
    /// Quality search for converted legacy formats.
    pub legacy: LegacyConfig,
    /// Face detector setup.
    pub faces: FacesConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for CompressConfig {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            quality: QualityConfig::default(),
            thresholds: ThresholdsConfig::default(),
            legacy: LegacyConfig::default(),
            faces: FacesConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

fn unit_range(name: &str, value: f64, allow_zero: bool) -> Result<(), ConfigError> {
    let ok = if allow_zero {
        (0.0..=1.0).contains(&value)
    } else {
        value > 0.0 && value <= 1.0
    };
    if ok {
        Ok(())
    } else {
        let range = if allow_zero { "[0, 1]" } else { "(0, 1]" };
        Err(ConfigError::Validation(format!(
            "{name} must be within {range}, got {value}"
        )))
    }
}

impl CompressConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_dimension == 0 {
            return Err(ConfigError::Validation(
                "max_dimension must be > 0".into(),
            ));
        }
        unit_range("quality.base", self.quality.base as f64, false)?;
        unit_range("quality.face_boost", self.quality.face_boost as f64, true)?;
        unit_range("quality.face_ceiling", self.quality.face_ceiling as f64, false)?;
        unit_range(
            "thresholds.already_optimized_ratio",
            self.thresholds.already_optimized_ratio,
            false,
        )?;
        unit_range(
            "thresholds.over_reduction_ratio",
            self.thresholds.over_reduction_ratio,
            false,
        )?;
        unit_range(
            "thresholds.escalation_quality",
            self.thresholds.escalation_quality as f64,
            false,
        )?;
        unit_range("legacy.start_quality", self.legacy.start_quality as f64, false)?;
        unit_range("legacy.floor", self.legacy.floor as f64, false)?;
        if self.legacy.step <= 0.0 || self.legacy.step >= 1.0 {
            return Err(ConfigError::Validation(
                "legacy.step must be within (0, 1)".into(),
            ));
        }
        if self.legacy.floor > self.legacy.start_quality {
            return Err(ConfigError::Validation(
                "legacy.floor must not exceed legacy.start_quality".into(),
            ));
        }
        if self.legacy.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "legacy.max_attempts must be > 0".into(),
            ));
        }
        if self.faces.slide_window_step == 0 {
            return Err(ConfigError::Validation(
                "faces.slide_window_step must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Initial quality selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityConfig {
    /// Encode quality for the default profile, on a 0–1 scale.
    pub base: f32,
    /// Added to the profile quality when at least one face is detected.
    pub face_boost: f32,
    /// The face boost never pushes quality above this.
    pub face_ceiling: f32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE_QUALITY,
            face_boost: DEFAULT_FACE_BOOST,
            face_ceiling: DEFAULT_FACE_CEILING,
        }
    }
}

/// Size-ratio cutoffs for the encode decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThresholdsConfig {
    /// A candidate at or above `ratio × original` bytes is not worth keeping.
    pub already_optimized_ratio: f64,
    /// A reduction larger than this fraction triggers one re-encode.
    pub over_reduction_ratio: f64,
    /// Quality for that single re-encode.
    pub escalation_quality: f32,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            already_optimized_ratio: DEFAULT_ALREADY_OPTIMIZED_RATIO,
            over_reduction_ratio: DEFAULT_OVER_REDUCTION_RATIO,
            escalation_quality: DEFAULT_ESCALATION_QUALITY,
        }
    }
}

/// Linear quality search for converted legacy formats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LegacyConfig {
    pub start_quality: f32,
    pub step: f32,
    pub floor: f32,
    pub max_attempts: u32,
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            start_quality: DEFAULT_LEGACY_START,
            step: DEFAULT_LEGACY_STEP,
            floor: DEFAULT_LEGACY_FLOOR,
            max_attempts: DEFAULT_LEGACY_ATTEMPTS,
        }
    }
}

/// Face detector setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FacesConfig {
    /// Set to false to skip detection entirely.
    pub enabled: bool,
    /// SeetaFace model file. When absent, detection is skipped.
    pub model_path: Option<PathBuf>,
    pub min_face_size: u32,
    pub score_threshold: f64,
    pub pyramid_scale_factor: f32,
    pub slide_window_step: u32,
    /// Longer edge the image is downsampled to before detection (0 = never).
    pub detection_max_edge: u32,
}

impl Default for FacesConfig {
    fn default() -> Self {
        let settings = DetectorSettings::default();
        Self {
            enabled: true,
            model_path: None,
            min_face_size: settings.min_face_size,
            score_threshold: settings.score_threshold,
            pyramid_scale_factor: settings.pyramid_scale_factor,
            slide_window_step: settings.slide_window_step,
            detection_max_edge: 800,
        }
    }
}

impl FacesConfig {
    pub fn detector_settings(&self) -> DetectorSettings {
        DetectorSettings {
            min_face_size: self.min_face_size,
            score_threshold: self.score_threshold,
            pyramid_scale_factor: self.pyramid_scale_factor,
            slide_window_step: self.slide_window_step,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel compression workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(CompressConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<CompressConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: CompressConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<CompressConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `slimshot.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# slimshot configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# Longest edge (pixels) for the default profile. Platform profiles
# (instagram, linkedin, tiktok) use their own fixed width/height box.
max_dimension = 2048

# ---------------------------------------------------------------------------
# Initial quality selection (all qualities on a 0-1 scale)
# ---------------------------------------------------------------------------
[quality]
# Encode quality for the default profile.
base = 0.85

# Added to the profile quality when at least one face is detected...
face_boost = 0.05

# ...but never above this ceiling.
face_ceiling = 0.95

# ---------------------------------------------------------------------------
# Encode decision cutoffs
# ---------------------------------------------------------------------------
[thresholds]
# If the re-encoded file is at least this fraction of the original size,
# the original bytes are returned untouched ("already optimized").
already_optimized_ratio = 0.95

# If re-encoding shrank the file by more than this fraction, the result is
# treated as over-compressed and re-encoded once at escalation_quality.
over_reduction_ratio = 0.70
escalation_quality = 0.98

# ---------------------------------------------------------------------------
# Converted HEIC/HEIF/AVIF sources
# ---------------------------------------------------------------------------
[legacy]
# Quality walks down from start_quality by step until the output is
# smaller than the original file, the floor is reached, or attempts run out.
start_quality = 0.88
step = 0.04
floor = 0.70
max_attempts = 5

# ---------------------------------------------------------------------------
# Face detection (SeetaFace frontal model)
# ---------------------------------------------------------------------------
[faces]
enabled = true
# Path to seeta_fd_frontal_v1.0.bin. Without a model, detection is skipped
# and every image is treated as face-free.
# model_path = "seeta_fd_frontal_v1.0.bin"
min_face_size = 20
score_threshold = 2.0
pyramid_scale_factor = 0.8
slide_window_step = 4
# Images are downsampled to this longer edge before detection (0 = never).
detection_max_edge = 800

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel compression workers for batch runs.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
