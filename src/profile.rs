//! Target platform profiles.
//!
//! Each platform maps to a fixed [`CompressionSettings`]. Only the default
//! profile reads its ceiling and quality from config.

use crate::config::CompressConfig;
use crate::imaging::Ceiling;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Default,
    Instagram,
    Linkedin,
    Tiktok,
}

/// Read-only parameters for one compression run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionSettings {
    pub max_width: u32,
    pub max_height: u32,
    /// Encode quality before any face boost, 0–1.
    pub quality: f32,
    /// Channel spread factor; 1.0 leaves colors alone.
    pub saturation_boost: f32,
}

impl CompressionSettings {
    pub fn ceiling(&self) -> Ceiling {
        if self.max_width == self.max_height {
            Ceiling::Square(self.max_width)
        } else {
            Ceiling::Box {
                max_width: self.max_width,
                max_height: self.max_height,
            }
        }
    }
}

impl Platform {
    pub fn settings(self, config: &CompressConfig) -> CompressionSettings {
        match self {
            Platform::Default => CompressionSettings {
                max_width: config.max_dimension,
                max_height: config.max_dimension,
                quality: config.quality.base,
                saturation_boost: 1.0,
            },
            Platform::Instagram => CompressionSettings {
                max_width: 1440,
                max_height: 1800,
                quality: 0.92,
                saturation_boost: 1.08,
            },
            Platform::Linkedin => CompressionSettings {
                max_width: 1200,
                max_height: 1200,
                quality: 0.90,
                saturation_boost: 1.02,
            },
            Platform::Tiktok => CompressionSettings {
                max_width: 1080,
                max_height: 1920,
                quality: 0.88,
                saturation_boost: 1.05,
            },
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Platform::Default => "default",
            Platform::Instagram => "instagram",
            Platform::Linkedin => "linkedin",
            Platform::Tiktok => "tiktok",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_follows_config() {
        let mut config = CompressConfig::default();
        config.max_dimension = 1600;
        config.quality.base = 0.8;

        let settings = Platform::Default.settings(&config);
        assert_eq!(settings.ceiling(), Ceiling::Square(1600));
        assert_eq!(settings.quality, 0.8);
        assert_eq!(settings.saturation_boost, 1.0);
    }

    #[test]
    fn instagram_is_a_portrait_box() {
        let settings = Platform::Instagram.settings(&CompressConfig::default());
        assert_eq!(
            settings.ceiling(),
            Ceiling::Box {
                max_width: 1440,
                max_height: 1800
            }
        );
        assert_eq!(settings.quality, 0.92);
    }

    #[test]
    fn linkedin_is_square() {
        let settings = Platform::Linkedin.settings(&CompressConfig::default());
        assert_eq!(settings.ceiling(), Ceiling::Square(1200));
    }

    #[test]
    fn platform_profiles_ignore_config() {
        let mut config = CompressConfig::default();
        config.max_dimension = 100;
        assert_eq!(
            Platform::Tiktok.settings(&config),
            Platform::Tiktok.settings(&CompressConfig::default())
        );
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Platform::Linkedin).unwrap();
        assert_eq!(json, "\"linkedin\"");
        assert_eq!(Platform::Tiktok.name(), "tiktok");
    }
}
