use std::path::PathBuf;

use crate::overlay::label::LabelOverflow;
use crate::overlay::renderer::RenderOptions;
use crate::settings::UserSettings;

// Default values for configuration
// These serve as fallback values and can be used for "reset to defaults" functionality
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000";
pub const DEFAULT_MODEL: &str = "spike";
pub const DEFAULT_MIN_CONFIDENCE_HINT: f32 = 0.05;   // Sent low so the whole candidate set comes back
pub const DEFAULT_THRESHOLD: f32 = 0.3;              // Slider position before any result arrives
pub const DEFAULT_MAX_DISPLAY_WIDTH: u32 = 1000;
pub const DEFAULT_MIN_DISPLAY_WIDTH: u32 = 360;
pub const DEFAULT_DEVICE_PIXEL_RATIO: f32 = 1.0;
pub const DEFAULT_LINE_WIDTH: f32 = 2.0;
pub const DEFAULT_SUGGEST_MIN: f32 = 0.05;
pub const DEFAULT_SUGGEST_MAX: f32 = 0.8;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Runtime configuration resolved from user settings and command-line overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub endpoint: String,                // Detector service base URL
    pub model: String,                   // Model/task selector sent with the image
    pub min_confidence_hint: f32,
    pub initial_threshold: f32,
    pub max_display_width: f32,
    pub min_display_width: f32,
    pub device_pixel_ratio: f32,
    pub suggest_min: f32,                // Lower clamp for the post-fetch threshold suggestion
    pub suggest_max: f32,
    pub request_timeout_secs: u64,
    pub font_path: Option<PathBuf>,      // Label font; without one labels keep their chips but no glyphs
    pub render: RenderOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_settings(&UserSettings::default())
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

impl Config {
    pub fn from_settings(settings: &UserSettings) -> Self {
        let suggest_a = finite_or(settings.suggest_min, DEFAULT_SUGGEST_MIN);
        let suggest_b = finite_or(settings.suggest_max, DEFAULT_SUGGEST_MAX);
        Self {
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            min_confidence_hint: settings.min_confidence_hint.clamp(0.0, 1.0),
            initial_threshold: DEFAULT_THRESHOLD,
            max_display_width: settings.max_display_width as f32,
            min_display_width: settings.min_display_width.min(settings.max_display_width) as f32,
            device_pixel_ratio: settings.device_pixel_ratio,
            suggest_min: suggest_a.min(suggest_b),
            suggest_max: suggest_a.max(suggest_b),
            request_timeout_secs: settings.request_timeout_secs,
            font_path: settings.font_path.as_ref().map(PathBuf::from),
            render: RenderOptions {
                show_labels: settings.show_labels,
                show_legend: settings.show_legend,
                line_width: settings.line_width,
                label_overflow: if settings.clamp_labels {
                    LabelOverflow::ClampToTop
                } else {
                    LabelOverflow::Unclamped
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_constants() {
        let config = Config::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_display_width, DEFAULT_MAX_DISPLAY_WIDTH as f32);
        assert_eq!(config.initial_threshold, DEFAULT_THRESHOLD);
        assert_eq!(config.render, RenderOptions::default());
        assert!(config.font_path.is_none());
    }

    #[test]
    fn test_inconsistent_bounds_are_tamed() {
        let settings = UserSettings {
            min_display_width: 2000,
            max_display_width: 800,
            suggest_min: 0.9,
            suggest_max: 0.5,
            clamp_labels: true,
            ..UserSettings::default()
        };
        let config = Config::from_settings(&settings);
        assert_eq!(config.min_display_width, 800.0);
        assert_eq!(config.suggest_min, 0.5);
        assert_eq!(config.suggest_max, 0.9);
        assert_eq!(config.render.label_overflow, LabelOverflow::ClampToTop);
    }

    #[test]
    fn test_non_finite_suggest_bounds_fall_back() {
        let settings: UserSettings = serde_yaml::from_str("suggest_max: .nan\nsuggest_min: -.inf\n").unwrap();
        let config = Config::from_settings(&settings);
        assert_eq!(config.suggest_min, DEFAULT_SUGGEST_MIN);
        assert_eq!(config.suggest_max, DEFAULT_SUGGEST_MAX);
    }
}
