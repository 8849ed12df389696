use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use log::{debug, info, warn, error};

use crate::config::*;
use crate::error::Result;

/// User-specific settings that persist across runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    /// Detector service base URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model/task selector sent with each request
    #[serde(default = "default_model")]
    pub model: String,

    /// Minimum confidence asked of the detector
    #[serde(default = "default_min_confidence_hint")]
    pub min_confidence_hint: f32,

    #[serde(default = "default_max_display_width")]
    pub max_display_width: u32,

    #[serde(default = "default_min_display_width")]
    pub min_display_width: u32,

    #[serde(default = "default_device_pixel_ratio")]
    pub device_pixel_ratio: f32,

    #[serde(default = "default_true")]
    pub show_labels: bool,

    #[serde(default = "default_true")]
    pub show_legend: bool,

    #[serde(default = "default_line_width")]
    pub line_width: f32,

    /// Keep label chips from leaving the top edge
    #[serde(default)]
    pub clamp_labels: bool,

    /// TrueType/OpenType font used for label text
    #[serde(default)]
    pub font_path: Option<String>,

    #[serde(default = "default_suggest_min")]
    pub suggest_min: f32,

    #[serde(default = "default_suggest_max")]
    pub suggest_max: f32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_min_confidence_hint() -> f32 {
    DEFAULT_MIN_CONFIDENCE_HINT
}

fn default_max_display_width() -> u32 {
    DEFAULT_MAX_DISPLAY_WIDTH
}

fn default_min_display_width() -> u32 {
    DEFAULT_MIN_DISPLAY_WIDTH
}

fn default_device_pixel_ratio() -> f32 {
    DEFAULT_DEVICE_PIXEL_RATIO
}

fn default_true() -> bool {
    true
}

fn default_line_width() -> f32 {
    DEFAULT_LINE_WIDTH
}

fn default_suggest_min() -> f32 {
    DEFAULT_SUGGEST_MIN
}

fn default_suggest_max() -> f32 {
    DEFAULT_SUGGEST_MAX
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            min_confidence_hint: DEFAULT_MIN_CONFIDENCE_HINT,
            max_display_width: DEFAULT_MAX_DISPLAY_WIDTH,
            min_display_width: DEFAULT_MIN_DISPLAY_WIDTH,
            device_pixel_ratio: DEFAULT_DEVICE_PIXEL_RATIO,
            show_labels: true,
            show_legend: true,
            line_width: DEFAULT_LINE_WIDTH,
            clamp_labels: false,
            font_path: None,
            suggest_min: DEFAULT_SUGGEST_MIN,
            suggest_max: DEFAULT_SUGGEST_MAX,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl UserSettings {
    /// Get the path to the settings file
    /// On macOS: ~/Library/Application Support/obbview/settings.yaml
    /// On Linux: ~/.config/obbview/settings.yaml
    /// On Windows: C:\Users\<user>\AppData\Roaming\obbview\settings.yaml
    pub fn settings_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."));

        config_dir.join("obbview").join("settings.yaml")
    }

    /// Load settings from the YAML file
    /// If custom_path is provided, uses that path; otherwise uses the default settings path
    pub fn load(custom_path: Option<&Path>) -> Self {
        let path = match custom_path {
            Some(p) => {
                info!("Using custom settings path: {}", p.display());
                p.to_path_buf()
            }
            None => Self::settings_path(),
        };

        if !path.exists() {
            info!("Settings file not found at {:?}, using defaults", path);
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(contents) => Self::parse(&contents).unwrap_or_else(|e| {
                error!("Failed to parse settings file at {:?}: {}", path, e);
                warn!("Using default settings");
                Self::default()
            }),
            Err(e) => {
                error!("Failed to read settings file at {:?}: {}", path, e);
                warn!("Using default settings");
                Self::default()
            }
        }
    }

    fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
        let settings = serde_yaml::from_str::<UserSettings>(contents)?;
        debug!("Settings: endpoint={}, model={}, dpr={}, labels={}, legend={}",
            settings.endpoint, settings.model, settings.device_pixel_ratio, settings.show_labels, settings.show_legend);
        Ok(settings)
    }

    /// Save settings to the YAML file while preserving comments
    pub fn save(&self, custom_path: Option<&Path>) -> Result<()> {
        let path = custom_path.map(Path::to_path_buf).unwrap_or_else(Self::settings_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        // If file exists, try to preserve comments by doing in-place value updates
        if path.exists() {
            match fs::read_to_string(&path) {
                Ok(contents) => {
                    let updated = self.update_yaml_values(&contents);
                    fs::write(&path, updated)?;
                    info!("Saved settings to {:?} (comments preserved)", path);
                    return Ok(());
                }
                Err(e) => {
                    warn!("Failed to read existing settings file for comment preservation: {}", e);
                }
            }
        }

        fs::write(&path, self.to_yaml_with_comments())?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Update YAML values while preserving existing comments and structure
    fn update_yaml_values(&self, yaml_content: &str) -> String {
        let font_path = match &self.font_path {
            Some(p) => format!("{:?}", p),
            None => "null".to_string(),
        };
        let fields = [
            ("endpoint", format!("{:?}", self.endpoint)),
            ("model", format!("{:?}", self.model)),
            ("min_confidence_hint", self.min_confidence_hint.to_string()),
            ("max_display_width", self.max_display_width.to_string()),
            ("min_display_width", self.min_display_width.to_string()),
            ("device_pixel_ratio", self.device_pixel_ratio.to_string()),
            ("show_labels", self.show_labels.to_string()),
            ("show_legend", self.show_legend.to_string()),
            ("line_width", self.line_width.to_string()),
            ("clamp_labels", self.clamp_labels.to_string()),
            ("font_path", font_path),
            ("suggest_min", self.suggest_min.to_string()),
            ("suggest_max", self.suggest_max.to_string()),
            ("request_timeout_secs", self.request_timeout_secs.to_string()),
        ];

        fields
            .iter()
            .fold(yaml_content.to_string(), |yaml, (key, value)| Self::replace_yaml_value(&yaml, key, value))
    }

    /// Replace a YAML key's value while preserving the rest of the line,
    /// or append the key when the file does not have it yet
    fn replace_yaml_value(yaml: &str, key: &str, new_value: &str) -> String {
        let pattern = format!(r"(?m)^(\s*{}\s*:\s*).*$", regex::escape(key));
        let replacement = format!("${{1}}{}", new_value.replace('$', "$$"));

        match regex::Regex::new(&pattern) {
            Ok(re) if re.is_match(yaml) => re.replace_all(yaml, replacement.as_str()).to_string(),
            Ok(_) => {
                // Keys the file never had are appended so no value is lost
                let mut appended = yaml.to_string();
                if !appended.is_empty() && !appended.ends_with('\n') {
                    appended.push('\n');
                }
                appended.push_str(&format!("{}: {}\n", key, new_value));
                appended
            }
            Err(e) => {
                warn!("Failed to create regex for key '{}': {}", key, e);
                yaml.to_string()
            }
        }
    }

    /// Generate YAML content with comments for new files
    fn to_yaml_with_comments(&self) -> String {
        let font_path = match &self.font_path {
            Some(p) => format!("{:?}", p),
            None => "null".to_string(),
        };
        format!(
            r#"# obbview user settings
# Loaded on every run. Values here override the built-in defaults.

# Detector service base URL; requests go to <endpoint>/api/detect/basic/
endpoint: {:?}

# Model/task selector sent with the image
model: {:?}

# Minimum confidence asked of the detector. Keep it low: all filtering after
# the single request happens locally.
min_confidence_hint: {}

# Display width bounds in logical pixels; height follows the image aspect
max_display_width: {}
min_display_width: {}

# Device pixel ratio applied to every rendered view
device_pixel_ratio: {}

# Overlay toggles
show_labels: {}
show_legend: {}

# Polygon outline width in logical pixels
line_width: {}

# Keep label chips from leaving the top edge (false = draw at the computed position)
clamp_labels: {}

# TrueType/OpenType font for label and legend text (null = no glyphs)
font_path: {}

# Bounds for the threshold suggested from the median confidence of a new result
suggest_min: {}
suggest_max: {}

# Detector request timeout in seconds
request_timeout_secs: {}
"#,
            self.endpoint,
            self.model,
            self.min_confidence_hint,
            self.max_display_width,
            self.min_display_width,
            self.device_pixel_ratio,
            self.show_labels,
            self.show_legend,
            self.line_width,
            self.clamp_labels,
            font_path,
            self.suggest_min,
            self.suggest_max,
            self.request_timeout_secs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings = UserSettings::parse("model: spikelet\nshow_legend: false\n").unwrap();
        assert_eq!(settings.model, "spikelet");
        assert!(!settings.show_legend);
        assert_eq!(settings.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(settings.max_display_width, DEFAULT_MAX_DISPLAY_WIDTH);
        assert!(settings.font_path.is_none());
    }

    #[test]
    fn test_template_parses_back() {
        let settings = UserSettings {
            font_path: Some("/usr/share/fonts/DejaVuSans.ttf".to_string()),
            ..UserSettings::default()
        };
        let parsed = UserSettings::parse(&settings.to_yaml_with_comments()).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_update_keeps_comments() {
        let original = "# my detector\nendpoint: \"http://a:8000\"\n# thinner lines\nline_width: 2\n";
        let settings = UserSettings {
            endpoint: "http://b:9000".to_string(),
            line_width: 1.5,
            ..UserSettings::default()
        };
        let updated = settings.update_yaml_values(original);
        assert!(updated.starts_with("# my detector\nendpoint: \"http://b:9000\"\n# thinner lines\nline_width: 1.5\n"));
        assert_eq!(updated.matches("line_width:").count(), 1);
        assert_eq!(UserSettings::parse(&updated).unwrap(), settings);
    }

    #[test]
    fn test_update_appends_missing_keys() {
        let settings = UserSettings {
            clamp_labels: true,
            show_legend: false,
            font_path: Some("/fonts/a.ttf".to_string()),
            ..UserSettings::default()
        };
        let updated = settings.update_yaml_values("# mine\nmodel: spike");
        assert!(updated.starts_with("# mine\nmodel: \"spike\"\n"));
        assert!(updated.contains("\nclamp_labels: true\n"));
        assert_eq!(UserSettings::parse(&updated).unwrap(), settings);
    }

    #[test]
    fn test_save_over_partial_file_keeps_overrides() {
        let dir = std::env::temp_dir().join(format!("obbview-partial-{}", std::process::id()));
        let path = dir.join("settings.yaml");
        fs::create_dir_all(&dir).unwrap();
        fs::write(&path, "# mine\nmodel: spike\n").unwrap();

        let settings = UserSettings {
            model: "fhb".to_string(),
            clamp_labels: true,
            show_legend: false,
            ..UserSettings::default()
        };
        settings.save(Some(&path)).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("# mine\n"));
        assert_eq!(UserSettings::load(Some(&path)), settings);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("obbview-no-such-dir").join("settings.yaml");
        assert_eq!(UserSettings::load(Some(&path)), UserSettings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = std::env::temp_dir().join(format!("obbview-settings-{}", std::process::id()));
        let path = dir.join("settings.yaml");
        let settings = UserSettings {
            model: "third".to_string(),
            clamp_labels: true,
            ..UserSettings::default()
        };
        settings.save(Some(&path)).unwrap();
        assert_eq!(UserSettings::load(Some(&path)), settings);

        // Second save goes through the in-place update path.
        let changed = UserSettings { show_labels: false, ..settings };
        changed.save(Some(&path)).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("# obbview user settings"));
        assert_eq!(UserSettings::load(Some(&path)), changed);

        let _ = fs::remove_dir_all(&dir);
    }
}
