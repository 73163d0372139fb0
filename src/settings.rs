use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use log::{debug, info, warn, error};

use crate::config::{
    DEFAULT_BOX_THICKNESS, DEFAULT_PROBLEM_LOG, DEFAULT_SAVE_RETRIES, DEFAULT_WINDOW_HEIGHT,
    DEFAULT_WINDOW_WIDTH,
};

/// User-specific settings that persist across review sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    /// Directory containing the dataset images
    #[serde(default)]
    pub dataset_path: Option<String>,

    /// Candidate annotations to review (COCO document or false-positive list)
    #[serde(default)]
    pub input_json: Option<String>,

    /// Reviewed document, written on quit
    #[serde(default)]
    pub output_json: Option<String>,

    /// Optional merge-ready export with accepted annotations only
    #[serde(default)]
    pub accepted_output_json: Option<String>,

    /// Text file collecting problematic image names
    #[serde(default = "default_problem_log")]
    pub problem_log: String,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,

    /// Outline thickness in image pixels
    #[serde(default = "default_box_thickness")]
    pub box_thickness: u32,

    /// Extra write attempts before a save is reported as failed
    #[serde(default = "default_save_retries")]
    pub save_retries: u32,

    /// Draw already accepted boxes of the same image around the current one
    #[serde(default = "default_show_accepted_context")]
    pub show_accepted_context: bool,

    #[serde(default)]
    pub colors: BoxColors,

    #[serde(default)]
    pub keys: KeyBindings,
}

/// RGB colors of the drawn boxes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxColors {
    #[serde(default = "default_unreviewed_color")]
    pub unreviewed: [u8; 3],
    #[serde(default = "default_accepted_color")]
    pub accepted: [u8; 3],
    #[serde(default = "default_rejected_color")]
    pub rejected: [u8; 3],
    #[serde(default = "default_context_color")]
    pub context: [u8; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyBindings {
    #[serde(default = "default_accept_key")]
    pub accept: String,
    #[serde(default = "default_reject_key")]
    pub reject: String,
    #[serde(default = "default_skip_key")]
    pub skip: String,
    #[serde(default = "default_previous_key")]
    pub previous: String,
    #[serde(default = "default_edit_category_key")]
    pub edit_category: String,
    #[serde(default = "default_log_problem_key")]
    pub log_problem: String,
    #[serde(default = "default_quit_key")]
    pub quit: String,
}

fn default_problem_log() -> String {
    DEFAULT_PROBLEM_LOG.to_string()
}

fn default_window_width() -> u32 {
    DEFAULT_WINDOW_WIDTH
}

fn default_window_height() -> u32 {
    DEFAULT_WINDOW_HEIGHT
}

fn default_box_thickness() -> u32 {
    DEFAULT_BOX_THICKNESS
}

fn default_save_retries() -> u32 {
    DEFAULT_SAVE_RETRIES
}

fn default_show_accepted_context() -> bool {
    true
}

fn default_unreviewed_color() -> [u8; 3] {
    [0, 0, 255]
}

fn default_accepted_color() -> [u8; 3] {
    [0, 255, 0]
}

fn default_rejected_color() -> [u8; 3] {
    [255, 0, 0]
}

fn default_context_color() -> [u8; 3] {
    [0, 255, 255]
}

fn default_accept_key() -> String { "a".to_string() }
fn default_reject_key() -> String { "r".to_string() }
fn default_skip_key() -> String { "n".to_string() }
fn default_previous_key() -> String { "p".to_string() }
fn default_edit_category_key() -> String { "e".to_string() }
fn default_log_problem_key() -> String { "l".to_string() }
fn default_quit_key() -> String { "q".to_string() }

impl Default for BoxColors {
    fn default() -> Self {
        Self {
            unreviewed: default_unreviewed_color(),
            accepted: default_accepted_color(),
            rejected: default_rejected_color(),
            context: default_context_color(),
        }
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            accept: default_accept_key(),
            reject: default_reject_key(),
            skip: default_skip_key(),
            previous: default_previous_key(),
            edit_category: default_edit_category_key(),
            log_problem: default_log_problem_key(),
            quit: default_quit_key(),
        }
    }
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            dataset_path: None,
            input_json: None,
            output_json: None,
            accepted_output_json: None,
            problem_log: default_problem_log(),
            window_width: DEFAULT_WINDOW_WIDTH,
            window_height: DEFAULT_WINDOW_HEIGHT,
            box_thickness: DEFAULT_BOX_THICKNESS,
            save_retries: DEFAULT_SAVE_RETRIES,
            show_accepted_context: true,
            colors: BoxColors::default(),
            keys: KeyBindings::default(),
        }
    }
}

impl UserSettings {
    /// Get the path to the settings file
    /// On macOS: ~/Library/Application Support/fp-reviewer/settings.yaml
    /// On Linux: ~/.config/fp-reviewer/settings.yaml
    /// On Windows: C:\Users\<user>\AppData\Roaming\fp-reviewer\settings.yaml
    pub fn settings_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."));

        config_dir.join("fp-reviewer").join("settings.yaml")
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
            Ok(contents) => {
                match serde_yaml::from_str::<UserSettings>(&contents) {
                    Ok(settings) => {
                        info!("Loaded settings from {:?}", path);
                        debug!("Settings: input={:?}, output={:?}, dataset={:?}",
                            settings.input_json, settings.output_json, settings.dataset_path);
                        settings
                    }
                    Err(e) => {
                        error!("Failed to parse settings file at {:?}: {}", path, e);
                        warn!("Using default settings");
                        Self::default()
                    }
                }
            }
            Err(e) => {
                error!("Failed to read settings file at {:?}: {}", path, e);
                warn!("Using default settings");
                Self::default()
            }
        }
    }

    /// Write the settings as a commented YAML file
    pub fn save(&self, custom_path: Option<&Path>) -> Result<PathBuf, String> {
        let path = custom_path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::settings_path);

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create settings directory: {}", e))?;
            }
        }

        fs::write(&path, self.to_yaml_with_comments())
            .map_err(|e| format!("Failed to write settings file: {}", e))?;

        info!("Saved settings to {:?}", path);
        Ok(path)
    }

    /// Generate YAML content with comments for new files
    fn to_yaml_with_comments(&self) -> String {
        format!(
            r#"# fp-reviewer User Settings
# This file is loaded automatically when the reviewer starts.
# Command line arguments override the values below.

# Directory containing the dataset images (defaults to the input file's directory)
dataset_path: {}

# Candidate annotations: a COCO document or the false-positive list from the extractor
input_json: {}

# Reviewed document with a decision on every annotation (default: reviewed_annotations.json)
output_json: {}

# Optional merge-ready export containing accepted annotations only
accepted_output_json: {}

# Problematic image names are appended here with the log key
problem_log: {}

# Initial window size
window_width: {}
window_height: {}

# Box outline thickness in image pixels
box_thickness: {}

# Extra attempts when writing the output fails
save_retries: {}

# Draw accepted boxes of the same image as context
show_accepted_context: {}

# Box colors as [R, G, B]
colors:
  unreviewed: {:?}
  accepted: {:?}
  rejected: {:?}
  context: {:?}

# Review keys
keys:
  accept: {}
  reject: {}
  skip: {}
  previous: {}
  edit_category: {}
  log_problem: {}
  quit: {}
"#,
            yaml_opt(&self.dataset_path),
            yaml_opt(&self.input_json),
            yaml_opt(&self.output_json),
            yaml_opt(&self.accepted_output_json),
            yaml_str(&self.problem_log),
            self.window_width,
            self.window_height,
            self.box_thickness,
            self.save_retries,
            self.show_accepted_context,
            self.colors.unreviewed,
            self.colors.accepted,
            self.colors.rejected,
            self.colors.context,
            yaml_str(&self.keys.accept),
            yaml_str(&self.keys.reject),
            yaml_str(&self.keys.skip),
            yaml_str(&self.keys.previous),
            yaml_str(&self.keys.edit_category),
            yaml_str(&self.keys.log_problem),
            yaml_str(&self.keys.quit),
        )
    }
}

// JSON strings are valid double-quoted YAML scalars
fn yaml_str(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn yaml_opt(value: &Option<String>) -> String {
    match value {
        Some(v) => yaml_str(v),
        None => "null".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
input_json: "/data/fp.json"
keys:
  accept: "y"
colors:
  rejected: [200, 0, 0]
"#;
        let settings: UserSettings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.input_json.as_deref(), Some("/data/fp.json"));
        assert_eq!(settings.output_json, None);
        assert_eq!(settings.keys.accept, "y");
        assert_eq!(settings.keys.reject, "r");
        assert_eq!(settings.colors.rejected, [200, 0, 0]);
        assert_eq!(settings.colors.accepted, [0, 255, 0]);
        assert_eq!(settings.window_width, DEFAULT_WINDOW_WIDTH);
        assert!(settings.show_accepted_context);
    }

    #[test]
    fn test_commented_yaml_round_trip() {
        let settings = UserSettings {
            input_json: Some("C:\\data\\fp \"v2\".json".to_string()),
            box_thickness: 4,
            ..UserSettings::default()
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.yaml");
        settings.save(Some(&path)).unwrap();

        let loaded = UserSettings::load(Some(&path));
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_or_broken_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.yaml");
        assert_eq!(UserSettings::load(Some(&missing)), UserSettings::default());

        let broken = dir.path().join("broken.yaml");
        fs::write(&broken, "window_width: [not a number").unwrap();
        assert_eq!(UserSettings::load(Some(&broken)), UserSettings::default());
    }
}
