use std::path::{Path, PathBuf};
use clap::Parser;

use crate::error::ReviewError;
use crate::keymap::Keymap;
use crate::settings::{BoxColors, UserSettings};

// Default values for configuration
// These serve as fallback values when neither the command line nor settings.yaml set them
pub const DEFAULT_OUTPUT_JSON: &str = "reviewed_annotations.json";
pub const DEFAULT_PROBLEM_LOG: &str = "problematic_images.txt";
pub const DEFAULT_WINDOW_WIDTH: u32 = 1200;
pub const DEFAULT_WINDOW_HEIGHT: u32 = 800;
pub const DEFAULT_BOX_THICKNESS: u32 = 2;
pub const DEFAULT_SAVE_RETRIES: u32 = 3;

/// Review false-positive detections and record a decision for each box
#[derive(Debug, Default, Parser)]
#[command(name = "fp-reviewer", version, about)]
pub struct Args {
    /// Candidate annotations (COCO document or false-positive list)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Where the reviewed document is written on quit
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory containing the images
    #[arg(short, long)]
    pub dataset: Option<PathBuf>,

    /// Also write accepted annotations only, ready for merging
    #[arg(long)]
    pub accepted_output: Option<PathBuf>,

    /// File collecting problematic image names
    #[arg(long)]
    pub problem_log: Option<PathBuf>,

    /// Start from the first annotation of this image file name
    #[arg(long, value_name = "FILE_NAME")]
    pub start_at: Option<String>,

    /// Settings file to use instead of the default location
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Write the effective settings as a commented YAML file and exit
    #[arg(long)]
    pub write_settings: bool,
}

/// Run configuration, resolved once at startup and passed explicitly
#[derive(Debug, Clone)]
pub struct ReviewConfig {
    pub dataset_path: PathBuf,
    pub input_json: PathBuf,
    pub output_json: PathBuf,
    pub accepted_output_json: Option<PathBuf>,
    pub problem_log: PathBuf,
    pub start_at: Option<String>,
    pub window_width: u32,
    pub window_height: u32,
    pub box_thickness: u32,
    pub save_retries: u32,
    pub show_accepted_context: bool,
    pub colors: BoxColors,
    pub keymap: Keymap,
}

impl ReviewConfig {
    /// Command line values take precedence over settings.yaml
    pub fn resolve(args: &Args, settings: &UserSettings) -> Result<Self, ReviewError> {
        let input_json = args
            .input
            .clone()
            .or_else(|| settings.input_json.as_ref().map(PathBuf::from))
            .ok_or(ReviewError::MissingSetting("input_json"))?;

        let output_json = args
            .output
            .clone()
            .or_else(|| settings.output_json.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_JSON));

        let dataset_path = args
            .dataset
            .clone()
            .or_else(|| settings.dataset_path.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| parent_dir(&input_json));

        let accepted_output_json = args
            .accepted_output
            .clone()
            .or_else(|| settings.accepted_output_json.as_ref().map(PathBuf::from));

        let problem_log = args
            .problem_log
            .clone()
            .unwrap_or_else(|| PathBuf::from(&settings.problem_log));

        let keymap = Keymap::from_bindings(&settings.keys)?;

        Ok(Self {
            dataset_path,
            input_json,
            output_json,
            accepted_output_json,
            problem_log,
            start_at: args.start_at.clone(),
            window_width: settings.window_width,
            window_height: settings.window_height,
            box_thickness: settings.box_thickness.max(1),
            save_retries: settings.save_retries,
            show_accepted_context: settings.show_accepted_context,
            colors: settings.colors,
            keymap,
        })
    }

    pub fn image_path(&self, file_name: &str) -> PathBuf {
        self.dataset_path.join(file_name)
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_settings() {
        let settings = UserSettings {
            input_json: Some("/settings/fp.json".to_string()),
            output_json: Some("/settings/out.json".to_string()),
            ..UserSettings::default()
        };
        let args = Args {
            output: Some(PathBuf::from("/cli/out.json")),
            start_at: Some("0001.jpg".to_string()),
            ..Args::default()
        };

        let config = ReviewConfig::resolve(&args, &settings).unwrap();
        assert_eq!(config.input_json, PathBuf::from("/settings/fp.json"));
        assert_eq!(config.output_json, PathBuf::from("/cli/out.json"));
        assert_eq!(config.dataset_path, PathBuf::from("/settings"));
        assert_eq!(config.problem_log, PathBuf::from(DEFAULT_PROBLEM_LOG));
        assert_eq!(config.start_at.as_deref(), Some("0001.jpg"));
        assert_eq!(config.image_path("a.jpg"), PathBuf::from("/settings/a.jpg"));
    }

    #[test]
    fn test_defaults() {
        let args = Args {
            input: Some(PathBuf::from("fp.json")),
            ..Args::default()
        };
        let config = ReviewConfig::resolve(&args, &UserSettings::default()).unwrap();
        assert_eq!(config.output_json, PathBuf::from(DEFAULT_OUTPUT_JSON));
        assert_eq!(config.dataset_path, PathBuf::from("."));
        assert!(config.accepted_output_json.is_none());
        assert_eq!(config.box_thickness, DEFAULT_BOX_THICKNESS);
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let result = ReviewConfig::resolve(&Args::default(), &UserSettings::default());
        assert!(matches!(result, Err(ReviewError::MissingSetting("input_json"))));
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "fp-reviewer",
            "--input", "fp.json",
            "-o", "out.json",
            "--start-at", "img_7.jpg",
            "--accepted-output", "merge_me.json",
        ])
        .unwrap();
        assert_eq!(args.input, Some(PathBuf::from("fp.json")));
        assert_eq!(args.output, Some(PathBuf::from("out.json")));
        assert_eq!(args.start_at.as_deref(), Some("img_7.jpg"));
        assert_eq!(args.accepted_output, Some(PathBuf::from("merge_me.json")));
        assert!(!args.write_settings);
    }
}
