/// Error type shared by the review session, the annotation store and startup.
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse annotation JSON {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid annotation document: {0}")]
    InvalidDataset(String),

    #[error("Duplicate annotation id {0} in input")]
    DuplicateAnnotationId(u64),

    #[error("No images from the dataset found in directory: {0}")]
    ImageDirectory(PathBuf),

    #[error("Image '{0}' is not referenced by any annotation")]
    StartImageNotFound(String),

    #[error("Invalid category: '{0}'")]
    InvalidCategory(String),

    #[error("Missing setting: {0} (pass it on the command line or in settings.yaml)")]
    MissingSetting(&'static str),

    #[error("Key binding conflict: {0}")]
    KeyBinding(String),

    #[error("Failed to load image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Review window failed: {0}")]
    Gui(#[from] iced_custom::Error),
}

impl ReviewError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReviewError::Io { path: path.into(), source }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        ReviewError::Json { path: path.into(), source }
    }
}
