/// Annotation store
///
/// Loads the candidate annotations and writes the reviewed document. The
/// session only talks to the `AnnotationStore` trait; `JsonFileStore` is the
/// file-backed implementation used by the application.
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[allow(unused_imports)]
use log::{debug, error, info, warn};

use crate::coco_parser::CocoDataset;
use crate::config::{ReviewConfig, DEFAULT_SAVE_RETRIES};
use crate::error::ReviewError;

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(200);

pub trait AnnotationStore {
    fn load(&self) -> Result<CocoDataset, ReviewError>;

    fn save(&self, dataset: &CocoDataset) -> Result<(), ReviewError>;

    /// Where saves go, for log and status messages
    fn describe(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    input: PathBuf,
    output: PathBuf,
    /// Merge-ready export holding accepted annotations only
    accepted_output: Option<PathBuf>,
    save_retries: u32,
    retry_delay: Duration,
}

impl JsonFileStore {
    pub fn new(input: PathBuf, output: PathBuf) -> Self {
        if same_file(&input, &output) {
            warn!(
                "Output path equals input path; {} will be overwritten with the reviewed document",
                output.display()
            );
        }

        Self {
            input,
            output,
            accepted_output: None,
            save_retries: DEFAULT_SAVE_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn from_config(config: &ReviewConfig) -> Self {
        Self::new(config.input_json.clone(), config.output_json.clone())
            .with_accepted_output(config.accepted_output_json.clone())
            .with_retries(config.save_retries, DEFAULT_RETRY_DELAY)
    }

    pub fn with_accepted_output(mut self, path: Option<PathBuf>) -> Self {
        self.accepted_output = path;
        self
    }

    pub fn with_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.save_retries = retries;
        self.retry_delay = delay;
        self
    }

    pub fn input_path(&self) -> &Path {
        &self.input
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Same store, writing somewhere else (used by "Save As")
    pub fn redirect(&self, output: PathBuf) -> Self {
        Self {
            output,
            ..self.clone()
        }
    }

    /// Same store, writing to the per-user recovery location
    pub fn recovery(&self) -> Self {
        Self {
            output: Self::recovery_path(&self.output),
            accepted_output: None,
            ..self.clone()
        }
    }

    /// Platform-specific recovery file for an output path
    pub fn recovery_path(output: &Path) -> PathBuf {
        let mut hasher = DefaultHasher::new();
        output.hash(&mut hasher);
        let hash = hasher.finish();

        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fp-reviewer")
            .join("recovery")
            .join(format!("{:x}.json", hash))
    }

    fn write_with_retry(&self, path: &Path, dataset: &CocoDataset) -> Result<(), ReviewError> {
        let mut attempt = 0;
        loop {
            match write_json_atomic(path, dataset) {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.save_retries => {
                    attempt += 1;
                    warn!("Save attempt {} to {} failed: {}", attempt, path.display(), e);
                    std::thread::sleep(self.retry_delay);
                }
                Err(e) => {
                    error!("Giving up saving {}: {}", path.display(), e);
                    return Err(e);
                }
            }
        }
    }
}

impl AnnotationStore for JsonFileStore {
    fn load(&self) -> Result<CocoDataset, ReviewError> {
        info!("Loading annotations: {}", self.input.display());
        let dataset = CocoDataset::from_file(&self.input)?;
        info!(
            "Annotations parsed: {} images, {} annotations, {} categories",
            dataset.images.len(),
            dataset.annotations.len(),
            dataset.categories.len()
        );
        Ok(dataset)
    }

    fn save(&self, dataset: &CocoDataset) -> Result<(), ReviewError> {
        self.write_with_retry(&self.output, dataset)?;
        info!(
            "Results saved to {} with {} annotations",
            self.output.display(),
            dataset.annotations.len()
        );

        if let Some(ref accepted_path) = self.accepted_output {
            let accepted = dataset.accepted_only();
            self.write_with_retry(accepted_path, &accepted)?;
            info!(
                "Accepted annotations exported to {} ({} annotations)",
                accepted_path.display(),
                accepted.annotations.len()
            );
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.output.display().to_string()
    }
}

/// Serialize to a sibling temp file, then rename over the target
fn write_json_atomic(path: &Path, dataset: &CocoDataset) -> Result<(), ReviewError> {
    let json = serde_json::to_string_pretty(dataset).map_err(|e| ReviewError::json(path, e))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| ReviewError::io(parent, e))?;
        }
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, json).map_err(|e| ReviewError::io(&tmp_path, e))?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(ReviewError::io(path, e));
    }
    debug!("Wrote {}", path.display());
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// In-memory store for session tests
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    saved: std::cell::RefCell<Option<CocoDataset>>,
    failures_left: std::cell::Cell<u32>,
}

#[cfg(test)]
impl MemoryStore {
    /// A store whose first `failures` saves fail
    pub fn failing(failures: u32) -> Self {
        let store = Self::default();
        store.failures_left.set(failures);
        store
    }

    pub fn saved(&self) -> Option<CocoDataset> {
        self.saved.borrow().clone()
    }
}

#[cfg(test)]
impl AnnotationStore for MemoryStore {
    fn load(&self) -> Result<CocoDataset, ReviewError> {
        Ok(self.saved().unwrap_or_else(CocoDataset::empty))
    }

    fn save(&self, dataset: &CocoDataset) -> Result<(), ReviewError> {
        let failures = self.failures_left.get();
        if failures > 0 {
            self.failures_left.set(failures - 1);
            return Err(ReviewError::io(
                "<memory>",
                std::io::Error::new(std::io::ErrorKind::Other, "simulated write failure"),
            ));
        }
        *self.saved.borrow_mut() = Some(dataset.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "<memory>".to_string()
    }
}
