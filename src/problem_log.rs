/// Log of problematic images, one file name per line
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use log::info;

use crate::error::ReviewError;

pub struct ProblemLog {
    path: PathBuf,
}

impl ProblemLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `file_name` unless it is already listed.
    /// Returns false for a duplicate.
    pub fn record(&self, file_name: &str) -> Result<bool, ReviewError> {
        if self.contains(file_name)? {
            info!("Image {} already logged", file_name);
            return Ok(false);
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| ReviewError::io(&self.path, e))?;
        writeln!(file, "{}", file_name).map_err(|e| ReviewError::io(&self.path, e))?;

        info!("Logged image: {}", file_name);
        Ok(true)
    }

    pub fn contains(&self, file_name: &str) -> Result<bool, ReviewError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.lines().any(|line| line.trim() == file_name)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ReviewError::io(&self.path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_skips_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let log = ProblemLog::new(dir.path().join("problematic_images.txt"));

        assert!(!log.contains("a.jpg").unwrap());
        assert!(log.record("a.jpg").unwrap());
        assert!(log.record("b.jpg").unwrap());
        assert!(!log.record("a.jpg").unwrap());

        let content = fs::read_to_string(log.path()).unwrap();
        assert_eq!(content, "a.jpg\nb.jpg\n");
    }
}
