/// COCO dataset JSON parser
///
/// This module parses COCO format annotation files and the flat
/// false-positive lists written by the extraction step.
/// Format specification: https://cocodataset.org/#format-data
///
/// Keys the reviewer does not model are carried through untouched so that a
/// reviewed file can be merged downstream without losing information.
use std::collections::{HashMap, HashSet};
use std::path::Path;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ReviewError;
use crate::review::Decision;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CocoDataset {
    pub images: Vec<CocoImage>,
    pub annotations: Vec<CocoAnnotation>,
    pub categories: Vec<CocoCategory>,
    /// Top-level keys such as `info` or `licenses`
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CocoImage {
    pub id: u64,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CocoAnnotation {
    pub id: u64,
    pub image_id: u64,
    pub category_id: u64,
    /// [x, y, width, height], kept at full precision since it is written back
    pub bbox: Vec<f64>,
    #[serde(default, alias = "review_status", skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    /// segmentation, area, iscrowd, score, ...
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CocoCategory {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supercategory: Option<String>,
    /// keypoints, skeleton, ...
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of the flat list produced by the false-positive extractor.
/// `bbox` is in corner form: [x_min, y_min, x_max, y_max].
#[derive(Debug, Clone, Deserialize)]
pub struct FalsePositiveRecord {
    #[serde(default)]
    pub id: Option<u64>,
    pub image_id: u64,
    #[serde(default)]
    pub file_name: Option<String>,
    pub bbox: Vec<f64>,
    pub category_id: u64,
    #[serde(default)]
    pub label_name: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default, alias = "review_status")]
    pub decision: Option<Decision>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CocoDataset {
    /// An empty document, used when a review starts from nothing
    pub fn empty() -> Self {
        Self {
            images: Vec::new(),
            annotations: Vec::new(),
            categories: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Parse an annotation document from a file
    pub fn from_file(path: &Path) -> Result<Self, ReviewError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ReviewError::io(path, e))?;

        Self::from_json_str(&content).map_err(|e| ReviewError::json(path, e))
    }

    /// Parse either a COCO document (JSON object) or a flat false-positive
    /// list (JSON array)
    pub fn from_json_str(content: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(content)?;
        match value {
            Value::Object(_) => serde_json::from_value(value),
            Value::Array(_) => {
                let records: Vec<FalsePositiveRecord> = serde_json::from_value(value)?;
                Ok(Self::from_false_positives(records))
            }
            _ => Err(serde::de::Error::custom(
                "expected a COCO object or a list of false positives",
            )),
        }
    }

    /// Normalize a flat false-positive list into a COCO document.
    ///
    /// Images and categories are synthesized in first-seen order, corner boxes
    /// become [x, y, w, h] and records without an id are numbered after the
    /// largest id present.
    pub fn from_false_positives(records: Vec<FalsePositiveRecord>) -> Self {
        let mut next_id = records.iter().filter_map(|r| r.id).max().unwrap_or(0) + 1;

        let mut images = Vec::new();
        let mut seen_images = HashSet::new();
        let mut categories = Vec::new();
        let mut seen_categories = HashSet::new();
        let mut annotations = Vec::with_capacity(records.len());

        for record in records {
            if seen_images.insert(record.image_id) {
                images.push(CocoImage {
                    id: record.image_id,
                    file_name: record
                        .file_name
                        .clone()
                        .unwrap_or_else(|| format!("{}", record.image_id)),
                    width: None,
                    height: None,
                    extra: Map::new(),
                });
            }

            if seen_categories.insert(record.category_id) {
                categories.push(CocoCategory {
                    id: record.category_id,
                    name: record
                        .label_name
                        .clone()
                        .unwrap_or_else(|| format!("category {}", record.category_id)),
                    supercategory: None,
                    extra: Map::new(),
                });
            }

            let id = record.id.unwrap_or_else(|| {
                let id = next_id;
                next_id += 1;
                id
            });

            // Malformed boxes are left as-is for validate() to report
            let bbox = match record.bbox.as_slice() {
                &[x0, y0, x1, y1] => corners_to_coco(x0, y0, x1, y1).to_vec(),
                _ => record.bbox.clone(),
            };

            let mut extra = record.extra;
            if let Some(score) = record.score {
                extra.insert("score".to_string(), Value::from(score));
            }
            if let Some(label_name) = record.label_name {
                extra.insert("label_name".to_string(), Value::from(label_name));
            }

            annotations.push(CocoAnnotation {
                id,
                image_id: record.image_id,
                category_id: record.category_id,
                bbox,
                decision: record.decision,
                extra,
            });
        }

        Self {
            images,
            annotations,
            categories,
            extra: Map::new(),
        }
    }

    /// Check the document before a review starts.
    ///
    /// Malformed boxes and duplicate annotation ids are fatal. Anything the
    /// reviewer can still work with is returned as a warning; no annotation
    /// is ever dropped here.
    pub fn validate(&self) -> Result<Vec<String>, ReviewError> {
        let mut warnings = Vec::new();

        if self.images.is_empty() && !self.annotations.is_empty() {
            warnings.push("Dataset has annotations but no images".to_string());
        }

        if self.categories.is_empty() && !self.annotations.is_empty() {
            warnings.push("Dataset has no categories; category edits will be rejected".to_string());
        }

        let image_ids: HashSet<_> = self.images.iter().map(|img| img.id).collect();
        let category_ids: HashSet<_> = self.categories.iter().map(|cat| cat.id).collect();
        let mut annotation_ids = HashSet::with_capacity(self.annotations.len());

        for ann in &self.annotations {
            if !annotation_ids.insert(ann.id) {
                return Err(ReviewError::DuplicateAnnotationId(ann.id));
            }
            if ann.bbox.len() != 4 {
                return Err(ReviewError::InvalidDataset(format!(
                    "annotation {}: invalid bbox format (expected 4 values, got {})",
                    ann.id,
                    ann.bbox.len()
                )));
            }
            if !image_ids.contains(&ann.image_id) {
                warnings.push(format!(
                    "Annotation {} references non-existent image_id {}",
                    ann.id, ann.image_id
                ));
            }
            if !category_ids.contains(&ann.category_id) {
                warnings.push(format!(
                    "Annotation {} references non-existent category_id {}",
                    ann.id, ann.category_id
                ));
            }
        }

        Ok(warnings)
    }

    /// Build a lookup map from image id to file name
    pub fn image_file_map(&self) -> HashMap<u64, String> {
        self.images
            .iter()
            .map(|img| (img.id, img.file_name.clone()))
            .collect()
    }

    /// Get list of all image filenames in the dataset
    pub fn get_image_filenames(&self) -> Vec<String> {
        self.images.iter().map(|img| img.file_name.clone()).collect()
    }

    /// The merge-ready form of a reviewed document: accepted annotations
    /// only, without the decision key.
    pub fn accepted_only(&self) -> Self {
        let annotations = self
            .annotations
            .iter()
            .filter(|ann| ann.decision == Some(Decision::Accepted))
            .map(|ann| CocoAnnotation {
                decision: None,
                ..ann.clone()
            })
            .collect();

        Self {
            images: self.images.clone(),
            annotations,
            categories: self.categories.clone(),
            extra: self.extra.clone(),
        }
    }
}

/// Corner box [x0, y0, x1, y1] to COCO [x, y, w, h]
pub fn corners_to_coco(x0: f64, y0: f64, x1: f64, y1: f64) -> [f64; 4] {
    [x0.min(x1), y0.min(y1), (x1 - x0).abs(), (y1 - y0).abs()]
}

/// Box in image pixels, used for drawing only
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    /// Build from a COCO [x, y, w, h] slice
    pub fn from_coco(bbox: &[f64]) -> Option<Self> {
        match *bbox {
            [x, y, width, height] => Some(Self {
                x: x as f32,
                y: y as f32,
                width: width as f32,
                height: height as f32,
            }),
            _ => None,
        }
    }

    /// Convert COCO bbox (x, y, w, h) to top-left and bottom-right corners
    pub fn to_corners(&self) -> (f32, f32, f32, f32) {
        (self.x, self.y, self.x + self.width, self.y + self.height)
    }
}
