/// Review session for candidate false-positive annotations
///
/// Holds the ordered annotation list, the cursor and each annotation's
/// decision. Navigation and decisions are plain method calls so the whole
/// review can be driven without a window.
use std::collections::HashMap;
use serde::{Deserialize, Serialize};

#[allow(unused_imports)]
use log::{debug, info, warn};

use crate::coco_parser::{BoundingBox, CocoCategory, CocoDataset};
use crate::error::ReviewError;
use crate::store::AnnotationStore;

/// Review outcome of a single annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    #[default]
    Unreviewed,
    #[serde(alias = "accept")]
    Accepted,
    #[serde(alias = "reject")]
    Rejected,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Decision::Unreviewed => "unreviewed",
            Decision::Accepted => "accepted",
            Decision::Rejected => "rejected",
        };
        f.write_str(label)
    }
}

/// Session view of one candidate box
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewAnnotation {
    pub id: u64,
    pub image_id: u64,
    pub bbox: BoundingBox,
    pub category_id: u64,
    pub decision: Decision,
}

/// Operations that change the session, one per key command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Accept,
    Reject,
    Skip,
    Previous,
    EditCategory(String),
}

/// What an operation did
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Recorded { index: usize, decision: Decision, advanced: bool },
    Moved { from: usize, to: usize },
    CategoryChanged { index: usize, from: u64, to: u64 },
    Terminated { annotations: usize },
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Terminated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReviewProgress {
    pub total: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub unreviewed: usize,
}

/// Category names and ids of the dataset, used to resolve edit labels
#[derive(Debug, Clone, Default)]
pub struct CategoryTable {
    entries: Vec<CocoCategory>,
}

impl CategoryTable {
    pub fn new(entries: Vec<CocoCategory>) -> Self {
        Self { entries }
    }

    /// Resolve a user-entered label to a category id.
    ///
    /// A numeric label names an id directly; anything else must match a
    /// category name, ignoring case.
    pub fn resolve(&self, label: &str) -> Option<u64> {
        let label = label.trim();
        if label.is_empty() {
            return None;
        }

        if let Ok(id) = label.parse::<u64>() {
            if self.entries.iter().any(|cat| cat.id == id) {
                return Some(id);
            }
        }

        self.entries
            .iter()
            .find(|cat| cat.name.eq_ignore_ascii_case(label))
            .map(|cat| cat.id)
    }

    pub fn name(&self, id: u64) -> Option<&str> {
        self.entries
            .iter()
            .find(|cat| cat.id == id)
            .map(|cat| cat.name.as_str())
    }

    /// Display name, falling back to the raw id
    pub fn display_name(&self, id: u64) -> String {
        self.name(id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Unknown ({})", id))
    }

    pub fn entries(&self) -> &[CocoCategory] {
        &self.entries
    }
}

pub struct ReviewSession {
    /// The loaded document; decisions and categories are written back into a
    /// copy of it on flush
    source: CocoDataset,
    annotations: Vec<ReviewAnnotation>,
    categories: CategoryTable,
    image_files: HashMap<u64, String>,
    cursor: Option<usize>,
    state: SessionState,
    dirty: bool,
}

impl ReviewSession {
    /// Build a session from a loaded document.
    ///
    /// Fails when the document is not reviewable (malformed boxes, duplicate
    /// ids). Other validation findings are logged.
    pub fn from_dataset(dataset: CocoDataset) -> Result<Self, ReviewError> {
        let warnings = dataset.validate()?;
        for warning in &warnings {
            warn!("{}", warning);
        }

        let annotations = dataset
            .annotations
            .iter()
            .map(|ann| {
                let bbox = BoundingBox::from_coco(&ann.bbox).ok_or_else(|| {
                    ReviewError::InvalidDataset(format!("annotation {}: invalid bbox", ann.id))
                })?;
                Ok(ReviewAnnotation {
                    id: ann.id,
                    image_id: ann.image_id,
                    bbox,
                    category_id: ann.category_id,
                    decision: ann.decision.unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>, ReviewError>>()?;

        let cursor = if annotations.is_empty() { None } else { Some(0) };
        let categories = CategoryTable::new(dataset.categories.clone());
        let image_files = dataset.image_file_map();

        info!(
            "Review session created: {} annotations on {} images, {} categories",
            annotations.len(),
            dataset.images.len(),
            dataset.categories.len()
        );

        Ok(Self {
            source: dataset,
            annotations,
            categories,
            image_files,
            cursor,
            state: SessionState::Active,
            dirty: false,
        })
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&ReviewAnnotation> {
        self.cursor.map(|idx| &self.annotations[idx])
    }

    pub fn annotations(&self) -> &[ReviewAnnotation] {
        &self.annotations
    }

    pub fn categories(&self) -> &CategoryTable {
        &self.categories
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == SessionState::Terminated
    }

    /// True when decisions or categories changed since the last flush
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn image_file(&self, image_id: u64) -> Option<&str> {
        self.image_files.get(&image_id).map(String::as_str)
    }

    pub fn is_last(&self) -> bool {
        matches!(self.cursor, Some(idx) if idx + 1 == self.annotations.len())
    }

    pub fn progress(&self) -> ReviewProgress {
        let mut progress = ReviewProgress {
            total: self.annotations.len(),
            ..ReviewProgress::default()
        };
        for ann in &self.annotations {
            match ann.decision {
                Decision::Unreviewed => progress.unreviewed += 1,
                Decision::Accepted => progress.accepted += 1,
                Decision::Rejected => progress.rejected += 1,
            }
        }
        progress
    }

    /// Accepted boxes on the same image as the current annotation,
    /// excluding the current one
    pub fn accepted_context(&self) -> Vec<BoundingBox> {
        let Some(current) = self.current() else {
            return Vec::new();
        };
        self.annotations
            .iter()
            .filter(|ann| {
                ann.image_id == current.image_id
                    && ann.id != current.id
                    && ann.decision == Decision::Accepted
            })
            .map(|ann| ann.bbox)
            .collect()
    }

    /// Dispatch one operation
    pub fn apply(&mut self, op: Operation) -> Result<Outcome, ReviewError> {
        match op {
            Operation::Accept => Ok(self.accept()),
            Operation::Reject => Ok(self.reject()),
            Operation::Skip => Ok(self.skip()),
            Operation::Previous => Ok(self.previous()),
            Operation::EditCategory(label) => self.edit_category(&label),
        }
    }

    pub fn accept(&mut self) -> Outcome {
        self.record(Decision::Accepted)
    }

    pub fn reject(&mut self) -> Outcome {
        self.record(Decision::Rejected)
    }

    /// Move on without touching the decision
    pub fn skip(&mut self) -> Outcome {
        let Some(from) = self.active_cursor() else {
            return Outcome::Unchanged;
        };
        let to = self.advance();
        debug!("Skipped annotation {} of {}", from + 1, self.len());
        if to == from {
            Outcome::Unchanged
        } else {
            Outcome::Moved { from, to }
        }
    }

    pub fn previous(&mut self) -> Outcome {
        match self.active_cursor() {
            Some(from) if from > 0 => {
                let to = from - 1;
                self.cursor = Some(to);
                debug!("Going back to annotation {}", to + 1);
                Outcome::Moved { from, to }
            }
            Some(_) => {
                debug!("Already at the first annotation");
                Outcome::Unchanged
            }
            None => Outcome::Unchanged,
        }
    }

    /// Change the category of the current annotation. The decision is kept.
    pub fn edit_category(&mut self, label: &str) -> Result<Outcome, ReviewError> {
        let Some(index) = self.active_cursor() else {
            return Ok(Outcome::Unchanged);
        };

        let to = self
            .categories
            .resolve(label)
            .ok_or_else(|| ReviewError::InvalidCategory(label.trim().to_string()))?;

        let ann = &mut self.annotations[index];
        let from = ann.category_id;
        if from == to {
            return Ok(Outcome::Unchanged);
        }

        ann.category_id = to;
        self.dirty = true;
        info!(
            "Annotation {}: category {} -> {}",
            ann.id,
            self.categories.display_name(from),
            self.categories.display_name(to)
        );
        Ok(Outcome::CategoryChanged { index, from, to })
    }

    /// Move the cursor to the first annotation of the named image
    pub fn jump_to_image(&mut self, file_name: &str) -> Option<usize> {
        self.active_cursor()?;

        let index = self.annotations.iter().position(|ann| {
            self.image_files.get(&ann.image_id).map(String::as_str) == Some(file_name)
        })?;
        self.cursor = Some(index);
        info!("Starting from annotation {} ({})", index + 1, file_name);
        Some(index)
    }

    /// Flush the session to the store and terminate.
    ///
    /// On a write failure the session stays active so that no decision is
    /// lost; the caller may retry or pick another store.
    pub fn quit(&mut self, store: &dyn AnnotationStore) -> Result<Outcome, ReviewError> {
        if self.is_terminated() {
            return Ok(Outcome::Unchanged);
        }

        let output = self.to_dataset();
        store.save(&output)?;

        self.dirty = false;
        self.state = SessionState::Terminated;
        info!(
            "Review finished: {} annotations written to {}",
            output.annotations.len(),
            store.describe()
        );
        Ok(Outcome::Terminated { annotations: output.annotations.len() })
    }

    /// The loaded document with the session's decisions and categories
    /// written into each annotation, in the original order
    pub fn to_dataset(&self) -> CocoDataset {
        let mut output = self.source.clone();
        for (ann, reviewed) in output.annotations.iter_mut().zip(&self.annotations) {
            if ann.category_id != reviewed.category_id {
                ann.category_id = reviewed.category_id;
                // Flat false-positive lists carry the label name next to the id
                if ann.extra.contains_key("label_name") {
                    if let Some(name) = self.categories.name(reviewed.category_id) {
                        ann.extra.insert("label_name".to_string(), name.into());
                    }
                }
            }
            ann.decision = Some(reviewed.decision);
        }
        output
    }

    fn record(&mut self, decision: Decision) -> Outcome {
        let Some(index) = self.active_cursor() else {
            return Outcome::Unchanged;
        };

        self.annotations[index].decision = decision;
        self.dirty = true;
        info!("Marked annotation {} of {} as {}", index + 1, self.len(), decision);

        let advanced = self.advance() != index;
        Outcome::Recorded { index, decision, advanced }
    }

    /// Step forward, clamped at the last annotation
    fn advance(&mut self) -> usize {
        let last = self.annotations.len().saturating_sub(1);
        let next = self.cursor.map_or(0, |idx| (idx + 1).min(last));
        self.cursor = Some(next);
        next
    }

    /// The cursor, if the session is active and non-empty
    fn active_cursor(&self) -> Option<usize> {
        match self.state {
            SessionState::Active => self.cursor,
            SessionState::Terminated => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn dataset(count: u64) -> CocoDataset {
        let annotations: Vec<String> = (1..=count)
            .map(|id| {
                format!(
                    r#"{{"id": {id}, "image_id": {image}, "category_id": 1, "bbox": [{id}, 0, 10, 10]}}"#,
                    image = (id + 1) / 2
                )
            })
            .collect();
        let json = format!(
            r#"{{"images": [{{"id": 1, "file_name": "one.jpg"}}, {{"id": 2, "file_name": "two.jpg"}}],
                "categories": [{{"id": 1, "name": "truck"}}, {{"id": 2, "name": "Bus"}}],
                "annotations": [{}]}}"#,
            annotations.join(",")
        );
        CocoDataset::from_json_str(&json).unwrap()
    }

    fn decisions(session: &ReviewSession) -> Vec<Decision> {
        session.annotations().iter().map(|a| a.decision).collect()
    }

    #[test]
    fn test_accept_reject_skip_previous_quit_scenario() {
        let mut session = ReviewSession::from_dataset(dataset(3)).unwrap();
        assert_eq!(session.cursor(), Some(0));
        assert_eq!(decisions(&session), vec![Decision::Unreviewed; 3]);

        session.accept();
        session.reject();
        session.skip();
        assert_eq!(
            decisions(&session),
            vec![Decision::Accepted, Decision::Rejected, Decision::Unreviewed]
        );
        assert_eq!(session.cursor(), Some(2));

        assert_eq!(session.previous(), Outcome::Moved { from: 2, to: 1 });
        assert_eq!(session.cursor(), Some(1));
        assert_eq!(
            decisions(&session),
            vec![Decision::Accepted, Decision::Rejected, Decision::Unreviewed]
        );

        let store = MemoryStore::default();
        let outcome = session.quit(&store).unwrap();
        assert_eq!(outcome, Outcome::Terminated { annotations: 3 });
        assert!(session.is_terminated());

        let saved = store.saved().unwrap();
        let ids: Vec<u64> = saved.annotations.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        let saved_decisions: Vec<_> = saved.annotations.iter().map(|a| a.decision).collect();
        assert_eq!(
            saved_decisions,
            vec![
                Some(Decision::Accepted),
                Some(Decision::Rejected),
                Some(Decision::Unreviewed)
            ]
        );
    }

    #[test]
    fn test_cursor_clamps_at_last_annotation() {
        let mut session = ReviewSession::from_dataset(dataset(2)).unwrap();
        session.skip();
        assert!(session.is_last());

        let outcome = session.accept();
        assert_eq!(
            outcome,
            Outcome::Recorded { index: 1, decision: Decision::Accepted, advanced: false }
        );
        assert_eq!(session.cursor(), Some(1));

        assert_eq!(session.reject(), Outcome::Recorded { index: 1, decision: Decision::Rejected, advanced: false });
        assert_eq!(session.skip(), Outcome::Unchanged);
        assert_eq!(session.cursor(), Some(1));
        assert_eq!(session.annotations()[1].decision, Decision::Rejected);
    }

    #[test]
    fn test_previous_at_first_is_noop() {
        let mut session = ReviewSession::from_dataset(dataset(3)).unwrap();
        assert_eq!(session.previous(), Outcome::Unchanged);
        assert_eq!(session.cursor(), Some(0));
        assert!(!session.is_dirty());
    }

    #[test]
    fn test_operation_sequences_keep_length_and_bounds() {
        let ops = [
            Operation::Accept,
            Operation::Previous,
            Operation::Skip,
            Operation::Reject,
            Operation::Previous,
            Operation::Previous,
            Operation::Previous,
            Operation::Accept,
        ];
        let mut session = ReviewSession::from_dataset(dataset(5)).unwrap();

        // Deterministic walk over many operation orders
        let mut seed: usize = 17;
        for _ in 0..500 {
            seed = seed.wrapping_mul(1103515245).wrapping_add(12345) % (1 << 31);
            let op = ops[seed % ops.len()].clone();
            session.apply(op).unwrap();

            assert_eq!(session.len(), 5);
            let cursor = session.cursor().unwrap();
            assert!(cursor < 5);
        }
    }

    #[test]
    fn test_re_review_changes_decision() {
        let mut session = ReviewSession::from_dataset(dataset(2)).unwrap();
        session.accept();
        session.previous();
        session.reject();
        assert_eq!(session.annotations()[0].decision, Decision::Rejected);
        assert_eq!(session.progress(), ReviewProgress { total: 2, accepted: 0, rejected: 1, unreviewed: 1 });
    }

    #[test]
    fn test_edit_category() {
        let mut session = ReviewSession::from_dataset(dataset(2)).unwrap();
        session.reject();
        session.previous();

        let outcome = session.edit_category("bus").unwrap();
        assert_eq!(outcome, Outcome::CategoryChanged { index: 0, from: 1, to: 2 });
        assert_eq!(session.annotations()[0].category_id, 2);
        // Decision and cursor untouched
        assert_eq!(session.annotations()[0].decision, Decision::Rejected);
        assert_eq!(session.cursor(), Some(0));

        assert_eq!(session.edit_category(" 1 ").unwrap(), Outcome::CategoryChanged { index: 0, from: 2, to: 1 });
        assert_eq!(session.edit_category("truck").unwrap(), Outcome::Unchanged);
    }

    #[test]
    fn test_invalid_category_is_rejected() {
        let mut session = ReviewSession::from_dataset(dataset(1)).unwrap();
        assert!(matches!(session.edit_category(""), Err(ReviewError::InvalidCategory(_))));
        assert!(matches!(session.edit_category("   "), Err(ReviewError::InvalidCategory(_))));
        assert!(matches!(session.edit_category("bicycle"), Err(ReviewError::InvalidCategory(_))));
        assert!(matches!(session.edit_category("99"), Err(ReviewError::InvalidCategory(_))));
        assert_eq!(session.annotations()[0].category_id, 1);
        assert!(!session.is_dirty());
    }

    #[test]
    fn test_empty_session() {
        let mut session = ReviewSession::from_dataset(CocoDataset::empty()).unwrap();
        assert!(session.is_empty());
        assert_eq!(session.cursor(), None);
        assert_eq!(session.accept(), Outcome::Unchanged);
        assert_eq!(session.reject(), Outcome::Unchanged);
        assert_eq!(session.skip(), Outcome::Unchanged);
        assert_eq!(session.previous(), Outcome::Unchanged);
        assert_eq!(session.edit_category("truck").unwrap(), Outcome::Unchanged);
        assert_eq!(session.cursor(), None);

        let store = MemoryStore::default();
        assert_eq!(session.quit(&store).unwrap(), Outcome::Terminated { annotations: 0 });
        assert!(store.saved().unwrap().annotations.is_empty());
    }

    #[test]
    fn test_failed_quit_keeps_session_active() {
        let mut session = ReviewSession::from_dataset(dataset(2)).unwrap();
        session.accept();

        let store = MemoryStore::failing(1);
        assert!(session.quit(&store).is_err());
        assert!(!session.is_terminated());
        assert!(session.is_dirty());
        assert_eq!(session.annotations()[0].decision, Decision::Accepted);

        session.quit(&store).unwrap();
        assert!(session.is_terminated());
        assert!(!session.is_dirty());
        assert_eq!(store.saved().unwrap().annotations[0].decision, Some(Decision::Accepted));
    }

    #[test]
    fn test_operations_after_quit_are_noops() {
        let mut session = ReviewSession::from_dataset(dataset(2)).unwrap();
        let store = MemoryStore::default();
        session.quit(&store).unwrap();

        assert_eq!(session.accept(), Outcome::Unchanged);
        assert_eq!(session.annotations()[0].decision, Decision::Unreviewed);
        assert_eq!(session.quit(&store).unwrap(), Outcome::Unchanged);
    }

    #[test]
    fn test_round_trip_reproduces_decisions() {
        let mut session = ReviewSession::from_dataset(dataset(4)).unwrap();
        session.accept();
        session.reject();
        session.skip();
        session.accept();
        session.edit_category("bus").unwrap();

        let store = MemoryStore::default();
        session.quit(&store).unwrap();

        let json = serde_json::to_string(&store.saved().unwrap()).unwrap();
        let reloaded = ReviewSession::from_dataset(CocoDataset::from_json_str(&json).unwrap()).unwrap();
        assert_eq!(reloaded.annotations(), session.annotations());
    }

    #[test]
    fn test_category_edit_updates_label_name() {
        let fp_json = r#"[
            {"image_id": 1, "file_name": "a.jpg", "bbox": [0, 0, 10, 10], "category_id": 3, "label_name": "truck"},
            {"image_id": 1, "file_name": "a.jpg", "bbox": [5, 5, 20, 20], "category_id": 5, "label_name": "bus"},
            {"image_id": 2, "file_name": "b.jpg", "bbox": [1, 1, 4, 4], "category_id": 3, "label_name": "truck"}
        ]"#;
        let mut session = ReviewSession::from_dataset(CocoDataset::from_json_str(fp_json).unwrap()).unwrap();
        session.edit_category("bus").unwrap();
        session.accept();

        let store = MemoryStore::default();
        session.quit(&store).unwrap();
        let saved = store.saved().unwrap();

        assert_eq!(saved.annotations[0].category_id, 5);
        assert_eq!(saved.annotations[0].extra["label_name"], "bus");
        // Untouched annotations keep their label
        assert_eq!(saved.annotations[1].extra["label_name"], "bus");
        assert_eq!(saved.annotations[2].extra["label_name"], "truck");
    }

    #[test]
    fn test_jump_to_image() {
        let mut session = ReviewSession::from_dataset(dataset(4)).unwrap();
        assert_eq!(session.jump_to_image("two.jpg"), Some(2));
        assert_eq!(session.cursor(), Some(2));
        assert_eq!(session.jump_to_image("missing.jpg"), None);
        assert_eq!(session.cursor(), Some(2));
    }

    #[test]
    fn test_accepted_context() {
        let mut session = ReviewSession::from_dataset(dataset(4)).unwrap();
        // annotations 1 and 2 are on image 1
        session.accept();
        let context = session.accepted_context();
        assert_eq!(context.len(), 1);
        assert_eq!(context[0].x, 1.0);

        session.accept();
        // cursor now on annotation 3 (image 2)
        assert!(session.accepted_context().is_empty());
    }
}
