/// Box overlay for the review window
///
/// Draws the current box (colored by its decision) and the accepted context
/// boxes straight into a copy of the decoded image. `ImageSlot` holds the one
/// decoded image on screen.
use std::path::Path;
use image::{Rgba, RgbaImage};
use log::{debug, info, warn};

use crate::coco_parser::{BoundingBox, CocoDataset};
use crate::error::ReviewError;
use crate::review::{Decision, ReviewAnnotation};
use crate::settings::BoxColors;

// Number of dataset images checked when verifying the image directory
const VERIFY_SAMPLE: usize = 20;

pub fn decision_color(decision: Decision, colors: &BoxColors) -> [u8; 3] {
    match decision {
        Decision::Unreviewed => colors.unreviewed,
        Decision::Accepted => colors.accepted,
        Decision::Rejected => colors.rejected,
    }
}

/// Draw a rectangle outline, growing inwards by `thickness` pixels.
/// Parts outside the image are clipped.
pub fn draw_box(img: &mut RgbaImage, bbox: &BoundingBox, color: [u8; 3], thickness: u32) {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    let (x0, y0, x1, y1) = bbox.to_corners();
    let left = x0.floor() as i64;
    let top = y0.floor() as i64;
    let right = x1.floor() as i64;
    let bottom = y1.floor() as i64;

    if right < 0 || bottom < 0 || left >= width as i64 || top >= height as i64 {
        return;
    }

    let pixel = Rgba([color[0], color[1], color[2], 255]);
    let mut put = |x: i64, y: i64| {
        if x >= 0 && y >= 0 && x < width as i64 && y < height as i64 {
            img.put_pixel(x as u32, y as u32, pixel);
        }
    };

    // Clamp the scan ranges to the image so huge boxes stay cheap
    let x_range = left.max(0)..=right.min(width as i64 - 1);
    let y_range = top.max(0)..=bottom.min(height as i64 - 1);

    for t in 0..thickness as i64 {
        for x in x_range.clone() {
            put(x, top + t);
            put(x, bottom - t);
        }
        for y in y_range.clone() {
            put(left + t, y);
            put(right - t, y);
        }
    }
}

/// Copy of `base` with the context boxes and the current box drawn on it
pub fn compose(
    base: &RgbaImage,
    current: &ReviewAnnotation,
    context: &[BoundingBox],
    colors: &BoxColors,
    thickness: u32,
) -> RgbaImage {
    let mut frame = base.clone();
    for bbox in context {
        draw_box(&mut frame, bbox, colors.context, thickness);
    }
    draw_box(&mut frame, &current.bbox, decision_color(current.decision, colors), thickness);
    frame
}

/// The decoded image of the annotation on screen. Swapped only when the
/// cursor reaches an annotation of a different image.
#[derive(Default)]
pub struct ImageSlot {
    image_id: Option<u64>,
    image: Option<RgbaImage>,
}

impl ImageSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_image_id(&self) -> Option<u64> {
        self.image_id
    }

    pub fn load(&mut self, image_id: u64, path: &Path) -> Result<&RgbaImage, ReviewError> {
        let image = match self.image.take() {
            Some(image) if self.image_id == Some(image_id) => image,
            _ => {
                self.release();
                let image = image::open(path)
                    .map_err(|e| ReviewError::Image { path: path.to_path_buf(), source: e })?
                    .to_rgba8();
                debug!("Loaded {} ({}x{})", path.display(), image.width(), image.height());
                image
            }
        };

        self.image_id = Some(image_id);
        Ok(self.image.insert(image))
    }

    pub fn release(&mut self) {
        if let Some(id) = self.image_id.take() {
            debug!("Released image {}", id);
        }
        self.image = None;
    }
}

/// Check that the image directory holds the dataset's images.
///
/// Samples the first few file names; fails only when none of them exist.
pub fn verify_image_directory(dataset: &CocoDataset, directory: &Path) -> Result<usize, ReviewError> {
    if dataset.images.is_empty() {
        return Ok(0);
    }
    if !directory.is_dir() {
        return Err(ReviewError::ImageDirectory(directory.to_path_buf()));
    }

    let filenames = dataset.get_image_filenames();
    let check_count = filenames.len().min(VERIFY_SAMPLE);
    let found = filenames
        .iter()
        .take(check_count)
        .filter(|name| directory.join(name).exists())
        .count();

    if found == 0 {
        return Err(ReviewError::ImageDirectory(directory.to_path_buf()));
    }
    if found < check_count {
        warn!(
            "Only {} of {} sampled images found in {}",
            found,
            check_count,
            directory.display()
        );
    } else {
        info!("Found {} sampled images in directory: {}", found, directory.display());
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [u8; 3] = [255, 0, 0];

    fn blank(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]))
    }

    fn is_color(img: &RgbaImage, x: u32, y: u32, color: [u8; 3]) -> bool {
        img.get_pixel(x, y).0 == [color[0], color[1], color[2], 255]
    }

    #[test]
    fn test_draw_box_outline() {
        let mut img = blank(10, 10);
        let bbox = BoundingBox { x: 2.0, y: 2.0, width: 5.0, height: 4.0 };
        draw_box(&mut img, &bbox, RED, 1);

        assert!(is_color(&img, 2, 2, RED));
        assert!(is_color(&img, 7, 2, RED));
        assert!(is_color(&img, 2, 6, RED));
        assert!(is_color(&img, 7, 6, RED));
        assert!(is_color(&img, 4, 2, RED));
        // Interior and outside untouched
        assert!(is_color(&img, 4, 4, [0, 0, 0]));
        assert!(is_color(&img, 8, 8, [0, 0, 0]));
    }

    #[test]
    fn test_draw_box_clips_to_image() {
        let mut img = blank(10, 10);
        let bbox = BoundingBox { x: -5.0, y: 5.0, width: 100.0, height: 100.0 };
        draw_box(&mut img, &bbox, RED, 2);
        assert!(is_color(&img, 0, 5, RED));
        assert!(is_color(&img, 9, 6, RED));
        assert!(is_color(&img, 5, 9, [0, 0, 0]));

        let mut untouched = blank(10, 10);
        let outside = BoundingBox { x: 20.0, y: 20.0, width: 5.0, height: 5.0 };
        draw_box(&mut untouched, &outside, RED, 2);
        assert_eq!(untouched, blank(10, 10));
    }

    #[test]
    fn test_compose_colors_by_decision() {
        let colors = BoxColors::default();
        let base = blank(20, 20);
        let mut current = ReviewAnnotation {
            id: 1,
            image_id: 1,
            bbox: BoundingBox { x: 1.0, y: 1.0, width: 5.0, height: 5.0 },
            category_id: 1,
            decision: Decision::Unreviewed,
        };
        let context = [BoundingBox { x: 10.0, y: 10.0, width: 5.0, height: 5.0 }];

        let frame = compose(&base, &current, &context, &colors, 1);
        assert!(is_color(&frame, 1, 1, colors.unreviewed));
        assert!(is_color(&frame, 10, 10, colors.context));
        // The base image is not modified
        assert_eq!(base, blank(20, 20));

        current.decision = Decision::Rejected;
        let frame = compose(&base, &current, &[], &colors, 1);
        assert!(is_color(&frame, 1, 1, colors.rejected));
        assert!(is_color(&frame, 10, 10, [0, 0, 0]));
    }

    #[test]
    fn test_image_slot_swaps_on_new_image() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.png");
        let second = dir.path().join("second.png");
        blank(4, 3).save(&first).unwrap();
        blank(6, 5).save(&second).unwrap();

        let mut slot = ImageSlot::new();
        assert_eq!(slot.load(1, &first).unwrap().dimensions(), (4, 3));
        // Same image id does not touch the disk again
        std::fs::remove_file(&first).unwrap();
        assert_eq!(slot.load(1, &first).unwrap().dimensions(), (4, 3));

        assert_eq!(slot.load(2, &second).unwrap().dimensions(), (6, 5));
        assert_eq!(slot.current_image_id(), Some(2));

        assert!(matches!(slot.load(1, &first), Err(ReviewError::Image { .. })));
        assert_eq!(slot.current_image_id(), None);
    }

    #[test]
    fn test_verify_image_directory() {
        let dir = tempfile::tempdir().unwrap();
        blank(2, 2).save(dir.path().join("a.png")).unwrap();

        let json = r#"{"images": [{"id": 1, "file_name": "a.png"}, {"id": 2, "file_name": "b.png"}],
            "annotations": [], "categories": []}"#;
        let dataset = CocoDataset::from_json_str(json).unwrap();
        assert_eq!(verify_image_directory(&dataset, dir.path()).unwrap(), 1);

        let missing = dir.path().join("nope");
        assert!(matches!(
            verify_image_directory(&dataset, &missing),
            Err(ReviewError::ImageDirectory(_))
        ));
        assert_eq!(verify_image_directory(&CocoDataset::empty(), &missing).unwrap(), 0);
    }
}
