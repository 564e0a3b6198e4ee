//! Annotation parsing: one COCO split into object-level and image-level views.

use crate::error::Result;
use crate::loader::load_from_file;
use crate::types::{CocoDataset, GroundTruthRow, Image, ObjectRow, Split};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the per-split annotation document.
pub const ANNOTATION_FILE: &str = "_annotations.coco.json";

/// Both tabular views of one split.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSplit {
    pub objects: Vec<ObjectRow>,
    pub images: Vec<GroundTruthRow>,
}

/// Path of the annotation document for `split` under `dataset_dir`.
pub fn annotation_path(dataset_dir: &Path, split: Split) -> PathBuf {
    dataset_dir.join(split.as_str()).join(ANNOTATION_FILE)
}

/// Load and parse the annotation document of one split.
///
/// Returns `Ok(None)` when the split has no annotation document; the caller
/// moves on to the next split.
pub fn load_split(dataset_dir: &Path, split: Split) -> Result<Option<ParsedSplit>> {
    let path = annotation_path(dataset_dir, split);
    if !path.is_file() {
        warn!(%split, path = %path.display(), "no COCO file for split, skipping");
        return Ok(None);
    }

    let dataset = load_from_file(&path)?;
    debug!(
        %split,
        images = dataset.images.len(),
        annotations = dataset.annotations.len(),
        "loaded annotation document"
    );
    parse_split(split, &dataset).map(Some)
}

/// Name for a category id, or `class_<id>` when the category table lacks it.
pub fn category_name(categories: &HashMap<u64, &str>, category_id: u64) -> String {
    categories
        .get(&category_id)
        .map(|name| name.to_string())
        .unwrap_or_else(|| format!("class_{category_id}"))
}

/// Parse an already-loaded annotation document.
///
/// Every image in the document yields exactly one image-level row, including
/// images without annotations.
pub fn parse_split(split: Split, dataset: &CocoDataset) -> Result<ParsedSplit> {
    let objects = extract_objects(split, dataset)?;
    let images = aggregate_images(split, &dataset.images, &objects);
    Ok(ParsedSplit { objects, images })
}

/// One row per annotation record, in document order.
pub fn extract_objects(split: Split, dataset: &CocoDataset) -> Result<Vec<ObjectRow>> {
    let images_by_id: HashMap<u64, &Image> =
        dataset.images.iter().map(|img| (img.id, img)).collect();
    let categories: HashMap<u64, &str> = dataset
        .categories
        .iter()
        .map(|cat| (cat.id, cat.name.as_str()))
        .collect();

    let mut rows = Vec::with_capacity(dataset.annotations.len());
    for ann in &dataset.annotations {
        let image = images_by_id.get(&ann.image_id).ok_or_else(|| {
            crate::error::PvEvalError::InvalidAnnotation(format!(
                "Annotation {} references unknown image {}",
                ann.id, ann.image_id
            ))
        })?;
        let bbox = ann.to_bbox()?;
        let attrs = ann.attributes();

        rows.push(ObjectRow {
            split,
            image_id: ann.image_id,
            file_name: image.file_name.clone(),
            img_width_px: image.width,
            img_height_px: image.height,
            category_id: ann.category_id,
            category_name: category_name(&categories, ann.category_id),
            x_min_px: bbox.x,
            y_min_px: bbox.y,
            width_px: bbox.width,
            height_px: bbox.height,
            x_max_px: bbox.right(),
            y_max_px: bbox.bottom(),
            area_px: ann.pixel_area(&bbox),
            centroid_lat: attrs.centroid_lat,
            centroid_lon: attrs.centroid_lon,
            area_m2: attrs.area_m2,
        });
    }

    Ok(rows)
}

#[derive(Default)]
struct ImageTotals {
    count: usize,
    area_px: f64,
    area_m2: f64,
}

/// Summarize objects per image, keeping negatives with zeroed totals.
pub fn aggregate_images(
    split: Split,
    images: &[Image],
    objects: &[ObjectRow],
) -> Vec<GroundTruthRow> {
    let mut totals: HashMap<u64, ImageTotals> = HashMap::new();
    for obj in objects {
        let entry = totals.entry(obj.image_id).or_default();
        entry.count += 1;
        entry.area_px += obj.area_px;
        entry.area_m2 += obj.area_m2.unwrap_or(0.0);
    }

    images
        .iter()
        .map(|img| {
            let t = totals.remove(&img.id).unwrap_or_default();
            GroundTruthRow {
                split,
                file_name: img.file_name.clone(),
                image_id: img.id,
                img_width_px: img.width,
                img_height_px: img.height,
                num_boxes_gt: t.count,
                area_px_gt: t.area_px,
                area_m2_gt: t.area_m2,
                has_solar_gt: t.count > 0,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_from_string;

    fn sample() -> CocoDataset {
        load_from_string(
            r#"{
            "images": [
                {"id": 0, "file_name": "pos.jpg", "width": 640, "height": 480},
                {"id": 1, "file_name": "neg.jpg", "width": 640, "height": 480}
            ],
            "categories": [{"id": 1, "name": "solar-panel"}],
            "annotations": [
                {"id": 1, "image_id": 0, "category_id": 1, "bbox": [10, 20, 5, 4]},
                {"id": 2, "image_id": 0, "category_id": 3, "bbox": [0, 0, 2, 2], "area": 3.5,
                 "attributes": {"area_m2": 1.25}}
            ]
        }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_object_rows() {
        let objects = extract_objects(Split::Valid, &sample()).unwrap();
        assert_eq!(objects.len(), 2);

        let first = &objects[0];
        assert_eq!(first.file_name, "pos.jpg");
        assert_eq!(first.category_name, "solar-panel");
        assert_eq!(first.x_max_px, 15.0);
        assert_eq!(first.y_max_px, 24.0);
        assert_eq!(first.area_px, 20.0);
        assert_eq!(first.area_m2, None);

        let second = &objects[1];
        assert_eq!(second.category_name, "class_3");
        assert_eq!(second.area_px, 3.5);
    }

    #[test]
    fn test_negative_image_kept() {
        let parsed = parse_split(Split::Train, &sample()).unwrap();
        assert_eq!(parsed.images.len(), 2);

        let pos = &parsed.images[0];
        assert_eq!(pos.num_boxes_gt, 2);
        assert!((pos.area_px_gt - 23.5).abs() < 1e-12);
        assert!((pos.area_m2_gt - 1.25).abs() < 1e-12);
        assert!(pos.has_solar_gt);

        let neg = &parsed.images[1];
        assert_eq!(neg.num_boxes_gt, 0);
        assert_eq!(neg.area_px_gt, 0.0);
        assert_eq!(neg.area_m2_gt, 0.0);
        assert!(!neg.has_solar_gt);
    }

    #[test]
    fn test_missing_split_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_split(dir.path(), Split::Test).unwrap();
        assert!(result.is_none());
    }
}
