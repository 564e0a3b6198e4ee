//! JSON loading utilities for COCO annotation documents.

use crate::error::{PvEvalError, Result};
use crate::types::CocoDataset;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Load a COCO annotation document from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, cannot be parsed, or fails
/// validation (see [`load_from_string`]).
///
/// # Example
///
/// ```no_run
/// use pv_eval::loader::load_from_file;
///
/// let dataset = load_from_file("train/_annotations.coco.json").unwrap();
/// println!("Loaded {} annotations", dataset.annotations.len());
/// ```
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<CocoDataset> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let dataset: CocoDataset = serde_json::from_reader(reader)?;

    validate_dataset(&dataset)?;

    Ok(dataset)
}

/// Load a COCO annotation document from a JSON string.
///
/// Missing top-level `images`, `annotations` or `categories` arrays are read as
/// empty. The category table may be incomplete; lookups fall back to a
/// synthesized name at parse time.
///
/// # Example
///
/// ```
/// use pv_eval::loader::load_from_string;
///
/// let json = r#"{
///     "images": [{"id": 0, "file_name": "a.jpg", "width": 640, "height": 640}],
///     "annotations": [],
///     "categories": [{"id": 1, "name": "solar-panel"}]
/// }"#;
/// let dataset = load_from_string(json).unwrap();
/// assert_eq!(dataset.images.len(), 1);
/// ```
pub fn load_from_string(json_str: &str) -> Result<CocoDataset> {
    let dataset: CocoDataset = serde_json::from_str(json_str)?;
    validate_dataset(&dataset)?;
    Ok(dataset)
}

/// Validate that a COCO document is internally consistent.
fn validate_dataset(dataset: &CocoDataset) -> Result<()> {
    let image_ids: HashSet<u64> = dataset.images.iter().map(|img| img.id).collect();

    for annotation in &dataset.annotations {
        if annotation.bbox.len() != 4 {
            return Err(PvEvalError::InvalidAnnotation(format!(
                "Annotation {} has invalid bbox length: {}",
                annotation.id,
                annotation.bbox.len()
            )));
        }

        if !annotation.to_bbox()?.is_valid() {
            return Err(PvEvalError::InvalidBoundingBox(format!(
                "Annotation {} has negative dimensions",
                annotation.id
            )));
        }

        if !image_ids.contains(&annotation.image_id) {
            return Err(PvEvalError::InvalidAnnotation(format!(
                "Annotation {} references unknown image {}",
                annotation.id, annotation.image_id
            )));
        }
    }

    Ok(())
}

/// Write one JSON document per line, creating parent directories.
pub fn write_jsonl<T: Serialize, P: AsRef<Path>>(path: P, records: &[T]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a JSON-lines file. Blank lines are ignored.
pub fn read_jsonl<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<Vec<T>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}
