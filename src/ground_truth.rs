//! Corpus-wide ground truth built from the per-split annotation documents.

use crate::error::Result;
use crate::parser::{load_split, ParsedSplit};
use crate::types::{GroundTruthRow, ObjectRow, Split};
use std::path::Path;
use tracing::info;

/// Ground truth across all processed splits, in split order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroundTruth {
    pub objects: Vec<ObjectRow>,
    pub images: Vec<GroundTruthRow>,
    /// Splits that had an annotation document.
    pub splits: Vec<Split>,
}

impl GroundTruth {
    /// Append one split's tables.
    pub fn push_split(&mut self, split: Split, parsed: ParsedSplit) {
        self.objects.extend(parsed.objects);
        self.images.extend(parsed.images);
        self.splits.push(split);
    }

    /// Number of (positive, negative) images.
    pub fn solar_distribution(&self) -> (usize, usize) {
        let positive = self.images.iter().filter(|row| row.has_solar_gt).count();
        (positive, self.images.len() - positive)
    }
}

/// Parse `splits` under `dataset_dir` and union them; absent splits are skipped.
pub fn build_ground_truth(dataset_dir: &Path, splits: &[Split]) -> Result<GroundTruth> {
    let mut ground_truth = GroundTruth::default();

    for &split in splits {
        if let Some(parsed) = load_split(dataset_dir, split)? {
            info!(
                %split,
                images = parsed.images.len(),
                objects = parsed.objects.len(),
                "parsed split"
            );
            ground_truth.push_split(split, parsed);
        }
    }

    let (positive, negative) = ground_truth.solar_distribution();
    info!(
        total_images = ground_truth.images.len(),
        total_objects = ground_truth.objects.len(),
        positive,
        negative,
        "ground truth extracted"
    );

    Ok(ground_truth)
}
