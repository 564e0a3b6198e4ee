//! Core data types for COCO annotations, image-level tables and evaluation results.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PvEvalError;

/// A partition of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Valid,
    Test,
}

impl Split {
    /// All splits in processing order.
    pub const ALL: [Split; 3] = [Split::Train, Split::Valid, Split::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Valid => "valid",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Split {
    type Err = PvEvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(Split::Train),
            "valid" => Ok(Split::Valid),
            "test" => Ok(Split::Test),
            other => Err(PvEvalError::InvalidDataFrame(format!(
                "unknown split '{other}'"
            ))),
        }
    }
}

/// Represents a bounding box in COCO format (x, y, width, height).
///
/// Coordinates are in LTWH (Left-Top-Width-Height) pixel units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Get the area of the bounding box.
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Get the right coordinate (x + width).
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Get the bottom coordinate (y + height).
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Check that the box has non-negative dimensions.
    ///
    /// Degenerate (zero width or height) boxes are accepted; annotation tools
    /// occasionally emit them and they still mark the image as positive.
    pub fn is_valid(&self) -> bool {
        self.width >= 0.0 && self.height >= 0.0
    }
}

/// Represents a category in the COCO dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supercategory: Option<String>,
}

/// Represents an image in the COCO dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: u64,
    pub file_name: String,
    pub height: u32,
    pub width: u32,
}

/// Optional geo-referencing attributes attached to an annotation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationAttributes {
    #[serde(default)]
    pub centroid_lat: Option<f64>,
    #[serde(default)]
    pub centroid_lon: Option<f64>,
    /// Real-world footprint in square meters.
    #[serde(default)]
    pub area_m2: Option<f64>,
}

/// Represents an annotation in COCO format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(default)]
    pub id: u64,
    pub image_id: u64,
    pub category_id: u64,
    /// Bounding box in [x, y, width, height] format
    pub bbox: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<AnnotationAttributes>,
}

impl Annotation {
    /// Convert the bbox array to a BoundingBox struct.
    pub fn to_bbox(&self) -> crate::error::Result<BoundingBox> {
        if self.bbox.len() != 4 {
            return Err(crate::error::PvEvalError::InvalidBoundingBox(format!(
                "Expected 4 values, got {}",
                self.bbox.len()
            )));
        }
        Ok(BoundingBox::new(
            self.bbox[0],
            self.bbox[1],
            self.bbox[2],
            self.bbox[3],
        ))
    }

    /// Pixel area: the explicit `area` field when present, otherwise width x height.
    pub fn pixel_area(&self, bbox: &BoundingBox) -> f64 {
        self.area.unwrap_or_else(|| bbox.area())
    }

    /// Geo attributes, with an absent or null map read as all-empty.
    pub fn attributes(&self) -> AnnotationAttributes {
        self.attributes.clone().unwrap_or_default()
    }
}

/// Represents a complete COCO annotation document for one split.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CocoDataset {
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub categories: Vec<Category>,
}

/// One annotated object, flattened with its image and category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRow {
    pub split: Split,
    pub image_id: u64,
    pub file_name: String,
    pub img_width_px: u32,
    pub img_height_px: u32,
    pub category_id: u64,
    pub category_name: String,
    pub x_min_px: f64,
    pub y_min_px: f64,
    pub width_px: f64,
    pub height_px: f64,
    pub x_max_px: f64,
    pub y_max_px: f64,
    pub area_px: f64,
    pub centroid_lat: Option<f64>,
    pub centroid_lon: Option<f64>,
    pub area_m2: Option<f64>,
}

/// Per-image ground truth summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthRow {
    pub split: Split,
    pub file_name: String,
    pub image_id: u64,
    pub img_width_px: u32,
    pub img_height_px: u32,
    pub num_boxes_gt: usize,
    pub area_px_gt: f64,
    pub area_m2_gt: f64,
    pub has_solar_gt: bool,
}

/// Per-image prediction summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    pub split: Split,
    pub file_name: String,
    pub image_path: String,
    pub num_preds: usize,
    pub has_solar_pred: bool,
    pub max_conf_pred: f64,
    pub area_px_pred: f64,
}

/// A ground truth row joined with the prediction row for the same image.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    pub ground_truth: GroundTruthRow,
    pub prediction: PredictionRow,
}

impl MergedRow {
    /// Signed area error (predicted minus ground truth) in px².
    pub fn area_error(&self) -> f64 {
        self.prediction.area_px_pred - self.ground_truth.area_px_gt
    }
}

/// Evaluation summary for the binary "contains solar" task and the area estimate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsResult {
    pub tp: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
    pub tn: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub mae_px2: f64,
    pub rmse_px2: f64,
    pub mape_percent: f64,
    /// Images with a non-zero ground truth or predicted area.
    pub num_images_area_eval: usize,
    pub total_images: usize,
}

impl MetricsResult {
    /// Print the evaluation block to stdout.
    pub fn print_summary(&self) {
        println!("\n=== EVALUATION RESULTS ===");
        println!(
            "TP: {}, FP: {}, FN: {}, TN: {}",
            self.tp, self.fp, self.fn_, self.tn
        );
        println!("Accuracy : {:.3}", self.accuracy);
        println!("Precision: {:.3}", self.precision);
        println!("Recall   : {:.3}", self.recall);
        println!("F1-score : {:.3}", self.f1_score);
        println!("\nArea Estimation (on {} images):", self.num_images_area_eval);
        println!("MAE  (px²): {:.2}", self.mae_px2);
        println!("RMSE (px²): {:.2}", self.rmse_px2);
        println!("MAPE  (%) : {:.2}", self.mape_percent);
        println!("==========================\n");
    }
}
