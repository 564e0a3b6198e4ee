//! # pv-eval
//!
//! Evaluation of a solar photovoltaic (PV) object-detection model on
//! COCO-annotated aerial imagery.
//!
//! The pipeline has four stages:
//! - **Annotation parsing**: each split's COCO document becomes an object-level
//!   table and an image-level table (negative images included)
//! - **Ground truth aggregation**: per-split tables are unioned in
//!   train/valid/test order
//! - **Prediction collection**: every image is sent to an [`InferenceService`]
//!   and its predictions are summarized per image
//! - **Evaluation**: ground truth and predictions are inner-joined on
//!   (split, file name) and scored with a confusion matrix and area errors
//!
//! ## Quick Start
//!
//! ```rust
//! use pv_eval::evaluator::evaluate;
//! use pv_eval::inference::{summarize_predictions, Prediction};
//! use pv_eval::loader::load_from_string;
//! use pv_eval::parser::parse_split;
//! use pv_eval::types::Split;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let coco = load_from_string(r#"{
//!     "images": [{"id": 0, "file_name": "roof.jpg", "width": 640, "height": 640}],
//!     "categories": [{"id": 1, "name": "solar-panel"}],
//!     "annotations": [{"id": 0, "image_id": 0, "category_id": 1, "bbox": [10, 10, 10, 10]}]
//! }"#)?;
//! let gt = parse_split(Split::Test, &coco)?;
//!
//! let preds = vec![summarize_predictions(
//!     Split::Test,
//!     "roof.jpg",
//!     "test/roof.jpg",
//!     &[Prediction::new(0.92, 9.0, 10.0)],
//! )];
//!
//! let evaluation = evaluate(&gt.images, &preds);
//! assert_eq!(evaluation.metrics.tp, 1);
//! assert!((evaluation.metrics.mae_px2 - 10.0).abs() < 1e-9);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluator;
pub mod frames;
pub mod ground_truth;
pub mod inference;
pub mod loader;
pub mod metrics;
pub mod parser;
pub mod pipeline;
pub mod stats;
pub mod threshold;
pub mod types;

// Re-export commonly used types and functions
pub use dataset::{DatasetRef, DatasetSource};
pub use error::{PvEvalError, Result};
pub use evaluator::{evaluate, merge, Evaluation};
pub use inference::{InferenceResult, InferenceService, Prediction};
pub use loader::{load_from_file, load_from_string};
pub use types::{
    Annotation, AnnotationAttributes, BoundingBox, Category, CocoDataset, GroundTruthRow, Image,
    MergedRow, MetricsResult, ObjectRow, PredictionRow, Split,
};
