//! Metrics calculation modules for image-level PV evaluation.

pub mod area;
pub mod classification;

pub use area::{calculate_area_errors, needs_area_scoring, AreaErrors};
pub use classification::{
    calculate_accuracy, calculate_f1, calculate_precision, calculate_recall, ConfusionMatrix,
    EPSILON,
};
