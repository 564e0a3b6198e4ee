//! Evaluation of image-level predictions against image-level ground truth.

use crate::metrics::{calculate_area_errors, needs_area_scoring, ConfusionMatrix};
use crate::types::{GroundTruthRow, MergedRow, MetricsResult, PredictionRow, Split};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// Merged table plus the metrics computed from it.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub merged: Vec<MergedRow>,
    pub metrics: MetricsResult,
    /// Ground truth images without a prediction row (e.g. failed inference).
    pub unmatched_ground_truth: usize,
    /// Prediction rows without a ground truth image.
    pub unmatched_predictions: usize,
}

/// Inner join of ground truth and predictions on (split, file_name).
///
/// Output follows ground truth order. Images present in only one table are
/// dropped: they cannot be scored. If predictions contain duplicate keys the
/// first one wins.
pub fn merge(ground_truth: &[GroundTruthRow], predictions: &[PredictionRow]) -> Vec<MergedRow> {
    let mut by_key: HashMap<(Split, &str), &PredictionRow> =
        HashMap::with_capacity(predictions.len());
    for pred in predictions {
        by_key
            .entry((pred.split, pred.file_name.as_str()))
            .or_insert(pred);
    }

    ground_truth
        .iter()
        .filter_map(|gt| {
            by_key
                .get(&(gt.split, gt.file_name.as_str()))
                .map(|pred| MergedRow {
                    ground_truth: gt.clone(),
                    prediction: (*pred).clone(),
                })
        })
        .collect()
}

/// Compute classification and area metrics over already merged rows.
pub fn compute_metrics(merged: &[MergedRow]) -> MetricsResult {
    let cm = ConfusionMatrix::from_labels(
        merged
            .iter()
            .map(|row| (row.ground_truth.has_solar_gt, row.prediction.has_solar_pred)),
    );
    let area = calculate_area_errors(
        merged
            .iter()
            .map(|row| (row.ground_truth.area_px_gt, row.prediction.area_px_pred)),
    );

    debug_assert_eq!(cm.total(), merged.len());
    debug_assert_eq!(
        area.count,
        merged
            .iter()
            .filter(|row| {
                needs_area_scoring(row.ground_truth.area_px_gt, row.prediction.area_px_pred)
            })
            .count()
    );

    MetricsResult {
        tp: cm.tp,
        fp: cm.fp,
        fn_: cm.fn_,
        tn: cm.tn,
        accuracy: cm.accuracy(),
        precision: cm.precision(),
        recall: cm.recall(),
        f1_score: cm.f1(),
        mae_px2: area.mae,
        rmse_px2: area.rmse,
        mape_percent: area.mape,
        num_images_area_eval: area.count,
        total_images: merged.len(),
    }
}

/// Join ground truth with predictions and score the result.
///
/// # Example
///
/// ```
/// use pv_eval::evaluator::evaluate;
/// use pv_eval::types::{GroundTruthRow, PredictionRow, Split};
///
/// let gt = vec![GroundTruthRow {
///     split: Split::Test,
///     file_name: "a.jpg".into(),
///     image_id: 0,
///     img_width_px: 640,
///     img_height_px: 640,
///     num_boxes_gt: 1,
///     area_px_gt: 100.0,
///     area_m2_gt: 0.0,
///     has_solar_gt: true,
/// }];
/// let preds = vec![PredictionRow {
///     split: Split::Test,
///     file_name: "a.jpg".into(),
///     image_path: "test/a.jpg".into(),
///     num_preds: 1,
///     has_solar_pred: true,
///     max_conf_pred: 0.8,
///     area_px_pred: 90.0,
/// }];
///
/// let evaluation = evaluate(&gt, &preds);
/// assert_eq!(evaluation.metrics.tp, 1);
/// assert!((evaluation.metrics.mae_px2 - 10.0).abs() < 1e-9);
/// ```
pub fn evaluate(ground_truth: &[GroundTruthRow], predictions: &[PredictionRow]) -> Evaluation {
    let merged = merge(ground_truth, predictions);
    let metrics = compute_metrics(&merged);

    let unmatched_ground_truth = ground_truth.len().saturating_sub(merged.len());
    let gt_keys: HashSet<(Split, &str)> = ground_truth
        .iter()
        .map(|gt| (gt.split, gt.file_name.as_str()))
        .collect();
    let unmatched_predictions = predictions
        .iter()
        .filter(|pred| !gt_keys.contains(&(pred.split, pred.file_name.as_str())))
        .count();
    if unmatched_ground_truth > 0 {
        warn!(
            count = unmatched_ground_truth,
            "ground truth images without a prediction row are excluded from scoring"
        );
    }
    if unmatched_predictions > 0 {
        warn!(
            count = unmatched_predictions,
            "prediction rows without ground truth are excluded from scoring"
        );
    }
    info!(
        merged = merged.len(),
        area_scored = metrics.num_images_area_eval,
        "evaluation finished"
    );

    Evaluation {
        merged,
        metrics,
        unmatched_ground_truth,
        unmatched_predictions,
    }
}
