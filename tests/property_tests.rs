//! Property-based tests for merging, metrics and annotation parsing.

use proptest::prelude::*;
use pv_eval::evaluator::{evaluate, merge};
use pv_eval::inference::Prediction;
use pv_eval::metrics::{calculate_area_errors, needs_area_scoring};
use pv_eval::parser::parse_split;
use pv_eval::threshold::filter_by_confidence;
use pv_eval::types::{Annotation, CocoDataset, GroundTruthRow, Image, PredictionRow, Split};

fn split_strategy() -> impl Strategy<Value = Split> {
    prop_oneof![Just(Split::Train), Just(Split::Valid), Just(Split::Test)]
}

fn area_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![Just(0.0), 1.0f64..10_000.0]
}

/// Ground truth rows with unique (split, file_name) keys drawn from a small pool.
fn ground_truth_strategy() -> impl Strategy<Value = Vec<GroundTruthRow>> {
    prop::collection::btree_map((split_strategy(), 0u8..20), area_strategy(), 0..30).prop_map(
        |entries| {
            entries
                .into_iter()
                .map(|((split, n), area)| GroundTruthRow {
                    split,
                    file_name: format!("img_{n}.jpg"),
                    image_id: u64::from(n),
                    img_width_px: 640,
                    img_height_px: 640,
                    num_boxes_gt: usize::from(area > 0.0),
                    area_px_gt: area,
                    area_m2_gt: 0.0,
                    has_solar_gt: area > 0.0,
                })
                .collect()
        },
    )
}

fn predictions_strategy() -> impl Strategy<Value = Vec<PredictionRow>> {
    prop::collection::btree_map((split_strategy(), 0u8..20), area_strategy(), 0..30).prop_map(
        |entries| {
            entries
                .into_iter()
                .map(|((split, n), area)| PredictionRow {
                    split,
                    file_name: format!("img_{n}.jpg"),
                    image_path: format!("{split}/img_{n}.jpg"),
                    num_preds: usize::from(area > 0.0),
                    has_solar_pred: area > 0.0,
                    max_conf_pred: if area > 0.0 { 0.6 } else { 0.0 },
                    area_px_pred: area,
                })
                .collect()
        },
    )
}

proptest! {
    #[test]
    fn test_ratios_within_unit_interval(
        gts in ground_truth_strategy(),
        preds in predictions_strategy(),
    ) {
        let m = evaluate(&gts, &preds).metrics;
        for value in [m.accuracy, m.precision, m.recall, m.f1_score] {
            prop_assert!((0.0..=1.0).contains(&value), "value out of range: {}", value);
        }
    }

    #[test]
    fn test_confusion_counts_cover_merged_rows(
        gts in ground_truth_strategy(),
        preds in predictions_strategy(),
    ) {
        let evaluation = evaluate(&gts, &preds);
        let m = &evaluation.metrics;
        prop_assert_eq!(m.tp + m.fp + m.fn_ + m.tn, evaluation.merged.len());
        prop_assert_eq!(m.total_images, evaluation.merged.len());
        prop_assert_eq!(
            evaluation.merged.len() + evaluation.unmatched_ground_truth,
            gts.len()
        );
    }

    #[test]
    fn test_merge_only_keeps_keys_in_both_tables(
        gts in ground_truth_strategy(),
        preds in predictions_strategy(),
    ) {
        let merged = merge(&gts, &preds);
        for row in &merged {
            prop_assert_eq!(row.ground_truth.split, row.prediction.split);
            prop_assert_eq!(&row.ground_truth.file_name, &row.prediction.file_name);
        }
        let expected = gts
            .iter()
            .filter(|g| preds.iter().any(|p| p.split == g.split && p.file_name == g.file_name))
            .count();
        prop_assert_eq!(merged.len(), expected);
    }

    #[test]
    fn test_area_scoring_set(
        pairs in prop::collection::vec((area_strategy(), area_strategy()), 0..50),
    ) {
        let errors = calculate_area_errors(pairs.iter().copied());
        let scored = pairs.iter().filter(|(g, p)| needs_area_scoring(*g, *p)).count();
        prop_assert_eq!(errors.count, scored);

        if scored == 0 {
            prop_assert!(errors.mae.is_nan());
        } else {
            prop_assert!(errors.mae >= 0.0);
            // RMSE never undercuts MAE.
            prop_assert!(errors.rmse + 1e-6 * errors.mae.max(1.0) >= errors.mae);
        }

        if pairs.iter().any(|(g, _)| *g > 0.0) {
            prop_assert!(errors.mape.is_finite());
        } else {
            prop_assert!(errors.mape.is_nan());
        }
    }

    #[test]
    fn test_object_area_falls_back_to_box(
        w in 0.0f64..500.0,
        h in 0.0f64..500.0,
        category_id in 0u64..1000,
    ) {
        let dataset = CocoDataset {
            images: vec![Image { id: 1, file_name: "a.jpg".into(), width: 640, height: 640 }],
            annotations: vec![Annotation {
                id: 1,
                image_id: 1,
                category_id,
                bbox: vec![1.0, 2.0, w, h],
                area: None,
                attributes: None,
            }],
            categories: vec![],
        };

        let parsed = parse_split(Split::Train, &dataset).unwrap();
        let obj = &parsed.objects[0];
        prop_assert_eq!(obj.area_px, w * h);
        prop_assert_eq!(obj.x_max_px, 1.0 + w);
        prop_assert_eq!(obj.y_max_px, 2.0 + h);
        prop_assert_eq!(&obj.category_name, &format!("class_{category_id}"));
        prop_assert!(parsed.images[0].has_solar_gt);
    }

    #[test]
    fn test_confidence_filter_keeps_exactly_qualifying(
        confs in prop::collection::vec(0.0f64..=1.0, 0..40),
        threshold in 0.0f64..=1.0,
    ) {
        let preds: Vec<_> = confs.iter().map(|&c| Prediction::new(c, 1.0, 1.0)).collect();
        let kept = filter_by_confidence(&preds, threshold).unwrap();
        prop_assert_eq!(kept.len(), confs.iter().filter(|&&c| c >= threshold).count());
        prop_assert!(kept.iter().all(|p| p.confidence >= threshold));
    }
}
