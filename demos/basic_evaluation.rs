//! Basic evaluation walkthrough: parse a COCO split, summarize predictions and score them.

use pv_eval::evaluator::evaluate;
use pv_eval::inference::{summarize_predictions, Prediction};
use pv_eval::parser::parse_split;
use pv_eval::{load_from_string, Split};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== PV Detection Evaluation Example ===\n");

    let annotations = r#"{
        "images": [
            {"id": 0, "file_name": "tile_a.jpg", "width": 640, "height": 640},
            {"id": 1, "file_name": "tile_b.jpg", "width": 640, "height": 640},
            {"id": 2, "file_name": "tile_c.jpg", "width": 640, "height": 640}
        ],
        "annotations": [
            {"id": 0, "image_id": 0, "category_id": 1, "bbox": [5, 5, 10, 10]},
            {"id": 1, "image_id": 2, "category_id": 1, "bbox": [40, 40, 20, 10],
             "attributes": {"area_m2": 18.5}}
        ],
        "categories": [{"id": 1, "name": "solar-panel"}]
    }"#;

    println!("1. Parsing ground truth");
    let dataset = load_from_string(annotations)?;
    let parsed = parse_split(Split::Test, &dataset)?;
    for row in &parsed.images {
        println!(
            "   {}: {} boxes, {:.0} px², solar={}",
            row.file_name, row.num_boxes_gt, row.area_px_gt, row.has_solar_gt
        );
    }
    println!();

    println!("2. Summarizing predictions");
    let detections = [
        ("tile_a.jpg", vec![Prediction::new(0.82, 9.0, 10.0)]),
        ("tile_b.jpg", vec![]),
        ("tile_c.jpg", vec![]),
    ];
    let predictions: Vec<_> = detections
        .iter()
        .map(|(file, preds)| {
            summarize_predictions(Split::Test, file, &format!("test/{file}"), preds)
        })
        .collect();
    for row in &predictions {
        println!("   {}: {} preds, {:.0} px²", row.file_name, row.num_preds, row.area_px_pred);
    }

    println!("\n3. Evaluating");
    let evaluation = evaluate(&parsed.images, &predictions);
    evaluation.metrics.print_summary();

    Ok(())
}
