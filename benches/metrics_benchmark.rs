use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pv_eval::evaluator::evaluate;
use pv_eval::inference::{summarize_predictions, Prediction};
use pv_eval::metrics::{
    calculate_accuracy, calculate_area_errors, calculate_f1, calculate_precision,
    calculate_recall, ConfusionMatrix,
};
use pv_eval::parser::parse_split;
use pv_eval::types::{Annotation, CocoDataset, GroundTruthRow, Image, PredictionRow, Split};

fn synthetic_tables(n: usize) -> (Vec<GroundTruthRow>, Vec<PredictionRow>) {
    let gts = (0..n)
        .map(|i| {
            let area = if i % 3 == 0 { 0.0 } else { (i % 97) as f64 * 10.0 };
            GroundTruthRow {
                split: Split::ALL[i % 3],
                file_name: format!("tile_{i:06}.jpg"),
                image_id: i as u64,
                img_width_px: 640,
                img_height_px: 640,
                num_boxes_gt: usize::from(area > 0.0),
                area_px_gt: area,
                area_m2_gt: 0.0,
                has_solar_gt: area > 0.0,
            }
        })
        .collect();

    // Reverse order so the join cannot rely on aligned inputs.
    let preds = (0..n)
        .rev()
        .map(|i| {
            let area = if i % 5 == 0 { 0.0 } else { (i % 89) as f64 * 11.0 };
            PredictionRow {
                split: Split::ALL[i % 3],
                file_name: format!("tile_{i:06}.jpg"),
                image_path: format!("{}/tile_{i:06}.jpg", Split::ALL[i % 3]),
                num_preds: usize::from(area > 0.0),
                has_solar_pred: area > 0.0,
                max_conf_pred: 0.5,
                area_px_pred: area,
            }
        })
        .collect();

    (gts, preds)
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");

    for size in [100, 1_000, 10_000].iter() {
        let (gts, preds) = synthetic_tables(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| evaluate(black_box(&gts), black_box(&preds)));
        });
    }
    group.finish();
}

fn bench_area_errors(c: &mut Criterion) {
    let pairs: Vec<(f64, f64)> = (0..10_000)
        .map(|i| ((i % 50) as f64 * 4.0, (i % 40) as f64 * 5.0))
        .collect();

    c.bench_function("area_errors_10k", |b| {
        b.iter(|| calculate_area_errors(black_box(pairs.iter().copied())));
    });
}

fn bench_classification(c: &mut Criterion) {
    let labels: Vec<(bool, bool)> = (0..10_000).map(|i| (i % 3 == 0, i % 4 == 0)).collect();

    c.bench_function("confusion_matrix_10k", |b| {
        b.iter(|| ConfusionMatrix::from_labels(black_box(labels.iter().copied())));
    });

    c.bench_function("precision_calculation", |b| {
        b.iter(|| calculate_precision(black_box(80), black_box(20)));
    });

    c.bench_function("recall_calculation", |b| {
        b.iter(|| calculate_recall(black_box(80), black_box(20)));
    });

    c.bench_function("f1_calculation", |b| {
        b.iter(|| calculate_f1(black_box(0.8), black_box(0.7)));
    });

    c.bench_function("accuracy_calculation", |b| {
        b.iter(|| calculate_accuracy(black_box(80), black_box(15), black_box(120)));
    });
}

fn bench_parse_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_split");

    for num_images in [100, 1_000].iter() {
        let images: Vec<Image> = (0..*num_images)
            .map(|i| Image {
                id: i as u64,
                file_name: format!("tile_{i}.jpg"),
                width: 640,
                height: 640,
            })
            .collect();
        let annotations: Vec<Annotation> = (0..*num_images * 2)
            .filter(|i| i % 7 != 0)
            .map(|i| Annotation {
                id: i as u64,
                image_id: (i / 2) as u64,
                category_id: 1,
                bbox: vec![10.0, 10.0, 20.0 + (i % 9) as f64, 15.0],
                area: None,
                attributes: None,
            })
            .collect();
        let dataset = CocoDataset {
            images,
            annotations,
            categories: vec![],
        };

        group.bench_with_input(BenchmarkId::from_parameter(num_images), num_images, |b, _| {
            b.iter(|| parse_split(Split::Train, black_box(&dataset)));
        });
    }
    group.finish();
}

fn bench_summarize_predictions(c: &mut Criterion) {
    let predictions: Vec<Prediction> = (0..200)
        .map(|i| Prediction::new((i % 100) as f64 / 100.0, 12.0, 8.0))
        .collect();

    c.bench_function("summarize_predictions_200", |b| {
        b.iter(|| {
            summarize_predictions(
                Split::Test,
                "tile_0.jpg",
                "data/test/tile_0.jpg",
                black_box(&predictions),
            )
        });
    });
}

criterion_group!(
    benches,
    bench_evaluate,
    bench_area_errors,
    bench_classification,
    bench_parse_split,
    bench_summarize_predictions,
);
criterion_main!(benches);
