//! Prediction collection: per-image inference calls summarized into prediction rows.
//!
//! The inference backend is a capability trait so that the HTTP client, the
//! replay service and test fakes are interchangeable.

use crate::error::Result;
use crate::stats::CollectionStats;
use crate::threshold::filter_by_confidence;
use crate::types::{PredictionRow, Split};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Remote (or recorded) object detector.
pub trait InferenceService: Send + Sync {
    /// Run the model `model_id` on one image.
    fn infer(&self, image_path: &Path, model_id: &str) -> Result<InferenceResult>;
}

/// One predicted object. Fields the pipeline does not interpret (class,
/// center, detection id, ...) are kept in `extra` so raw records round-trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Prediction {
    pub fn new(confidence: f64, width: f64, height: f64) -> Self {
        Self {
            confidence,
            width,
            height,
            extra: Map::new(),
        }
    }

    /// Box area in px².
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// Response of the inference service for one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    #[serde(default)]
    pub predictions: Vec<Prediction>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InferenceResult {
    pub fn from_predictions(predictions: Vec<Prediction>) -> Self {
        Self {
            predictions,
            extra: Map::new(),
        }
    }
}

/// Audit record written to the raw predictions JSONL file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInferenceRecord {
    pub split: Split,
    pub file_name: String,
    pub image_path: String,
    pub result: InferenceResult,
}

/// An image waiting for inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTask {
    pub split: Split,
    pub path: PathBuf,
}

impl ImageTask {
    pub fn new(split: Split, path: impl Into<PathBuf>) -> Self {
        Self {
            split,
            path: path.into(),
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Summarize one image's predictions into a prediction row.
pub fn summarize_predictions(
    split: Split,
    file_name: &str,
    image_path: &str,
    predictions: &[Prediction],
) -> PredictionRow {
    let num_preds = predictions.len();
    let max_conf_pred = predictions
        .iter()
        .map(|p| p.confidence)
        .fold(0.0f64, f64::max);
    let area_px_pred = predictions.iter().map(Prediction::area).sum();

    PredictionRow {
        split,
        file_name: file_name.to_string(),
        image_path: image_path.to_string(),
        num_preds,
        has_solar_pred: num_preds > 0,
        max_conf_pred,
        area_px_pred,
    }
}

/// Output of a collection run.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    pub rows: Vec<PredictionRow>,
    pub raw: Vec<RawInferenceRecord>,
    pub stats: CollectionStats,
}

/// Runs inference over a batch of images and summarizes the results.
pub struct PredictionCollector<'a> {
    service: &'a dyn InferenceService,
    model_id: String,
    confidence_threshold: f64,
    workers: usize,
}

impl<'a> PredictionCollector<'a> {
    pub fn new(service: &'a dyn InferenceService, model_id: impl Into<String>) -> Self {
        Self {
            service,
            model_id: model_id.into(),
            confidence_threshold: 0.0,
            workers: 1,
        }
    }

    /// Drop predictions scoring below `threshold` before summarizing.
    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Number of concurrent inference calls; 1 runs strictly sequentially.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Infer every task. Failed images are logged and skipped; output keeps
    /// task order regardless of the worker count.
    pub fn collect(&self, tasks: &[ImageTask]) -> Result<Collection> {
        let outcomes: Vec<Result<InferenceResult>> = if self.workers <= 1 || tasks.len() <= 1 {
            tasks
                .iter()
                .map(|task| self.service.infer(&task.path, &self.model_id))
                .collect()
        } else {
            self.infer_parallel(tasks)?
        };

        let mut collection = Collection::default();
        for (task, outcome) in tasks.iter().zip(outcomes) {
            collection.stats.add_image();
            let image_path = task.path.display().to_string();

            let result = match outcome {
                Ok(result) => result,
                Err(err) => {
                    warn!(image = %image_path, error = %err, "inference failed, skipping image");
                    collection.stats.record_failure();
                    continue;
                }
            };

            let kept = filter_by_confidence(&result.predictions, self.confidence_threshold)?;
            collection
                .stats
                .record_predictions(kept.len(), result.predictions.len() - kept.len());

            let file_name = task.file_name();
            debug!(image = %image_path, predictions = kept.len(), "inferred image");
            collection.rows.push(summarize_predictions(
                task.split,
                &file_name,
                &image_path,
                &kept,
            ));
            collection.raw.push(RawInferenceRecord {
                split: task.split,
                file_name,
                image_path,
                result,
            });
        }

        info!(
            images = collection.stats.images_attempted,
            failed = collection.stats.images_failed,
            "prediction collection finished"
        );
        Ok(collection)
    }

    /// Run the calls on a dedicated pool of `workers` threads. The indexed
    /// collect returns results in task order once every call has finished.
    fn infer_parallel(&self, tasks: &[ImageTask]) -> Result<Vec<Result<InferenceResult>>> {
        let pool = ThreadPoolBuilder::new().num_threads(self.workers).build()?;
        Ok(pool.install(|| {
            tasks
                .par_iter()
                .map(|task| self.service.infer(&task.path, &self.model_id))
                .collect()
        }))
    }
}
