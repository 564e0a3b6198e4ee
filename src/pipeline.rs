//! End-to-end pipeline: dataset -> ground truth -> inference -> evaluation.
//!
//! Each stage takes an explicit [`PipelineContext`] and communicates with the
//! next one through the artifacts in the output directory, so stages can also
//! be run one at a time.

use crate::config::{OutputLayout, PipelineConfig};
use crate::dataset::{image_tasks, DatasetRef, DatasetSource};
use crate::error::{PvEvalError, Result};
use crate::evaluator::{evaluate, Evaluation};
use crate::frames::{
    ground_truth_frame, ground_truth_from_frame, merged_frame, objects_frame, predictions_frame,
    predictions_from_frame, read_csv, write_csv,
};
use crate::ground_truth::{build_ground_truth, GroundTruth};
use crate::inference::{Collection, InferenceService, PredictionCollector};
use crate::loader::write_jsonl;
use crate::types::Split;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

/// Everything a stage needs to know about the current run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineContext {
    pub dataset: DatasetRef,
    pub dataset_dir: PathBuf,
    pub layout: OutputLayout,
    pub model_id: String,
    pub splits: Vec<Split>,
    pub workers: usize,
    pub confidence_threshold: f64,
}

impl PipelineContext {
    /// Validate `config`, resolve the dataset through `source` and create the
    /// output directories.
    pub fn prepare(config: &PipelineConfig, source: &dyn DatasetSource) -> Result<Self> {
        config.validate()?;
        let layout = config.layout();
        fs::create_dir_all(&layout.data_dir)?;
        fs::create_dir_all(&layout.outputs_dir)?;

        let dataset = config.dataset_ref();
        let dataset_dir = source.fetch(&dataset, &layout.data_dir)?;

        Ok(Self {
            model_id: config.model_id(),
            dataset,
            dataset_dir,
            layout,
            splits: config.splits.clone(),
            workers: config.workers,
            confidence_threshold: config.confidence_threshold,
        })
    }

    /// Context for stages that only touch existing artifacts (evaluation),
    /// without resolving the dataset.
    pub fn for_outputs(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        let layout = config.layout();
        Ok(Self {
            model_id: config.model_id(),
            dataset: config.dataset_ref(),
            dataset_dir: config
                .dataset_dir
                .clone()
                .unwrap_or_else(|| layout.data_dir.join(config.dataset_ref().export_dir_name())),
            layout,
            splits: config.splits.clone(),
            workers: config.workers,
            confidence_threshold: config.confidence_threshold,
        })
    }
}

/// Parse every split and write the object-level and image-level ground truth tables.
pub fn extract_ground_truth(ctx: &PipelineContext) -> Result<GroundTruth> {
    let ground_truth = build_ground_truth(&ctx.dataset_dir, &ctx.splits)?;

    let objects_path = ctx.layout.object_annotations();
    write_csv(&mut objects_frame(&ground_truth.objects)?, &objects_path)?;
    info!(
        path = %objects_path.display(),
        rows = ground_truth.objects.len(),
        "saved object-level annotations"
    );

    let images_path = ctx.layout.ground_truth();
    write_csv(&mut ground_truth_frame(&ground_truth.images)?, &images_path)?;
    info!(
        path = %images_path.display(),
        rows = ground_truth.images.len(),
        "saved image-level ground truth"
    );

    Ok(ground_truth)
}

/// Run inference on every image of the configured splits and write the
/// prediction summary table and the raw JSONL records.
pub fn run_inference(ctx: &PipelineContext, service: &dyn InferenceService) -> Result<Collection> {
    let tasks = image_tasks(&ctx.dataset_dir, &ctx.splits)?;
    info!(images = tasks.len(), model = %ctx.model_id, workers = ctx.workers, "running inference");

    let collection = PredictionCollector::new(service, ctx.model_id.clone())
        .with_workers(ctx.workers)
        .with_confidence_threshold(ctx.confidence_threshold)
        .collect(&tasks)?;

    let pred_path = ctx.layout.predictions();
    write_csv(&mut predictions_frame(&collection.rows)?, &pred_path)?;
    info!(path = %pred_path.display(), rows = collection.rows.len(), "saved prediction summary");

    let raw_path = ctx.layout.raw_predictions();
    write_jsonl(&raw_path, &collection.raw)?;
    info!(path = %raw_path.display(), records = collection.raw.len(), "saved raw predictions");

    Ok(collection)
}

fn require_artifact(path: PathBuf) -> Result<PathBuf> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(PvEvalError::MissingArtifact(path))
    }
}

/// Evaluate the persisted prediction table against the persisted ground truth,
/// writing the merged table and `metrics.json`.
///
/// Fails with `MissingArtifact` if either input table has not been produced yet.
pub fn evaluate_predictions(ctx: &PipelineContext) -> Result<Evaluation> {
    let gt_path = require_artifact(ctx.layout.ground_truth())?;
    let pred_path = require_artifact(ctx.layout.predictions())?;

    let ground_truth = ground_truth_from_frame(&read_csv(&gt_path)?)?;
    let predictions = predictions_from_frame(&read_csv(&pred_path)?)?;

    let evaluation = evaluate(&ground_truth, &predictions);

    let merged_path = ctx.layout.merged();
    write_csv(&mut merged_frame(&evaluation.merged)?, &merged_path)?;
    info!(path = %merged_path.display(), rows = evaluation.merged.len(), "saved merged results");

    write_metrics(&ctx.layout.metrics(), &evaluation)?;
    Ok(evaluation)
}

fn write_metrics(path: &Path, evaluation: &Evaluation) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, &evaluation.metrics)?;
    Ok(())
}

/// Output of [`run_complete`].
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub context: PipelineContext,
    pub ground_truth: GroundTruth,
    pub collection: Collection,
    pub evaluation: Evaluation,
}

/// Fetch the dataset, extract ground truth, run inference and evaluate.
pub fn run_complete(
    config: &PipelineConfig,
    source: &dyn DatasetSource,
    service: &dyn InferenceService,
) -> Result<PipelineRun> {
    info!("1. resolving dataset");
    let context = PipelineContext::prepare(config, source)?;

    info!("2. extracting ground truth");
    let ground_truth = extract_ground_truth(&context)?;

    info!("3. running inference");
    let collection = run_inference(&context, service)?;

    info!("4. evaluating predictions");
    let evaluation = evaluate_predictions(&context)?;

    info!("pipeline complete");
    Ok(PipelineRun {
        context,
        ground_truth,
        collection,
        evaluation,
    })
}
