use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use pv_eval::client::{HttpDatasetSource, HttpInferenceClient, ReplayInferenceService};
use pv_eval::config::PipelineConfig;
use pv_eval::dataset::{DatasetSource, LocalDatasetSource};
use pv_eval::inference::InferenceService;
use pv_eval::pipeline::{self, PipelineContext};
use pv_eval::types::Split;
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter};

/// Evaluate a solar PV detection model against COCO ground truth.
#[derive(Parser, Debug)]
#[command(name = "pv-eval", version)]
struct Cli {
    /// JSON config file; flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    /// Default log level when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Overrides {
    /// Inference API key.
    #[arg(long, env = "ROBOFLOW_API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Dataset registry used to download exports.
    #[arg(long, global = true)]
    registry_url: Option<String>,

    #[arg(long, global = true)]
    workspace: Option<String>,

    #[arg(long, global = true)]
    project: Option<String>,

    /// Dataset version number.
    #[arg(long = "dataset-version", global = true)]
    dataset_version: Option<u32>,

    /// Root directory for data/ and outputs/.
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Already-downloaded dataset directory containing the split folders.
    #[arg(long, global = true)]
    dataset_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    model_id: Option<String>,

    /// Concurrent inference calls.
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Drop predictions below this confidence.
    #[arg(long, global = true)]
    confidence_threshold: Option<f64>,

    /// Splits to process (repeatable).
    #[arg(long = "split", global = true, value_parser = parse_split)]
    splits: Vec<Split>,

    /// Replay responses from a raw predictions JSONL file instead of calling the API.
    #[arg(long, global = true)]
    replay: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ground truth, inference and evaluation in one go.
    Run,
    /// Extract object-level and image-level ground truth.
    GroundTruth,
    /// Run inference on every image.
    Infer,
    /// Evaluate existing ground truth and prediction tables.
    Evaluate,
}

fn parse_split(value: &str) -> Result<Split, String> {
    value.parse().map_err(|err: pv_eval::PvEvalError| err.to_string())
}

impl Overrides {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(v) = &self.api_key {
            config.api_key = Some(v.clone());
        }
        if let Some(v) = &self.api_url {
            config.api_url = v.clone();
        }
        if let Some(v) = &self.registry_url {
            config.registry_url = v.clone();
        }
        if let Some(v) = &self.workspace {
            config.workspace = v.clone();
        }
        if let Some(v) = &self.project {
            config.project = v.clone();
        }
        if let Some(v) = self.dataset_version {
            config.version = v;
        }
        if let Some(v) = &self.base_dir {
            config.base_dir = v.clone();
        }
        if let Some(v) = &self.dataset_dir {
            config.dataset_dir = Some(v.clone());
        }
        if let Some(v) = &self.model_id {
            config.model_id = Some(v.clone());
        }
        if let Some(v) = self.workers {
            config.workers = v;
        }
        if let Some(v) = self.confidence_threshold {
            config.confidence_threshold = v;
        }
        if !self.splits.is_empty() {
            config.splits = self.splits.clone();
        }
    }
}

fn inference_service(
    config: &PipelineConfig,
    replay: Option<&PathBuf>,
) -> anyhow::Result<Box<dyn InferenceService>> {
    if let Some(path) = replay {
        let service = ReplayInferenceService::from_file(path)
            .with_context(|| format!("failed to load replay file {}", path.display()))?;
        tracing::info!(records = service.len(), "replaying recorded inference results");
        return Ok(Box::new(service));
    }

    let Some(api_key) = &config.api_key else {
        bail!("an API key is required for inference (set --api-key or ROBOFLOW_API_KEY)");
    };
    let client = HttpInferenceClient::new(&config.api_url, api_key)?;
    Ok(Box::new(client))
}

/// An explicit dataset directory wins; otherwise the export is downloaded
/// when an API key is available, or looked up under `data/`.
fn dataset_source(config: &PipelineConfig) -> anyhow::Result<Box<dyn DatasetSource>> {
    if let Some(dir) = &config.dataset_dir {
        return Ok(Box::new(LocalDatasetSource::with_root(dir)));
    }
    match &config.api_key {
        Some(api_key) => Ok(Box::new(HttpDatasetSource::new(&config.registry_url, api_key)?)),
        None => Ok(Box::new(LocalDatasetSource::new())),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // setup tracing
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true).compact();
    let filter_layer = EnvFilter::builder()
        .with_default_directive(cli.log_level.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load_from_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    cli.overrides.apply(&mut config);
    config.validate().context("invalid configuration")?;

    match cli.command {
        Command::Run => {
            let service = inference_service(&config, cli.overrides.replay.as_ref())?;
            let source = dataset_source(&config)?;
            let run = pipeline::run_complete(&config, source.as_ref(), service.as_ref())?;
            run.collection.stats.print_summary();
            run.evaluation.metrics.print_summary();
        }
        Command::GroundTruth => {
            let ctx = PipelineContext::prepare(&config, dataset_source(&config)?.as_ref())?;
            let gt = pipeline::extract_ground_truth(&ctx)?;
            let (positive, negative) = gt.solar_distribution();
            println!("Images with solar: {positive}, without: {negative}");
        }
        Command::Infer => {
            let service = inference_service(&config, cli.overrides.replay.as_ref())?;
            let ctx = PipelineContext::prepare(&config, dataset_source(&config)?.as_ref())?;
            let collection = pipeline::run_inference(&ctx, service.as_ref())?;
            collection.stats.print_summary();
        }
        Command::Evaluate => {
            let ctx = PipelineContext::for_outputs(&config)?;
            let evaluation = pipeline::evaluate_predictions(&ctx)?;
            evaluation.metrics.print_summary();
            println!("Merged results saved to: {}", ctx.layout.merged().display());
        }
    }

    Ok(())
}
