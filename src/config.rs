//! Pipeline configuration and the on-disk artifact layout.

use crate::client::{DEFAULT_API_URL, DEFAULT_REGISTRY_URL};
use crate::dataset::DatasetRef;
use crate::error::{PvEvalError, Result};
use crate::threshold::validate_threshold;
use crate::types::Split;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Settings for one evaluation run. Every field has a default so a JSON
/// config file only needs the values that differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Hosted inference endpoint.
    pub api_url: String,
    /// Dataset registry serving version exports.
    pub registry_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub workspace: String,
    pub project: String,
    pub version: u32,
    /// Root for `data/` and `outputs/`.
    pub base_dir: PathBuf,
    /// Use this dataset directory instead of resolving the export under `data/`.
    pub dataset_dir: Option<PathBuf>,
    /// Defaults to `<project>/<version>`.
    pub model_id: Option<String>,
    /// Concurrent inference calls.
    pub workers: usize,
    pub confidence_threshold: f64,
    pub splits: Vec<Split>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            api_key: None,
            workspace: String::new(),
            project: String::new(),
            version: 1,
            base_dir: PathBuf::from("./pv_eval_run"),
            dataset_dir: None,
            model_id: None,
            workers: 1,
            confidence_threshold: 0.0,
            splits: Split::ALL.to_vec(),
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(PvEvalError::InvalidConfig(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.splits.is_empty() {
            return Err(PvEvalError::InvalidConfig(
                "at least one split is required".to_string(),
            ));
        }
        validate_threshold(self.confidence_threshold)?;
        Ok(())
    }

    pub fn dataset_ref(&self) -> DatasetRef {
        DatasetRef::new(&self.workspace, &self.project, self.version)
    }

    pub fn model_id(&self) -> String {
        self.model_id
            .clone()
            .unwrap_or_else(|| self.dataset_ref().default_model_id())
    }

    pub fn layout(&self) -> OutputLayout {
        OutputLayout::new(&self.base_dir)
    }
}

/// Paths of every artifact the pipeline reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub data_dir: PathBuf,
    pub outputs_dir: PathBuf,
}

impl OutputLayout {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        let base_dir = base_dir.as_ref();
        Self {
            data_dir: base_dir.join("data"),
            outputs_dir: base_dir.join("outputs"),
        }
    }

    pub fn object_annotations(&self) -> PathBuf {
        self.outputs_dir.join("annotations_with_geo.csv")
    }

    pub fn ground_truth(&self) -> PathBuf {
        self.outputs_dir.join("gt_image_level_all_images.csv")
    }

    pub fn predictions(&self) -> PathBuf {
        self.outputs_dir.join("pred_image_level.csv")
    }

    pub fn raw_predictions(&self) -> PathBuf {
        self.outputs_dir.join("pred_raw.jsonl")
    }

    pub fn merged(&self) -> PathBuf {
        self.outputs_dir.join("gt_pred_image_level_merged_full.csv")
    }

    pub fn metrics(&self) -> PathBuf {
        self.outputs_dir.join("metrics.json")
    }
}
