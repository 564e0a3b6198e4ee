//! Error types for the pv-eval library.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for pv-eval operations.
pub type Result<T> = std::result::Result<T, PvEvalError>;

/// Error types that can occur while building ground truth, collecting
/// predictions or evaluating them.
#[derive(Error, Debug)]
pub enum PvEvalError {
    /// Error during JSON parsing or serialization.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error during I/O operations.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error raised by the dataframe layer.
    #[error("DataFrame error: {0}")]
    PolarsError(#[from] polars::error::PolarsError),

    /// Transport error talking to the inference service.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Malformed image glob pattern.
    #[error("Glob pattern error: {0}")]
    GlobError(#[from] glob::PatternError),

    /// The inference worker pool could not be started.
    #[error("Thread pool error: {0}")]
    ThreadPoolError(#[from] rayon::ThreadPoolBuildError),

    /// A downloaded dataset export could not be unpacked.
    #[error("Archive error: {0}")]
    ArchiveError(#[from] zip::result::ZipError),

    /// Invalid annotation data.
    #[error("Invalid annotation: {0}")]
    InvalidAnnotation(String),

    /// Invalid bounding box coordinates.
    #[error("Invalid bounding box: {0}")]
    InvalidBoundingBox(String),

    /// A required column is missing from a table.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// A table has the right columns but unusable contents.
    #[error("Invalid DataFrame: {0}")]
    InvalidDataFrame(String),

    /// A pipeline stage ran before the artifact it consumes was produced.
    #[error("Missing artifact {}: run ground-truth extraction and inference first", .0.display())]
    MissingArtifact(PathBuf),

    /// The dataset directory could not be resolved.
    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    /// The inference service answered with an error or an unreadable body.
    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    /// Invalid confidence threshold.
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),

    /// Invalid pipeline configuration.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}
