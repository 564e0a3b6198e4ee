//! Dataset retrieval and image enumeration.

use crate::error::{PvEvalError, Result};
use crate::inference::ImageTask;
use crate::types::Split;
use std::fmt;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use zip::ZipArchive;

/// Image extensions sent to the inference service.
pub const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Identifies one exported version of a hosted dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRef {
    pub workspace: String,
    pub project: String,
    pub version: u32,
}

impl DatasetRef {
    pub fn new(workspace: impl Into<String>, project: impl Into<String>, version: u32) -> Self {
        Self {
            workspace: workspace.into(),
            project: project.into(),
            version,
        }
    }

    /// Default model id for a dataset version, `<project>/<version>`.
    pub fn default_model_id(&self) -> String {
        format!("{}/{}", self.project, self.version)
    }

    /// Directory name an export of this version unpacks into.
    pub fn export_dir_name(&self) -> String {
        format!("{}-{}", self.project, self.version)
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.workspace, self.project, self.version)
    }
}

/// Provides a local directory holding `<split>/` subdirectories with an
/// annotation document and the images.
pub trait DatasetSource {
    fn fetch(&self, dataset: &DatasetRef, data_dir: &Path) -> Result<PathBuf>;
}

/// A dataset that has already been downloaded.
///
/// With an explicit root that directory is used as is; otherwise the export is
/// looked up as `<data_dir>/<project>-<version>`.
#[derive(Debug, Clone, Default)]
pub struct LocalDatasetSource {
    root: Option<PathBuf>,
}

impl LocalDatasetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }
}

impl DatasetSource for LocalDatasetSource {
    fn fetch(&self, dataset: &DatasetRef, data_dir: &Path) -> Result<PathBuf> {
        let dir = self
            .root
            .clone()
            .unwrap_or_else(|| data_dir.join(dataset.export_dir_name()));

        if !dir.is_dir() {
            return Err(PvEvalError::DatasetNotFound(format!(
                "{} is not a directory (dataset {dataset})",
                dir.display()
            )));
        }

        info!(dataset = %dataset, path = %dir.display(), "using local dataset");
        Ok(dir)
    }
}

/// Whether `dir` exists and has at least one entry.
pub fn is_populated(dir: &Path) -> Result<bool> {
    if !dir.is_dir() {
        return Ok(false);
    }
    Ok(fs::read_dir(dir)?.next().is_some())
}

/// Unpack a zipped dataset export into `dest`, creating it if needed.
///
/// Entry paths escaping `dest` are rejected by the archive reader.
pub fn unpack_export(archive: &[u8], dest: &Path) -> Result<()> {
    let mut zip = ZipArchive::new(Cursor::new(archive))?;
    fs::create_dir_all(dest)?;
    zip.extract(dest)?;
    info!(path = %dest.display(), entries = zip.len(), "unpacked dataset export");
    Ok(())
}

/// Images of one split, sorted by path. `Ok(None)` when the split directory
/// does not exist.
pub fn enumerate_images(dataset_dir: &Path, split: Split) -> Result<Option<Vec<PathBuf>>> {
    let split_dir = dataset_dir.join(split.as_str());
    if !split_dir.is_dir() {
        return Ok(None);
    }

    let escaped_dir = glob::Pattern::escape(&split_dir.display().to_string());
    let mut paths = Vec::new();
    for ext in IMAGE_EXTENSIONS {
        let pattern = format!("{escaped_dir}/*.{ext}");
        for entry in glob::glob(&pattern)? {
            match entry {
                Ok(path) => paths.push(path),
                Err(err) => warn!(error = %err, "unreadable image entry, skipping"),
            }
        }
    }
    paths.sort();
    Ok(Some(paths))
}

/// Inference tasks for every image in `splits`, in split order.
pub fn image_tasks(dataset_dir: &Path, splits: &[Split]) -> Result<Vec<ImageTask>> {
    let mut tasks = Vec::new();
    for &split in splits {
        match enumerate_images(dataset_dir, split)? {
            Some(paths) => {
                info!(%split, images = paths.len(), "enumerated images");
                tasks.extend(paths.into_iter().map(|path| ImageTask::new(split, path)));
            }
            None => warn!(%split, "split directory missing, skipping inference"),
        }
    }
    Ok(tasks)
}
