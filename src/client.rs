//! Clients for the hosting service: dataset export download, hosted inference,
//! and a replay of recorded inference responses.

use crate::dataset::{is_populated, unpack_export, DatasetRef, DatasetSource};
use crate::error::{PvEvalError, Result};
use crate::inference::{InferenceResult, InferenceService, RawInferenceRecord};
use crate::loader::read_jsonl;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_API_URL: &str = "https://serverless.roboflow.com";
pub const DEFAULT_REGISTRY_URL: &str = "https://api.roboflow.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);
const EXPORT_FORMAT: &str = "coco";

/// Downloads COCO exports of hosted dataset versions.
///
/// The export endpoint `<registry_url>/<workspace>/<project>/<version>/coco`
/// answers with a link to a zip archive, which is unpacked into
/// `<data_dir>/<project>-<version>`. An already unpacked export is reused.
pub struct HttpDatasetSource {
    client: Client,
    registry_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ExportResponse {
    export: ExportLink,
}

#[derive(Debug, Deserialize)]
struct ExportLink {
    link: String,
}

impl HttpDatasetSource {
    pub fn new(registry_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(DOWNLOAD_TIMEOUT).build()?;
        Ok(Self {
            client,
            registry_url: registry_url.into(),
            api_key: api_key.into(),
        })
    }

    /// URL of the export description for `dataset`.
    pub fn export_url(&self, dataset: &DatasetRef) -> String {
        format!(
            "{}/{}/{}/{}/{EXPORT_FORMAT}",
            self.registry_url.trim_end_matches('/'),
            dataset.workspace,
            dataset.project,
            dataset.version
        )
    }

    fn export_link(&self, dataset: &DatasetRef) -> Result<String> {
        let url = self.export_url(dataset);
        debug!(%url, "requesting dataset export");
        let response = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .send()?;

        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(PvEvalError::DatasetNotFound(format!(
                "export of {dataset} returned {status}: {text}"
            )));
        }

        let export: ExportResponse = serde_json::from_str(&text)?;
        Ok(export.export.link)
    }

    fn download(&self, link: &str) -> Result<Vec<u8>> {
        let response = self.client.get(link).send()?.error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }
}

impl fmt::Debug for HttpDatasetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpDatasetSource")
            .field("registry_url", &self.registry_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl DatasetSource for HttpDatasetSource {
    fn fetch(&self, dataset: &DatasetRef, data_dir: &Path) -> Result<PathBuf> {
        let dir = data_dir.join(dataset.export_dir_name());
        if is_populated(&dir)? {
            info!(dataset = %dataset, path = %dir.display(), "reusing downloaded dataset");
            return Ok(dir);
        }

        let link = self.export_link(dataset)?;
        info!(dataset = %dataset, "downloading dataset export");
        let archive = self.download(&link)?;
        unpack_export(&archive, &dir)?;
        info!(path = %dir.display(), bytes = archive.len(), "dataset downloaded");
        Ok(dir)
    }
}

/// Client for a hosted detection endpoint.
///
/// Each call POSTs the base64-encoded image to `<api_url>/<model_id>` with the
/// API key as a query parameter, and parses the JSON response.
pub struct HttpInferenceClient {
    client: Client,
    api_url: String,
    api_key: String,
}

impl HttpInferenceClient {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
        })
    }

    /// URL the image for `model_id` is posted to.
    pub fn endpoint(&self, model_id: &str) -> String {
        format!(
            "{}/{}",
            self.api_url.trim_end_matches('/'),
            model_id.trim_matches('/')
        )
    }
}

impl fmt::Debug for HttpInferenceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpInferenceClient")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl InferenceService for HttpInferenceClient {
    fn infer(&self, image_path: &Path, model_id: &str) -> Result<InferenceResult> {
        let image = fs::read(image_path)?;
        let body = STANDARD.encode(image);

        let url = self.endpoint(model_id);
        debug!(%url, image = %image_path.display(), "posting image");
        let response = self
            .client
            .post(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()?;

        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(PvEvalError::InferenceFailed(format!(
                "{} returned {status}: {text}",
                image_path.display()
            )));
        }

        Ok(serde_json::from_str(&text)?)
    }
}

/// Answers inference calls from previously recorded raw results.
///
/// Images are matched on their split directory and file name, so a recording
/// can be replayed against the same dataset unpacked elsewhere.
#[derive(Debug, Clone, Default)]
pub struct ReplayInferenceService {
    results: HashMap<(String, String), InferenceResult>,
}

impl ReplayInferenceService {
    pub fn from_records(records: Vec<RawInferenceRecord>) -> Self {
        let results = records
            .into_iter()
            .map(|record| ((record.split.to_string(), record.file_name), record.result))
            .collect();
        Self { results }
    }

    /// Load a raw predictions JSONL file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let records: Vec<RawInferenceRecord> = read_jsonl(path)?;
        Ok(Self::from_records(records))
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

fn replay_key(image_path: &Path) -> Option<(String, String)> {
    let file_name = image_path.file_name()?.to_string_lossy().into_owned();
    let split = image_path.parent()?.file_name()?.to_string_lossy().into_owned();
    Some((split, file_name))
}

impl InferenceService for ReplayInferenceService {
    fn infer(&self, image_path: &Path, _model_id: &str) -> Result<InferenceResult> {
        replay_key(image_path)
            .and_then(|key| self.results.get(&key))
            .cloned()
            .ok_or_else(|| {
                PvEvalError::InferenceFailed(format!(
                    "no recorded result for {}",
                    image_path.display()
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::Prediction;
    use crate::types::Split;

    #[test]
    fn test_endpoint_joins_cleanly() {
        let client = HttpInferenceClient::new("https://example.test/", "secret").unwrap();
        assert_eq!(client.endpoint("/pv-project/8"), "https://example.test/pv-project/8");
        assert!(!format!("{client:?}").contains("secret"));
    }

    #[test]
    fn test_replay_matches_split_and_file() {
        let service = ReplayInferenceService::from_records(vec![RawInferenceRecord {
            split: Split::Valid,
            file_name: "a.jpg".to_string(),
            image_path: "/old/location/valid/a.jpg".to_string(),
            result: InferenceResult::from_predictions(vec![Prediction::new(0.8, 3.0, 3.0)]),
        }]);

        let hit = service.infer(Path::new("/new/root/valid/a.jpg"), "m/1").unwrap();
        assert_eq!(hit.predictions.len(), 1);

        let miss = service.infer(Path::new("/new/root/test/a.jpg"), "m/1");
        assert!(matches!(miss, Err(PvEvalError::InferenceFailed(_))));
    }

    #[test]
    fn test_export_url_uses_workspace() {
        let source = HttpDatasetSource::new("https://registry.test/", "secret").unwrap();
        let dataset = DatasetRef::new("solar-ws", "pv-project", 8);
        assert_eq!(
            source.export_url(&dataset),
            "https://registry.test/solar-ws/pv-project/8/coco"
        );
        assert!(!format!("{source:?}").contains("secret"));
    }

    #[test]
    fn test_downloaded_export_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = DatasetRef::new("ws", "pv-project", 3);
        let existing = dir.path().join("pv-project-3").join("test");
        fs::create_dir_all(&existing).unwrap();

        // Unroutable registry: reaching the network would fail the fetch.
        let source = HttpDatasetSource::new("http://127.0.0.1:9", "key").unwrap();
        let found = source.fetch(&dataset, dir.path()).unwrap();
        assert_eq!(found, dir.path().join("pv-project-3"));
    }

    #[test]
    fn test_export_response_parses_link() {
        let export: ExportResponse = serde_json::from_str(
            r#"{"name": "pv", "export": {"format": "coco", "link": "https://files.test/x.zip"}}"#,
        )
        .unwrap();
        assert_eq!(export.export.link, "https://files.test/x.zip");
    }
}
