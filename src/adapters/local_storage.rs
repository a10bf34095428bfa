use crate::domain::model::{Request, Sample};
use crate::domain::ports::Repository;
use crate::utils::error::{BridgeError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Stores every request and sample as a pretty-printed JSON document under
/// `<base>/requests/<IgoRequestID>.json` and `<base>/samples/<CmoSampleName>.json`.
/// Updates overwrite the previous document.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    base_path: PathBuf,
}

impl JsonFileRepository {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn request_path(&self, igo_request_id: &str) -> PathBuf {
        self.base_path
            .join("requests")
            .join(format!("{}.json", igo_request_id))
    }

    pub fn sample_path(&self, cmo_sample_name: &str) -> PathBuf {
        self.base_path
            .join("samples")
            .join(format!("{}.json", cmo_sample_name))
    }

    async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let data = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(path, data).await?;
        tracing::debug!(path = %path.display(), "Wrote document");
        Ok(())
    }
}

/// Keys end up as file names, so they must be a single plain path component.
fn check_key(kind: &str, key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(BridgeError::storage(format!("{} has an empty identifier", kind)));
    }
    if key == "." || key == ".." || key.contains(&['/', '\\', '\0'][..]) {
        return Err(BridgeError::storage(format!(
            "{} identifier '{}' is not a valid file name",
            kind, key
        )));
    }
    Ok(())
}

#[async_trait]
impl Repository for JsonFileRepository {
    async fn add_request(&self, _ct: &CancellationToken, request: Request) -> Result<()> {
        check_key("request", &request.igo_request_id)?;
        let path = self.request_path(&request.igo_request_id);
        if tokio::fs::try_exists(&path).await? {
            return Err(BridgeError::storage(format!(
                "request {} already exists",
                request.igo_request_id
            )));
        }
        self.write_json(&path, &request).await
    }

    async fn update_requests(&self, _ct: &CancellationToken, requests: Vec<Request>) -> Result<()> {
        for request in &requests {
            check_key("request", &request.igo_request_id)?;
        }
        for request in &requests {
            let path = self.request_path(&request.igo_request_id);
            self.write_json(&path, request).await?;
        }
        Ok(())
    }

    async fn update_samples(&self, _ct: &CancellationToken, samples: Vec<Sample>) -> Result<()> {
        for sample in &samples {
            check_key("sample", &sample.cmo_sample_name)?;
        }
        for sample in &samples {
            let path = self.sample_path(&sample.cmo_sample_name);
            self.write_json(&path, sample).await?;
        }
        Ok(())
    }
}
