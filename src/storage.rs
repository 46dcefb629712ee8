//! Durable storage for retrieved log payloads
//!
//! Artifacts are keyed by application and logical timestamp (the end of the
//! leaf range), so re-running a window overwrites the same artifact.

use crate::adaptive_fetcher::RetryPolicy;
use crate::config::StorageConfig;
use crate::error::{ArchiveError, Result};
use crate::models::ArtifactRef;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Partition marker for the data set in every key
pub const LOG_TYPE_PARTITION: &str = "type=amplify_logs";

/// Storage collaborator used by the orchestrator
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Persist one payload under the key derived from `logical_timestamp`
    async fn persist(&self, payload: &Bytes, logical_timestamp: DateTime<Utc>)
        -> Result<ArtifactRef>;
}

/// Builds artifact keys of the form
/// `{prefix}/type=amplify_logs/app={app}/date_export={YYYY-MM-DD}/log_{YYYYMMDD_HHMMSS}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLayout {
    prefix: String,
    app_name: String,
}

impl KeyLayout {
    pub fn new(prefix: impl Into<String>, app_name: impl Into<String>) -> Self {
        KeyLayout {
            prefix: prefix.into(),
            app_name: app_name.into(),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Key for the artifact holding the window ending at `timestamp`
    pub fn key_for(&self, timestamp: DateTime<Utc>) -> String {
        let relative = format!(
            "{}/app={}/date_export={}/log_{}",
            LOG_TYPE_PARTITION,
            self.app_name,
            timestamp.format("%Y-%m-%d"),
            timestamp.format("%Y%m%d_%H%M%S")
        );

        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            relative
        } else {
            format!("{}/{}", prefix, relative)
        }
    }
}

/// Content type for an artifact key, from its extension
pub fn content_type_for(key: &str) -> &'static str {
    if key.ends_with(".json") {
        "application/json"
    } else if key.ends_with(".csv") {
        "text/csv"
    } else {
        "text/plain"
    }
}

/// Stores artifacts below a local directory
pub struct FileLogStore {
    root: PathBuf,
    layout: KeyLayout,
}

impl FileLogStore {
    pub fn new(root: impl Into<PathBuf>, layout: KeyLayout) -> Self {
        FileLogStore {
            root: root.into(),
            layout,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local path for the artifact ending at `timestamp`
    pub fn path_for(&self, timestamp: DateTime<Utc>) -> PathBuf {
        self.root.join(self.layout.key_for(timestamp))
    }
}

#[async_trait]
impl LogStore for FileLogStore {
    async fn persist(
        &self,
        payload: &Bytes,
        logical_timestamp: DateTime<Utc>,
    ) -> Result<ArtifactRef> {
        let file_path = self.path_for(logical_timestamp);

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                ArchiveError::Storage(format!("Failed to create log directory: {}", e))
            })?;
        }

        let mut file = fs::File::create(&file_path).await.map_err(|e| {
            ArchiveError::Storage(format!("Failed to create log file: {}", e))
        })?;

        file.write_all(payload)
            .await
            .map_err(|e| ArchiveError::Storage(format!("Failed to write logs: {}", e)))?;

        file.sync_all()
            .await
            .map_err(|e| ArchiveError::Storage(format!("Failed to sync log file: {}", e)))?;

        info!("Saved logs ({} bytes) to {}", payload.len(), file_path.display());
        Ok(ArtifactRef(file_path.display().to_string()))
    }
}

/// Uploads artifacts to an S3-compatible object store with HTTP PUT
///
/// Objects are written with server-side encryption (`AES256`). The endpoint
/// is expected to handle request signing.
pub struct ObjectStore {
    client: Client,
    endpoint: String,
    bucket: String,
    layout: KeyLayout,
    retry: RetryPolicy,
}

impl ObjectStore {
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        layout: KeyLayout,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ArchiveError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(ObjectStore {
            client,
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            layout,
            retry,
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.bucket,
            key
        )
    }

    /// Single upload attempt
    async fn try_put(&self, key: &str, payload: &Bytes) -> Result<()> {
        let response = self
            .client
            .put(self.object_url(key))
            .header("Content-Type", content_type_for(key))
            .header("x-amz-server-side-encryption", "AES256")
            .body(payload.clone())
            .send()
            .await
            .map_err(|e| ArchiveError::Storage(format!("Upload request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        if status.is_client_error() && status.as_u16() != 429 {
            Err(ArchiveError::StorageRejected {
                status: status.as_u16(),
                message,
            })
        } else {
            Err(ArchiveError::Storage(format!(
                "Upload returned HTTP {}: {}",
                status, message
            )))
        }
    }
}

#[async_trait]
impl LogStore for ObjectStore {
    async fn persist(
        &self,
        payload: &Bytes,
        logical_timestamp: DateTime<Utc>,
    ) -> Result<ArtifactRef> {
        let key = self.layout.key_for(logical_timestamp);
        let mut attempt = 0;

        loop {
            debug!("Uploading {} bytes to s3://{}/{}", payload.len(), self.bucket, key);
            match self.try_put(&key, payload).await {
                Ok(()) => {
                    info!("Uploaded s3://{}/{}", self.bucket, key);
                    return Ok(ArtifactRef(key));
                }
                Err(e) => {
                    if !self.retry.should_retry(attempt, &e) {
                        warn!(
                            "Failed to upload s3://{}/{} after {} attempts: {}",
                            self.bucket,
                            key,
                            attempt + 1,
                            e
                        );
                        return Err(e);
                    }

                    let backoff = self.retry.backoff_duration(attempt);
                    warn!(
                        "Upload of {} failed (attempt {}), retrying after {:?}: {}",
                        key,
                        attempt + 1,
                        backoff,
                        e
                    );
                    if !backoff.is_zero() {
                        sleep(backoff).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

/// Storage backend chosen from configuration
pub enum StorageBackend {
    File(FileLogStore),
    ObjectStore(ObjectStore),
}

impl StorageBackend {
    /// Build the configured backend for one application
    pub fn from_config(config: &StorageConfig, app_name: &str) -> Result<Self> {
        let layout = KeyLayout::new(config.prefix.clone(), app_name);

        match config.backend.as_str() {
            "file" => Ok(StorageBackend::File(FileLogStore::new(
                config.output_dir.clone(),
                layout,
            ))),
            "object_store" => {
                let endpoint = config.endpoint.clone().ok_or_else(|| {
                    ArchiveError::ConfigError("storage.endpoint is required".to_string())
                })?;
                let bucket = config.bucket.clone().ok_or_else(|| {
                    ArchiveError::ConfigError("storage.bucket is required".to_string())
                })?;
                let retry = RetryPolicy::new(config.upload_attempts, Duration::from_secs(2));
                Ok(StorageBackend::ObjectStore(ObjectStore::new(
                    endpoint, bucket, layout, retry,
                )?))
            }
            other => Err(ArchiveError::ConfigError(format!(
                "Invalid storage backend '{}'",
                other
            ))),
        }
    }

    /// Human readable destination for summaries
    pub fn describe(&self) -> String {
        match self {
            StorageBackend::File(store) => store.root().display().to_string(),
            StorageBackend::ObjectStore(store) => format!("s3://{}", store.bucket),
        }
    }
}

#[async_trait]
impl LogStore for StorageBackend {
    async fn persist(
        &self,
        payload: &Bytes,
        logical_timestamp: DateTime<Utc>,
    ) -> Result<ArtifactRef> {
        match self {
            StorageBackend::File(store) => store.persist(payload, logical_timestamp).await,
            StorageBackend::ObjectStore(store) => store.persist(payload, logical_timestamp).await,
        }
    }
}
