//! Object-store client for AWS S3 and S3-compatible services
//!
//! Built on `object_store`'s `AmazonS3Builder`, which also talks to
//! DigitalOcean Spaces through a custom endpoint.

use crate::config::schema::{AwsConfig, DigitalOceanConfig};
use crate::domain::errors::BackendError;
use crate::domain::{DeployError, Result};
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{
    Attribute, Attributes, ClientOptions, ObjectStore, PutOptions, PutPayload,
};
use secrecy::ExposeSecret;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Signing region Spaces expects regardless of datacenter
const SPACES_SIGNING_REGION: &str = "us-east-1";

/// Client for one bucket
#[derive(Clone)]
pub struct ObjectStoreClient {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectStoreClient {
    /// Wrap an existing store
    pub fn with_store(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Client for an AWS S3 bucket
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the store cannot be built
    pub fn from_aws(config: &AwsConfig) -> Result<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_access_key_id(&config.access_key)
            .with_secret_access_key(config.access_secret.expose_secret().as_str())
            .with_client_options(client_options());

        if let Some(ref endpoint) = config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }

        let store = builder.build().map_err(|e| {
            DeployError::Configuration(format!("Failed to build S3 client: {e}"))
        })?;

        tracing::debug!(bucket = %config.bucket, region = %config.region, "S3 client created");
        Ok(Self::with_store(Arc::new(store), &config.bucket))
    }

    /// Client for a DigitalOcean Space
    pub fn from_digitalocean(config: &DigitalOceanConfig) -> Result<Self> {
        let endpoint = config.endpoint_url();
        let store = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(SPACES_SIGNING_REGION)
            .with_endpoint(&endpoint)
            .with_virtual_hosted_style_request(false)
            .with_access_key_id(&config.key)
            .with_secret_access_key(config.secret.expose_secret().as_str())
            .with_client_options(client_options())
            .build()
            .map_err(|e| {
                DeployError::Configuration(format!("Failed to build Spaces client: {e}"))
            })?;

        tracing::debug!(bucket = %config.bucket, endpoint = %endpoint, "Spaces client created");
        Ok(Self::with_store(Arc::new(store), &config.bucket))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload every regular file under `local_dir` to `subdir`
    ///
    /// Returns the number of files written. Any failure aborts the sync.
    pub async fn transfer_directory(
        &self,
        local_dir: &Path,
        subdir: Option<&str>,
    ) -> std::result::Result<usize, BackendError> {
        let files = list_files(local_dir)
            .await
            .map_err(|e| BackendError::DirectorySync(format!("{}: {e}", local_dir.display())))?;

        for file in &files {
            let relative = file
                .strip_prefix(local_dir)
                .map_err(|e| BackendError::DirectorySync(e.to_string()))?;
            let key = join_key(subdir, &relative.to_string_lossy());
            self.put_file(file, &key).await.map_err(|e| {
                BackendError::DirectorySync(format!("{}: {e}", file.display()))
            })?;
        }

        tracing::info!(
            bucket = %self.bucket,
            local_dir = %local_dir.display(),
            files = files.len(),
            "Directory synced"
        );
        Ok(files.len())
    }

    /// Upload one file; false on any failure
    pub async fn upload_file(&self, local_path: &Path, remote_key: &str) -> bool {
        match self.put_file(local_path, remote_key).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    bucket = %self.bucket,
                    key = %remote_key,
                    error = %e,
                    "Object upload failed"
                );
                false
            }
        }
    }

    async fn put_file(
        &self,
        local_path: &Path,
        remote_key: &str,
    ) -> std::result::Result<(), BackendError> {
        let bytes = tokio::fs::read(local_path)
            .await
            .map_err(|e| BackendError::UploadFailed {
                path: local_path.display().to_string(),
                message: e.to_string(),
            })?;

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type(remote_key).into());
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(&ObjectPath::from(remote_key), PutPayload::from(bytes), options)
            .await?;
        Ok(())
    }
}

fn client_options() -> ClientOptions {
    ClientOptions::new().with_timeout(Duration::from_secs(60))
}

/// Join an optional key prefix and a relative path with single slashes
pub fn join_key(prefix: Option<&str>, path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    if let Some(prefix) = prefix {
        parts.extend(prefix.split('/').filter(|s| !s.is_empty()));
    }
    parts.extend(path.split('/').filter(|s| !s.is_empty()));
    parts.join("/")
}

/// Content type inferred from the key's extension
pub fn content_type(key: &str) -> &'static str {
    let ext = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Every regular file below `root`, sorted
async fn list_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }

    files.sort();
    Ok(files)
}
