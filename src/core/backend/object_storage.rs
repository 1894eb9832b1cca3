//! AWS S3 and DigitalOcean Spaces backend

use super::{throttle, BatchOutcome, DeployBackend, PageOutcome};
use crate::adapters::s3::{join_key, ObjectStoreClient};
use crate::config::schema::{AwsConfig, DigitalOceanConfig};
use crate::core::state::RunHandle;
use crate::domain::destination::DestinationKind;
use crate::domain::page::PageRecord;
use crate::domain::run::RunContext;
use crate::domain::{DeployError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Object-store destination
///
/// AWS syncs the whole export directory once per invocation and then marks
/// the selected pages. Spaces uploads each selected file on its own.
pub struct ObjectStoreBackend {
    kind: DestinationKind,
    client: ObjectStoreClient,
    prefix: Option<String>,
    batch_size: Option<usize>,
    bulk_sync: bool,
    throttle: Option<Duration>,
}

impl ObjectStoreBackend {
    pub fn aws(config: &AwsConfig) -> Result<Self> {
        Ok(Self {
            kind: DestinationKind::Aws,
            client: ObjectStoreClient::from_aws(config)?,
            prefix: config.subdirectory.clone(),
            batch_size: config.batch_size,
            bulk_sync: true,
            throttle: None,
        })
    }

    pub fn digitalocean(config: &DigitalOceanConfig) -> Result<Self> {
        Ok(Self {
            kind: DestinationKind::DigitalOcean,
            client: ObjectStoreClient::from_digitalocean(config)?,
            prefix: config.folder.clone(),
            batch_size: Some(config.batch_size),
            bulk_sync: false,
            throttle: config
                .throttle
                .then(|| Duration::from_millis(config.throttle_ms)),
        })
    }

    /// Backend over an existing client
    pub fn with_client(
        kind: DestinationKind,
        client: ObjectStoreClient,
        prefix: Option<String>,
        batch_size: Option<usize>,
        bulk_sync: bool,
    ) -> Self {
        Self {
            kind,
            client,
            prefix,
            batch_size,
            bulk_sync,
            throttle: None,
        }
    }

    async fn sync_directory(&self, run: &RunContext, batch: &[PageRecord]) -> Result<BatchOutcome> {
        self.client
            .transfer_directory(run.archive_dir(), self.prefix.as_deref())
            .await
            .map_err(DeployError::Backend)?;

        let mut outcome = BatchOutcome::default();
        for page in batch {
            let Some(file_path) = page.file_path() else {
                continue;
            };
            // Only files that were on disk for the sync count as written
            if tokio::fs::try_exists(run.local_path(file_path))
                .await
                .unwrap_or(false)
            {
                outcome.push(page, PageOutcome::Transferred);
            } else {
                crate::log_transfer_failure!(self.kind, file_path, "missing from export directory");
                outcome.push(
                    page,
                    PageOutcome::Failed("missing from export directory".to_string()),
                );
            }
        }
        Ok(outcome)
    }

    async fn upload_each(&self, run: &RunContext, batch: &[PageRecord]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for page in batch {
            let Some(file_path) = page.file_path() else {
                continue;
            };
            let key = join_key(self.prefix.as_deref(), run.relative_path(file_path));

            if self.client.upload_file(&run.local_path(file_path), &key).await {
                outcome.push(page, PageOutcome::Transferred);
            } else {
                crate::log_transfer_failure!(self.kind, file_path, "upload failed");
                outcome.push(page, PageOutcome::Failed("upload failed".to_string()));
            }

            throttle(self.throttle).await;
        }
        outcome
    }
}

#[async_trait]
impl DeployBackend for ObjectStoreBackend {
    fn kind(&self) -> DestinationKind {
        self.kind
    }

    fn batch_size(&self) -> Option<usize> {
        self.batch_size
    }

    async fn transfer_batch(
        &self,
        run: &RunContext,
        batch: &[PageRecord],
        _state: &RunHandle,
    ) -> Result<BatchOutcome> {
        if batch.is_empty() {
            return Ok(BatchOutcome::default());
        }

        if self.bulk_sync {
            self.sync_directory(run, batch).await
        } else {
            Ok(self.upload_each(run, batch).await)
        }
    }

    async fn finalize(&self, _run: &RunContext, _state: &RunHandle) -> Result<Option<String>> {
        tracing::info!(
            destination = %self.kind,
            bucket = %self.client.bucket(),
            "Object store deployment complete"
        );
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::manager::test_handle;
    use crate::domain::run::ExportKind;
    use chrono::Utc;
    use object_store::memory::InMemory;
    use object_store::path::Path as ObjectPath;
    use object_store::ObjectStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn state() -> RunHandle {
        test_handle(DestinationKind::Aws).await
    }

    fn page(id: i64, file: &str) -> PageRecord {
        PageRecord::new(id, format!("/{file}"), Some(file.to_string()))
    }

    #[tokio::test]
    async fn test_bulk_sync_marks_files_present_on_disk() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "home").unwrap();
        let run = RunContext::new(Utc::now(), dir.path(), "site", ExportKind::Full);

        let store = Arc::new(InMemory::new());
        let backend = ObjectStoreBackend::with_client(
            DestinationKind::Aws,
            ObjectStoreClient::with_store(store.clone(), "bucket"),
            Some("www".to_string()),
            None,
            true,
        );

        let batch = vec![page(1, "index.html"), page(2, "gone.html")];
        let outcome = backend
            .transfer_batch(&run, &batch, &state().await)
            .await
            .unwrap();

        assert_eq!(outcome.results[0].outcome, PageOutcome::Transferred);
        assert!(matches!(outcome.results[1].outcome, PageOutcome::Failed(_)));
        assert!(store.head(&ObjectPath::from("www/index.html")).await.is_ok());
    }

    #[tokio::test]
    async fn test_bulk_sync_failure_is_fatal() {
        let run = RunContext::new(
            Utc::now(),
            "/nonexistent/sitepush/export",
            "site",
            ExportKind::Full,
        );
        let backend = ObjectStoreBackend::with_client(
            DestinationKind::Aws,
            ObjectStoreClient::with_store(Arc::new(InMemory::new()), "bucket"),
            None,
            None,
            true,
        );

        let result = backend
            .transfer_batch(&run, &[page(1, "index.html")], &state().await)
            .await;
        assert!(matches!(result, Err(DeployError::Backend(_))));
    }

    #[tokio::test]
    async fn test_per_file_upload_reports_each_page() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("blog")).unwrap();
        std::fs::write(dir.path().join("blog/index.html"), "post").unwrap();
        let run = RunContext::new(Utc::now(), dir.path(), "site", ExportKind::Full);

        let store = Arc::new(InMemory::new());
        let backend = ObjectStoreBackend::with_client(
            DestinationKind::DigitalOcean,
            ObjectStoreClient::with_store(store.clone(), "space"),
            Some("site".to_string()),
            Some(250),
            false,
        );

        let batch = vec![page(1, "blog/index.html"), page(2, "index.html")];
        let outcome = backend
            .transfer_batch(&run, &batch, &state().await)
            .await
            .unwrap();

        assert_eq!(outcome.count(|o| *o == PageOutcome::Transferred), 1);
        assert_eq!(outcome.count(|o| !o.marks_page()), 1);
        assert!(store
            .head(&ObjectPath::from("site/blog/index.html"))
            .await
            .is_ok());
    }
}
