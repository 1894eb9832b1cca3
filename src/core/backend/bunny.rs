//! BunnyCDN edge storage backend

use super::{throttle, BatchOutcome, DeployBackend, PageOutcome};
use crate::adapters::bunny::BunnyClient;
use crate::config::schema::BunnyConfig;
use crate::core::state::RunHandle;
use crate::domain::destination::DestinationKind;
use crate::domain::page::PageRecord;
use crate::domain::run::RunContext;
use crate::domain::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

/// Location of the custom error page, both in the export and in the zone
pub const ERROR_PAGE_PATH: &str = "bunnycdn_errors/404.html";

pub struct BunnyBackend {
    client: BunnyClient,
    batch_size: usize,
    throttle: Option<Duration>,
    custom_404_path: Option<String>,
}

impl BunnyBackend {
    pub fn new(config: &BunnyConfig) -> Result<Self> {
        Ok(Self::with_client(
            BunnyClient::new(config)?,
            config.batch_size,
            config
                .throttle
                .then(|| Duration::from_millis(config.throttle_ms)),
            config.custom_404_path.clone(),
        ))
    }

    pub fn with_client(
        client: BunnyClient,
        batch_size: usize,
        throttle: Option<Duration>,
        custom_404_path: Option<String>,
    ) -> Self {
        Self {
            client,
            batch_size,
            throttle,
            custom_404_path,
        }
    }

    /// Copy the configured page into the error-page location and upload it
    ///
    /// Returns whether the page was uploaded.
    async fn upload_error_page(&self, run: &RunContext) -> bool {
        let Some(ref page_path) = self.custom_404_path else {
            return false;
        };

        let source: PathBuf = run
            .archive_dir()
            .join(page_path.trim_matches('/'))
            .join("index.html");
        let target = run.archive_dir().join(ERROR_PAGE_PATH);

        let copied = async {
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(&source, &target).await
        }
        .await;

        if let Err(e) = copied {
            tracing::warn!(
                source = %source.display(),
                error = %e,
                "Custom 404 page not available, skipping"
            );
            return false;
        }

        let uploaded = self.client.upload_file(&target, ERROR_PAGE_PATH).await;
        if uploaded {
            tracing::info!(path = ERROR_PAGE_PATH, "Custom 404 page uploaded");
        }
        uploaded
    }
}

#[async_trait]
impl DeployBackend for BunnyBackend {
    fn kind(&self) -> DestinationKind {
        DestinationKind::Bunny
    }

    fn batch_size(&self) -> Option<usize> {
        Some(self.batch_size)
    }

    async fn transfer_batch(
        &self,
        run: &RunContext,
        batch: &[PageRecord],
        _state: &RunHandle,
    ) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();

        for page in batch {
            let Some(file_path) = page.file_path() else {
                continue;
            };

            let remote_path = run.relative_path(file_path);
            if self
                .client
                .upload_file(&run.local_path(file_path), remote_path)
                .await
            {
                outcome.push(page, PageOutcome::Transferred);
            } else {
                crate::log_transfer_failure!(DestinationKind::Bunny, file_path, "upload failed");
                outcome.push(page, PageOutcome::Failed("upload failed".to_string()));
            }

            throttle(self.throttle).await;
        }

        Ok(outcome)
    }

    async fn finalize(&self, run: &RunContext, _state: &RunHandle) -> Result<Option<String>> {
        self.upload_error_page(run).await;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RetryConfig;
    use crate::config::secret_string;
    use crate::core::state::manager::test_handle;
    use crate::domain::run::ExportKind;
    use chrono::Utc;
    use tempfile::TempDir;

    fn backend(endpoint: &str, custom_404_path: Option<&str>) -> BunnyBackend {
        let config = BunnyConfig {
            storage_zone: "zone".to_string(),
            access_key: secret_string("key".to_string()),
            storage_endpoint: endpoint.to_string(),
            cdn_directory: None,
            custom_404_path: custom_404_path.map(str::to_string),
            batch_size: 25,
            throttle: false,
            throttle_ms: 0,
            timeout_seconds: 5,
            retry: RetryConfig {
                max_retries: 0,
                ..RetryConfig::default()
            },
        };
        BunnyBackend::new(&config).unwrap()
    }

    async fn state() -> RunHandle {
        test_handle(DestinationKind::Bunny).await
    }

    #[tokio::test]
    async fn test_transfer_batch_uploads_each_file() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("PUT", "/zone/index.html")
            .with_status(201)
            .create_async()
            .await;
        let _rejected = server
            .mock("PUT", "/zone/about/index.html")
            .with_status(400)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("about")).unwrap();
        std::fs::write(dir.path().join("index.html"), "home").unwrap();
        std::fs::write(dir.path().join("about/index.html"), "about").unwrap();
        let run = RunContext::new(Utc::now(), dir.path(), "site", ExportKind::Full);

        let batch = vec![
            PageRecord::new(1, "/", Some("index.html".to_string())),
            PageRecord::new(2, "/about/", Some("about/index.html".to_string())),
        ];
        let outcome = backend(&server.url(), None)
            .transfer_batch(&run, &batch, &state().await)
            .await
            .unwrap();

        assert_eq!(outcome.results[0].outcome, PageOutcome::Transferred);
        assert!(!outcome.results[1].outcome.marks_page());
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn test_finalize_uploads_custom_404() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/zone/bunnycdn_errors/404.html")
            .match_body("not found")
            .with_status(201)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("missing-page")).unwrap();
        std::fs::write(dir.path().join("missing-page/index.html"), "not found").unwrap();
        let run = RunContext::new(Utc::now(), dir.path(), "site", ExportKind::Full);

        let backend = backend(&server.url(), Some("/missing-page/"));
        assert_eq!(backend.finalize(&run, &state().await).await.unwrap(), None);

        mock.assert_async().await;
        assert!(dir.path().join(ERROR_PAGE_PATH).exists());
    }

    #[tokio::test]
    async fn test_finalize_without_source_page_still_succeeds() {
        let dir = TempDir::new().unwrap();
        let run = RunContext::new(Utc::now(), dir.path(), "site", ExportKind::Full);
        let backend = backend("http://127.0.0.1:1", Some("missing-page"));
        assert!(backend.finalize(&run, &state().await).await.is_ok());
    }
}
