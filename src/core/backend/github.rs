//! GitHub repository backend
//!
//! Files become blobs as they are selected; the commit happens once, in the
//! first invocation that finds nothing left to select.

use super::{throttle, BatchOutcome, DeployBackend, PageOutcome};
use crate::adapters::github::GitHubClient;
use crate::config::schema::{AccountType, GitHubConfig};
use crate::core::assembler::TreeAssembler;
use crate::core::rate::RateGovernor;
use crate::core::state::{RunFlag, RunHandle};
use crate::domain::destination::DestinationKind;
use crate::domain::errors::BackendError;
use crate::domain::page::PageRecord;
use crate::domain::run::{ExportKind, RunContext};
use crate::domain::{DeployError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub struct GitHubBackend {
    client: Arc<GitHubClient>,
    assembler: TreeAssembler,
    governor: RateGovernor,
    throttle: Option<Duration>,
    config: GitHubConfig,
}

impl GitHubBackend {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let client = Arc::new(GitHubClient::new(config)?);
        Ok(Self {
            assembler: TreeAssembler::new(client.clone(), config.folder_path.clone()),
            governor: RateGovernor::new(client.clone()),
            client,
            throttle: config
                .throttle_request
                .then(|| Duration::from_millis(config.throttle_ms)),
            config: config.clone(),
        })
    }

    async fn create_seeded_repository(&self) -> std::result::Result<(), BackendError> {
        self.client.create_repository().await?;
        self.client.add_marker_file().await
    }

    async fn reset_repository(&self) -> std::result::Result<(), BackendError> {
        tracing::info!(repository = %self.client.full_name(), "Clearing repository for full export");
        self.client.delete_repository().await?;
        self.create_seeded_repository().await
    }

    async fn ensure_repository(&self) -> std::result::Result<(), BackendError> {
        if self.client.repository_exists().await? {
            return Ok(());
        }

        match self.client.account_type() {
            AccountType::Personal => self.create_seeded_repository().await,
            AccountType::Organization => Err(BackendError::RepositorySetup(format!(
                "organization repository {} does not exist",
                self.client.full_name()
            ))),
        }
    }

    async fn stage_page(
        &self,
        run: &RunContext,
        file_path: &str,
        state: &RunHandle,
    ) -> Result<PageOutcome> {
        let content = match tokio::fs::read(run.local_path(file_path)).await {
            Ok(content) => content,
            Err(e) => return Ok(PageOutcome::Failed(format!("read failed: {e}"))),
        };

        if content.is_empty() {
            tracing::warn!(file_path = %file_path, "File is empty, nothing to upload");
            return Ok(PageOutcome::Skipped("empty file".to_string()));
        }

        let path = self.assembler.repository_path(run, file_path);
        match self.assembler.stage(state, &path, &content).await {
            Ok(_) => Ok(PageOutcome::Transferred),
            Err(DeployError::Backend(e)) => Ok(PageOutcome::Failed(e.to_string())),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl DeployBackend for GitHubBackend {
    fn kind(&self) -> DestinationKind {
        DestinationKind::GitHub
    }

    fn batch_size(&self) -> Option<usize> {
        Some(self.config.batch_size)
    }

    async fn prepare(&self, run: &RunContext, state: &RunHandle) -> Result<()> {
        let wants_reset =
            self.config.clear_repository && run.export_kind == ExportKind::Full;

        let prepared = if wants_reset && state.try_claim(RunFlag::RepositoryReset).await? {
            let reset = self.reset_repository().await;
            if reset.is_err() {
                state.release(RunFlag::RepositoryReset).await?;
            }
            reset
        } else {
            self.ensure_repository().await
        };

        prepared.map_err(|e| match e {
            BackendError::RepositorySetup(_) => DeployError::Backend(e),
            other => DeployError::Backend(BackendError::RepositorySetup(other.to_string())),
        })
    }

    async fn transfer_batch(
        &self,
        run: &RunContext,
        batch: &[PageRecord],
        state: &RunHandle,
    ) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        if batch.is_empty() {
            return Ok(outcome);
        }

        outcome.rate = Some(self.governor.check(batch.len(), state).await?);

        for page in batch {
            let Some(file_path) = page.file_path() else {
                continue;
            };

            let result = self.stage_page(run, file_path, state).await?;
            if let PageOutcome::Failed(ref reason) = result {
                crate::log_transfer_failure!(DestinationKind::GitHub, file_path, reason);
            }
            outcome.push(page, result);

            throttle(self.throttle).await;
        }

        Ok(outcome)
    }

    async fn finalize(&self, run: &RunContext, state: &RunHandle) -> Result<Option<String>> {
        let message = self.config.render_commit_message(&run.archive_name);
        let commit = self.assembler.finalize(state, &message).await?;
        if commit.is_none() {
            tracing::info!(run_id = %run.run_id, "No staged files, nothing to commit");
        }
        Ok(commit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RetryConfig;
    use crate::config::secret_string;
    use crate::core::state::manager::test_handle;
    use chrono::Utc;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use tempfile::TempDir;

    fn config(base: &str) -> GitHubConfig {
        GitHubConfig {
            account_type: AccountType::Personal,
            owner: "octo".to_string(),
            repository: "site".to_string(),
            personal_access_token: secret_string("ghp_test".to_string()),
            branch: "main".to_string(),
            folder_path: Some("public".to_string()),
            api_base_url: base.to_string(),
            batch_size: 50,
            throttle_request: false,
            throttle_ms: 0,
            clear_repository: false,
            private: true,
            commit_message: "Updated/Added {archive_name}".to_string(),
            repository_dispatch: false,
            timeout_seconds: 5,
            retry: RetryConfig {
                max_retries: 0,
                ..RetryConfig::default()
            },
        }
    }

    async fn state() -> RunHandle {
        test_handle(DestinationKind::GitHub).await
    }

    async fn mock_quota(server: &mut Server) -> mockito::Mock {
        server
            .mock("GET", "/rate_limit")
            .with_body(r#"{"rate":{"limit":5000,"remaining":4999,"reset":0}}"#)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_prepare_creates_missing_personal_repository() {
        let mut server = Server::new_async().await;
        let _missing = server
            .mock("GET", "/repos/octo/site")
            .with_status(404)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/user/repos")
            .match_body(Matcher::PartialJson(json!({"name": "site", "private": true})))
            .with_status(201)
            .with_body(r#"{"full_name":"octo/site"}"#)
            .create_async()
            .await;
        let seed = server
            .mock("PUT", "/repos/octo/site/contents/sitepush.txt")
            .with_status(201)
            .with_body("{}")
            .create_async()
            .await;

        let backend = GitHubBackend::new(&config(&server.url())).unwrap();
        let run = RunContext::new(Utc::now(), "/tmp/export", "site", ExportKind::Full);
        backend.prepare(&run, &state().await).await.unwrap();

        create.assert_async().await;
        seed.assert_async().await;
    }

    #[tokio::test]
    async fn test_prepare_fails_for_missing_organization_repository() {
        let mut server = Server::new_async().await;
        let _missing = server
            .mock("GET", "/repos/octo/site")
            .with_status(404)
            .create_async()
            .await;

        let mut config = config(&server.url());
        config.account_type = AccountType::Organization;
        let backend = GitHubBackend::new(&config).unwrap();
        let run = RunContext::new(Utc::now(), "/tmp/export", "site", ExportKind::Full);

        let err = backend.prepare(&run, &state().await).await.unwrap_err();
        assert!(matches!(
            err,
            DeployError::Backend(BackendError::RepositorySetup(_))
        ));
    }

    #[tokio::test]
    async fn test_prepare_resets_repository_once_per_run() {
        let mut server = Server::new_async().await;
        let delete = server
            .mock("DELETE", "/repos/octo/site")
            .with_status(204)
            .expect(1)
            .create_async()
            .await;
        let _create = server
            .mock("POST", "/user/repos")
            .with_status(201)
            .with_body(r#"{"full_name":"octo/site"}"#)
            .create_async()
            .await;
        let _seed = server
            .mock("PUT", "/repos/octo/site/contents/sitepush.txt")
            .with_status(201)
            .with_body("{}")
            .create_async()
            .await;
        let _exists = server
            .mock("GET", "/repos/octo/site")
            .with_body(r#"{"full_name":"octo/site"}"#)
            .create_async()
            .await;

        let mut config = config(&server.url());
        config.clear_repository = true;
        let backend = GitHubBackend::new(&config).unwrap();
        let run = RunContext::new(Utc::now(), "/tmp/export", "site", ExportKind::Full);
        let state = state().await;

        backend.prepare(&run, &state).await.unwrap();
        assert!(state.snapshot().await.unwrap().repository_reset);
        backend.prepare(&run, &state).await.unwrap();

        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_overlapping_prepares_reset_once() {
        let mut server = Server::new_async().await;
        let delete = server
            .mock("DELETE", "/repos/octo/site")
            .with_status(204)
            .expect(1)
            .create_async()
            .await;
        let _create = server
            .mock("POST", "/user/repos")
            .with_status(201)
            .with_body(r#"{"full_name":"octo/site"}"#)
            .create_async()
            .await;
        let _seed = server
            .mock("PUT", "/repos/octo/site/contents/sitepush.txt")
            .with_status(201)
            .with_body("{}")
            .create_async()
            .await;
        let _exists = server
            .mock("GET", "/repos/octo/site")
            .with_body(r#"{"full_name":"octo/site"}"#)
            .create_async()
            .await;

        let mut config = config(&server.url());
        config.clear_repository = true;
        let first = GitHubBackend::new(&config).unwrap();
        let second = GitHubBackend::new(&config).unwrap();
        let run = RunContext::new(Utc::now(), "/tmp/export", "site", ExportKind::Full);
        let state = state().await;

        let (a, b) = tokio::join!(first.prepare(&run, &state), second.prepare(&run, &state));
        a.unwrap();
        b.unwrap();

        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_reset_can_be_retried() {
        let mut server = Server::new_async().await;
        let _delete = server
            .mock("DELETE", "/repos/octo/site")
            .with_status(403)
            .with_body(r#"{"message":"Must have admin rights"}"#)
            .create_async()
            .await;

        let mut config = config(&server.url());
        config.clear_repository = true;
        let backend = GitHubBackend::new(&config).unwrap();
        let run = RunContext::new(Utc::now(), "/tmp/export", "site", ExportKind::Full);
        let state = state().await;

        assert!(backend.prepare(&run, &state).await.is_err());
        assert!(!state.snapshot().await.unwrap().repository_reset);
    }

    #[tokio::test]
    async fn test_transfer_batch_stages_blobs_under_folder() {
        let mut server = Server::new_async().await;
        let _quota = mock_quota(&mut server).await;
        let blob = server
            .mock("POST", "/repos/octo/site/git/blobs")
            .with_status(201)
            .with_body(r#"{"sha":"b1"}"#)
            .expect(1)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "home").unwrap();
        std::fs::write(dir.path().join("empty.html"), "").unwrap();
        let run = RunContext::new(Utc::now(), dir.path(), "site", ExportKind::Full);

        let batch = vec![
            PageRecord::new(1, "/", Some("index.html".to_string())),
            PageRecord::new(2, "/empty", Some("empty.html".to_string())),
            PageRecord::new(3, "/gone", Some("gone.html".to_string())),
        ];
        let backend = GitHubBackend::new(&config(&server.url())).unwrap();
        let state = state().await;
        let outcome = backend.transfer_batch(&run, &batch, &state).await.unwrap();
        let staged = state.snapshot().await.unwrap().blobs;

        assert_eq!(outcome.results[0].outcome, PageOutcome::Transferred);
        assert!(matches!(outcome.results[1].outcome, PageOutcome::Skipped(_)));
        assert!(matches!(outcome.results[2].outcome, PageOutcome::Failed(_)));
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].path, "public/index.html");
        assert_eq!(outcome.rate.and_then(|r| r.snapshot).map(|s| s.remaining), Some(4999));
        blob.assert_async().await;
    }
}
