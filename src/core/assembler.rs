//! Tree assembly across invocations
//!
//! Each invocation turns its files into remote blobs and stages the
//! descriptors in the run state as soon as each blob exists. Once the run
//! drains, the staged list becomes one tree and one commit.

use crate::adapters::github::GitHubClient;
use crate::adapters::s3::join_key;
use crate::core::state::RunHandle;
use crate::domain::blob::BlobDescriptor;
use crate::domain::run::RunContext;
use crate::domain::Result;
use std::sync::Arc;

pub struct TreeAssembler {
    client: Arc<GitHubClient>,
    folder: Option<String>,
}

impl TreeAssembler {
    pub fn new(client: Arc<GitHubClient>, folder: Option<String>) -> Self {
        Self { client, folder }
    }

    /// Path of a ledger file inside the repository
    pub fn repository_path(&self, run: &RunContext, file_path: &str) -> String {
        join_key(self.folder.as_deref(), run.relative_path(file_path))
    }

    /// Create a blob for `content` and stage it at `path`
    ///
    /// # Errors
    ///
    /// [`DeployError::Backend`](crate::domain::DeployError::Backend) when the
    /// blob cannot be created, any other variant when it cannot be staged.
    pub async fn stage(
        &self,
        state: &RunHandle,
        path: &str,
        content: &[u8],
    ) -> Result<BlobDescriptor> {
        let sha = self.client.create_blob(content).await?;
        let blob = BlobDescriptor::from_sha(path, sha);
        state.stage_blob(&blob).await?;
        Ok(blob)
    }

    /// Commit every staged blob, returning the commit sha
    ///
    /// Returns `None` when nothing is staged. Only the committed blobs are
    /// removed, and only after the branch has moved, so a failed commit can be
    /// retried and blobs staged meanwhile wait for the next one.
    pub async fn finalize(&self, state: &RunHandle, message: &str) -> Result<Option<String>> {
        let staged = state.snapshot().await?.blobs;
        if staged.is_empty() {
            return Ok(None);
        }

        let commit_sha = self.client.commit_tree(&staged, message).await?;
        state.remove_committed(&staged).await?;
        Ok(Some(commit_sha))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{AccountType, GitHubConfig, RetryConfig};
    use crate::config::secret_string;
    use crate::core::state::manager::test_handle;
    use crate::domain::destination::DestinationKind;
    use crate::domain::errors::BackendError;
    use crate::domain::run::ExportKind;
    use crate::domain::DeployError;
    use chrono::Utc;

    fn client(base: &str) -> Arc<GitHubClient> {
        let config = GitHubConfig {
            account_type: AccountType::Personal,
            owner: "octo".to_string(),
            repository: "site".to_string(),
            personal_access_token: secret_string("ghp_test".to_string()),
            branch: "main".to_string(),
            folder_path: None,
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
        };
        Arc::new(GitHubClient::new(&config).unwrap())
    }

    #[test]
    fn test_repository_path_applies_folder() {
        let assembler = TreeAssembler::new(client("http://localhost"), Some("/docs/".to_string()));
        let run = RunContext::new(Utc::now(), "/var/export", "site", ExportKind::Full);
        assert_eq!(
            assembler.repository_path(&run, "/var/export//blog/index.html"),
            "docs/blog/index.html"
        );
    }

    #[tokio::test]
    async fn test_finalize_with_nothing_staged_is_noop() {
        let assembler = TreeAssembler::new(client("http://localhost:1"), None);
        let state = test_handle(DestinationKind::GitHub).await;
        assert_eq!(assembler.finalize(&state, "msg").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_staged_blobs() {
        let mut server = mockito::Server::new_async().await;
        let _head = server
            .mock("GET", "/repos/octo/site/git/ref/heads/main")
            .with_status(500)
            .create_async()
            .await;

        let assembler = TreeAssembler::new(client(&server.url()), None);
        let state = test_handle(DestinationKind::GitHub).await;
        state
            .stage_blob(&BlobDescriptor::from_sha("index.html", "b1"))
            .await
            .unwrap();

        let err = assembler.finalize(&state, "msg").await.unwrap_err();
        assert!(matches!(
            err,
            DeployError::Backend(BackendError::Finalization(_))
        ));
        assert_eq!(state.snapshot().await.unwrap().blobs.len(), 1);
    }

    #[tokio::test]
    async fn test_stage_creates_blob() {
        let mut server = mockito::Server::new_async().await;
        let _blob = server
            .mock("POST", "/repos/octo/site/git/blobs")
            .with_status(201)
            .with_body(r#"{"sha":"b1"}"#)
            .create_async()
            .await;

        let assembler = TreeAssembler::new(client(&server.url()), None);
        let state = test_handle(DestinationKind::GitHub).await;
        let blob = assembler.stage(&state, "index.html", b"home").await.unwrap();

        assert_eq!(blob.sha.as_deref(), Some("b1"));
        assert_eq!(state.snapshot().await.unwrap().blobs, vec![blob]);
    }
}
