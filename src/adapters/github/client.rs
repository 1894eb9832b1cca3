//! GitHub REST client for the git data API
//!
//! Stateless: every call is an authenticated request against one repository.
//! Blob, tree and commit creation follow the low-level git data protocol so a
//! whole export lands as a single commit.

use crate::adapters::github::models::{
    BranchHead, CommitResponse, CreateBlobRequest, CreateCommitRequest, CreateRefRequest,
    CreateRepositoryRequest, CreateTreeRequest, DispatchRequest, PutContentsRequest,
    RateLimitResponse, RefResponse, RepositoryResponse, ShaResponse, UpdateRefRequest,
};
use crate::adapters::http::{build_client, error_for_status, retry_request};
use crate::config::schema::{AccountType, GitHubConfig, RetryConfig};
use crate::config::SecretString;
use crate::domain::blob::BlobDescriptor;
use crate::domain::errors::BackendError;
use crate::domain::rate::RateLimitSnapshot;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, Response};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Serialize;

const ACCEPT_JSON: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

/// File seeded into new repositories so the default branch exists
pub const MARKER_FILE: &str = "sitepush.txt";
const MARKER_CONTENT: &str = "This repository is deployed by sitepush.\n";

/// Client for one repository
pub struct GitHubClient {
    client: Client,
    api_base_url: String,
    owner: String,
    repository: String,
    branch: String,
    account_type: AccountType,
    private: bool,
    token: SecretString,
    retry: RetryConfig,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Result<Self, BackendError> {
        Ok(Self {
            client: build_client(config.timeout_seconds)?,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            owner: config.owner.clone(),
            repository: config.repository.clone(),
            branch: config.branch.clone(),
            account_type: config.account_type,
            private: config.private,
            token: config.personal_access_token.clone(),
            retry: config.retry.clone(),
        })
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repository)
    }

    pub fn account_type(&self) -> AccountType {
        self.account_type
    }

    fn repo_path(&self, suffix: &str) -> String {
        format!("/repos/{}/{}{}", self.owner, self.repository, suffix)
    }

    fn auth_header_value(&self) -> String {
        format!("Bearer {}", self.token.expose_secret().as_str())
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Response, BackendError> {
        let url = format!("{}{}", self.api_base_url, path);

        retry_request(&self.retry, || async {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .header(AUTHORIZATION, self.auth_header_value())
                .header(ACCEPT, ACCEPT_JSON)
                .header("X-GitHub-Api-Version", API_VERSION);
            if let Some(ref body) = body {
                request = request.json(body);
            }
            let response = request.send().await?;
            error_for_status(response).await
        })
        .await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, BackendError> {
        let response = self.send(method, path, body).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::InvalidResponse(format!("{path}: {e}")))
    }

    /// Current core API quota
    pub async fn rate_limit(&self) -> Result<RateLimitSnapshot, BackendError> {
        let response: RateLimitResponse = self.send_json(Method::GET, "/rate_limit", None).await?;
        Ok(RateLimitSnapshot {
            remaining: response.rate.remaining,
            limit: response.rate.limit,
            reset_epoch: response.rate.reset,
        })
    }

    pub async fn repository_exists(&self) -> Result<bool, BackendError> {
        match self
            .send_json::<RepositoryResponse>(Method::GET, &self.repo_path(""), None)
            .await
        {
            Ok(repo) => {
                tracing::debug!(repository = %repo.full_name, "Repository found");
                Ok(true)
            }
            Err(BackendError::ClientError { status: 404, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Create the repository under the token's user or the organization
    pub async fn create_repository(&self) -> Result<(), BackendError> {
        let body = to_body(&CreateRepositoryRequest {
            name: &self.repository,
            private: self.private,
            auto_init: false,
        })?;
        let path = match self.account_type {
            AccountType::Personal => "/user/repos".to_string(),
            AccountType::Organization => format!("/orgs/{}/repos", self.owner),
        };
        self.send(Method::POST, &path, Some(body)).await?;
        tracing::info!(repository = %self.full_name(), "Repository created");
        Ok(())
    }

    /// Delete the repository; a missing repository is not an error
    pub async fn delete_repository(&self) -> Result<(), BackendError> {
        match self.send(Method::DELETE, &self.repo_path(""), None).await {
            Ok(_) | Err(BackendError::ClientError { status: 404, .. }) => {
                tracing::info!(repository = %self.full_name(), "Repository deleted");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Seed the marker file, which also creates the default branch
    pub async fn add_marker_file(&self) -> Result<(), BackendError> {
        let body = to_body(&PutContentsRequest {
            message: "Initialize repository",
            content: STANDARD.encode(MARKER_CONTENT),
        })?;
        let path = self.repo_path(&format!("/contents/{MARKER_FILE}"));
        self.send(Method::PUT, &path, Some(body)).await?;
        Ok(())
    }

    /// Upload file content as a blob and return its sha
    pub async fn create_blob(&self, content: &[u8]) -> Result<String, BackendError> {
        let body = to_body(&CreateBlobRequest {
            content: STANDARD.encode(content),
            encoding: "base64",
        })?;
        let response: ShaResponse = self
            .send_json(Method::POST, &self.repo_path("/git/blobs"), Some(body))
            .await?;
        Ok(response.sha)
    }

    /// Tip of the configured branch, or `None` while it does not exist
    pub async fn branch_head(&self) -> Result<Option<BranchHead>, BackendError> {
        let path = self.repo_path(&format!("/git/ref/heads/{}", self.branch));
        let reference: RefResponse = match self.send_json(Method::GET, &path, None).await {
            Ok(reference) => reference,
            // 409 is returned for a repository with no commits
            Err(BackendError::ClientError {
                status: 404 | 409, ..
            }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let commit_path = self.repo_path(&format!("/git/commits/{}", reference.object.sha));
        let commit: CommitResponse = self.send_json(Method::GET, &commit_path, None).await?;
        Ok(Some(BranchHead {
            commit_sha: commit.sha,
            tree_sha: commit.tree.sha,
        }))
    }

    pub async fn create_tree(
        &self,
        base_tree: Option<&str>,
        entries: &[BlobDescriptor],
    ) -> Result<String, BackendError> {
        let body = to_body(&CreateTreeRequest {
            base_tree,
            tree: entries,
        })?;
        let response: ShaResponse = self
            .send_json(Method::POST, &self.repo_path("/git/trees"), Some(body))
            .await?;
        Ok(response.sha)
    }

    pub async fn create_commit(
        &self,
        message: &str,
        tree_sha: &str,
        parents: Vec<&str>,
    ) -> Result<String, BackendError> {
        let body = to_body(&CreateCommitRequest {
            message,
            tree: tree_sha,
            parents,
        })?;
        let response: ShaResponse = self
            .send_json(Method::POST, &self.repo_path("/git/commits"), Some(body))
            .await?;
        Ok(response.sha)
    }

    pub async fn update_ref(&self, commit_sha: &str) -> Result<(), BackendError> {
        let body = to_body(&UpdateRefRequest {
            sha: commit_sha,
            force: false,
        })?;
        let path = self.repo_path(&format!("/git/refs/heads/{}", self.branch));
        self.send(Method::PATCH, &path, Some(body)).await?;
        Ok(())
    }

    pub async fn create_ref(&self, commit_sha: &str) -> Result<(), BackendError> {
        let body = to_body(&CreateRefRequest {
            git_ref: format!("refs/heads/{}", self.branch),
            sha: commit_sha,
        })?;
        self.send(Method::POST, &self.repo_path("/git/refs"), Some(body))
            .await?;
        Ok(())
    }

    /// Build one tree from `entries` on top of the branch tip, commit it and
    /// move the branch
    ///
    /// Returns the new commit sha. Any failure is reported as
    /// [`BackendError::Finalization`].
    pub async fn commit_tree(
        &self,
        entries: &[BlobDescriptor],
        message: &str,
    ) -> Result<String, BackendError> {
        self.try_commit_tree(entries, message)
            .await
            .map_err(|e| BackendError::Finalization(e.to_string()))
    }

    async fn try_commit_tree(
        &self,
        entries: &[BlobDescriptor],
        message: &str,
    ) -> Result<String, BackendError> {
        let head = self.branch_head().await?;
        let base_tree = head.as_ref().map(|h| h.tree_sha.as_str());
        let tree_sha = self.create_tree(base_tree, entries).await?;

        let parents = head.iter().map(|h| h.commit_sha.as_str()).collect();
        let commit_sha = self.create_commit(message, &tree_sha, parents).await?;

        if head.is_some() {
            self.update_ref(&commit_sha).await?;
        } else {
            self.create_ref(&commit_sha).await?;
        }

        tracing::info!(
            repository = %self.full_name(),
            branch = %self.branch,
            commit = %commit_sha,
            files = entries.len(),
            "Commit created"
        );
        Ok(commit_sha)
    }

    /// Send a `repository_dispatch` event
    pub async fn dispatch(
        &self,
        event_type: &str,
        client_payload: serde_json::Value,
    ) -> Result<(), BackendError> {
        let body = to_body(&DispatchRequest {
            event_type,
            client_payload,
        })?;
        self.send(Method::POST, &self.repo_path("/dispatches"), Some(body))
            .await?;
        Ok(())
    }
}

fn to_body<T: Serialize>(value: &T) -> Result<serde_json::Value, BackendError> {
    serde_json::to_value(value).map_err(|e| BackendError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;
    use mockito::Matcher;
    use serde_json::json;

    fn config(base: &str) -> GitHubConfig {
        GitHubConfig {
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
            repository_dispatch: true,
            timeout_seconds: 5,
            retry: RetryConfig {
                max_retries: 0,
                initial_delay_ms: 1,
                max_delay_ms: 1,
                backoff_multiplier: 1.0,
            },
        }
    }

    #[tokio::test]
    async fn test_rate_limit() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/rate_limit")
            .match_header("authorization", "Bearer ghp_test")
            .with_body(r#"{"resources":{},"rate":{"limit":5000,"remaining":42,"reset":1700000000,"used":4958}}"#)
            .create_async()
            .await;

        let client = GitHubClient::new(&config(&server.url())).unwrap();
        let snapshot = client.rate_limit().await.unwrap();
        assert_eq!(snapshot.remaining, 42);
        assert_eq!(snapshot.limit, 5000);
        assert_eq!(snapshot.reset_epoch, 1_700_000_000);
    }

    #[tokio::test]
    async fn test_repository_exists_false_on_404() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/octo/site")
            .with_status(404)
            .with_body(r#"{"message":"Not Found"}"#)
            .create_async()
            .await;

        let client = GitHubClient::new(&config(&server.url())).unwrap();
        assert!(!client.repository_exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_create_blob_sends_base64() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/octo/site/git/blobs")
            .match_body(Matcher::Json(json!({
                "content": "PGgxPmhpPC9oMT4=",
                "encoding": "base64"
            })))
            .with_status(201)
            .with_body(r#"{"sha":"blob1","url":"x"}"#)
            .create_async()
            .await;

        let client = GitHubClient::new(&config(&server.url())).unwrap();
        assert_eq!(client.create_blob(b"<h1>hi</h1>").await.unwrap(), "blob1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_commit_tree_on_existing_branch() {
        let mut server = mockito::Server::new_async().await;
        let _head = server
            .mock("GET", "/repos/octo/site/git/ref/heads/main")
            .with_body(r#"{"ref":"refs/heads/main","object":{"sha":"c0","type":"commit"}}"#)
            .create_async()
            .await;
        let _commit = server
            .mock("GET", "/repos/octo/site/git/commits/c0")
            .with_body(r#"{"sha":"c0","tree":{"sha":"t0"}}"#)
            .create_async()
            .await;
        let tree = server
            .mock("POST", "/repos/octo/site/git/trees")
            .match_body(Matcher::PartialJson(json!({"base_tree": "t0"})))
            .with_status(201)
            .with_body(r#"{"sha":"t1"}"#)
            .create_async()
            .await;
        let new_commit = server
            .mock("POST", "/repos/octo/site/git/commits")
            .match_body(Matcher::Json(json!({
                "message": "Updated/Added site",
                "tree": "t1",
                "parents": ["c0"]
            })))
            .with_status(201)
            .with_body(r#"{"sha":"c1"}"#)
            .create_async()
            .await;
        let update = server
            .mock("PATCH", "/repos/octo/site/git/refs/heads/main")
            .match_body(Matcher::Json(json!({"sha": "c1", "force": false})))
            .with_body(r#"{"ref":"refs/heads/main","object":{"sha":"c1"}}"#)
            .create_async()
            .await;

        let client = GitHubClient::new(&config(&server.url())).unwrap();
        let entries = vec![
            BlobDescriptor::from_sha("index.html", "b1"),
            BlobDescriptor::from_sha("blog/index.html", "b2"),
        ];
        let sha = client
            .commit_tree(&entries, "Updated/Added site")
            .await
            .unwrap();

        assert_eq!(sha, "c1");
        tree.assert_async().await;
        new_commit.assert_async().await;
        update.assert_async().await;
    }

    #[tokio::test]
    async fn test_commit_tree_creates_missing_branch() {
        let mut server = mockito::Server::new_async().await;
        let _head = server
            .mock("GET", "/repos/octo/site/git/ref/heads/main")
            .with_status(409)
            .with_body(r#"{"message":"Git Repository is empty."}"#)
            .create_async()
            .await;
        let _tree = server
            .mock("POST", "/repos/octo/site/git/trees")
            .with_status(201)
            .with_body(r#"{"sha":"t1"}"#)
            .create_async()
            .await;
        let _commit = server
            .mock("POST", "/repos/octo/site/git/commits")
            .match_body(Matcher::PartialJson(json!({"parents": []})))
            .with_status(201)
            .with_body(r#"{"sha":"c1"}"#)
            .create_async()
            .await;
        let create_ref = server
            .mock("POST", "/repos/octo/site/git/refs")
            .match_body(Matcher::Json(json!({"ref": "refs/heads/main", "sha": "c1"})))
            .with_status(201)
            .with_body(r#"{"ref":"refs/heads/main","object":{"sha":"c1"}}"#)
            .create_async()
            .await;

        let client = GitHubClient::new(&config(&server.url())).unwrap();
        let entries = vec![BlobDescriptor::from_sha("index.html", "b1")];
        assert_eq!(client.commit_tree(&entries, "init").await.unwrap(), "c1");
        create_ref.assert_async().await;
    }

    #[tokio::test]
    async fn test_commit_tree_failure_is_finalization_error() {
        let mut server = mockito::Server::new_async().await;
        let _head = server
            .mock("GET", "/repos/octo/site/git/ref/heads/main")
            .with_status(409)
            .create_async()
            .await;
        let _tree = server
            .mock("POST", "/repos/octo/site/git/trees")
            .with_status(422)
            .with_body(r#"{"message":"tree.sha is not a valid blob"}"#)
            .create_async()
            .await;

        let client = GitHubClient::new(&config(&server.url())).unwrap();
        let entries = vec![BlobDescriptor::from_sha("index.html", "bad")];
        let err = client.commit_tree(&entries, "init").await.unwrap_err();
        assert!(matches!(err, BackendError::Finalization(_)));
    }

    #[tokio::test]
    async fn test_dispatch() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/octo/site/dispatches")
            .match_body(Matcher::PartialJson(json!({"event_type": "repository dispatch"})))
            .with_status(204)
            .create_async()
            .await;

        let client = GitHubClient::new(&config(&server.url())).unwrap();
        client
            .dispatch("repository dispatch", json!({"archive_name": "site"}))
            .await
            .unwrap();
        mock.assert_async().await;
    }
}
