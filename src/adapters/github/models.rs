//! Request and response bodies for the GitHub REST API

use crate::domain::blob::BlobDescriptor;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct RateLimitResponse {
    pub rate: RateWindow,
}

#[derive(Debug, Deserialize)]
pub struct RateWindow {
    pub limit: u64,
    pub remaining: u64,
    pub reset: i64,
}

#[derive(Debug, Serialize)]
pub struct CreateRepositoryRequest<'a> {
    pub name: &'a str,
    pub private: bool,
    pub auto_init: bool,
}

#[derive(Debug, Deserialize)]
pub struct RepositoryResponse {
    pub full_name: String,
    #[serde(default)]
    pub default_branch: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PutContentsRequest<'a> {
    pub message: &'a str,
    /// Base64 file content
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct CreateBlobRequest {
    pub content: String,
    pub encoding: &'static str,
}

/// Blob, tree and commit creation all answer with the new object's sha
#[derive(Debug, Deserialize)]
pub struct ShaResponse {
    pub sha: String,
}

#[derive(Debug, Serialize)]
pub struct CreateTreeRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_tree: Option<&'a str>,
    pub tree: &'a [BlobDescriptor],
}

#[derive(Debug, Serialize)]
pub struct CreateCommitRequest<'a> {
    pub message: &'a str,
    pub tree: &'a str,
    pub parents: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct RefResponse {
    pub object: GitObject,
}

#[derive(Debug, Deserialize)]
pub struct GitObject {
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub struct CommitResponse {
    pub sha: String,
    pub tree: GitObject,
}

#[derive(Debug, Serialize)]
pub struct UpdateRefRequest<'a> {
    pub sha: &'a str,
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct CreateRefRequest<'a> {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub sha: &'a str,
}

#[derive(Debug, Serialize)]
pub struct DispatchRequest<'a> {
    pub event_type: &'a str,
    pub client_payload: serde_json::Value,
}

/// Current tip of a branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchHead {
    pub commit_sha: String,
    pub tree_sha: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_request_omits_missing_base() {
        let entries = vec![BlobDescriptor::from_sha("index.html", "b1")];
        let body = serde_json::to_value(CreateTreeRequest {
            base_tree: None,
            tree: &entries,
        })
        .unwrap();
        assert!(body.get("base_tree").is_none());
        assert_eq!(body["tree"][0]["sha"], "b1");
    }

    #[test]
    fn test_create_ref_uses_ref_key() {
        let body = serde_json::to_value(CreateRefRequest {
            git_ref: "refs/heads/main".to_string(),
            sha: "c1",
        })
        .unwrap();
        assert_eq!(body["ref"], "refs/heads/main");
    }
}
