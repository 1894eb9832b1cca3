//! Git blob descriptors staged for a tree

use serde::{Deserialize, Serialize};

/// Regular, non-executable file mode
pub const FILE_MODE: &str = "100644";

/// Tree entry type for file content
pub const BLOB_TYPE: &str = "blob";

/// One file staged for inclusion in the run's tree
///
/// Serializes to the tree-entry shape the git data API expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobDescriptor {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl BlobDescriptor {
    /// Descriptor for a blob that already exists remotely
    pub fn from_sha(path: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: FILE_MODE.to_string(),
            kind: BLOB_TYPE.to_string(),
            sha: Some(sha.into()),
            content: None,
        }
    }
}
