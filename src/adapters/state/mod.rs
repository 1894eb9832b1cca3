//! Run state storage abstraction
//!
//! Keyed, durable storage for [`RunState`] documents, addressed by
//! `{destination}:{run_id}`. Invocations of the same run may overlap, so
//! every write is a single atomic read-modify-write on the stored row.
//! Nothing ever writes back a whole document loaded earlier.

pub mod memory;

pub use crate::adapters::postgresql::PostgresStateStore;
pub use memory::MemoryStateStore;

use crate::core::state::{RunFlag, RunState};
use crate::domain::blob::BlobDescriptor;
use crate::domain::{DeployError, Result};
use async_trait::async_trait;

/// State storage trait for run state persistence
#[async_trait]
pub trait RunStateStore: Send + Sync {
    /// Load a run state by key
    ///
    /// # Returns
    ///
    /// Returns `Ok(Some(RunState))` if found, `Ok(None)` if not found.
    async fn load(&self, key: &str) -> Result<Option<RunState>>;

    /// Store `state` unless a row with its `id` exists, then return the
    /// stored row
    async fn insert_if_absent(&self, state: &RunState) -> Result<RunState>;

    /// Add a blob to the run, replacing any staged blob for the same path
    async fn stage_blob(&self, key: &str, blob: &BlobDescriptor) -> Result<()>;

    /// Remove exactly `committed` from the staged blobs and clear the
    /// sleep flag
    async fn remove_committed(&self, key: &str, committed: &[BlobDescriptor]) -> Result<()>;

    /// Turn a flag on
    ///
    /// # Returns
    ///
    /// `true` only for the caller that switched it from off to on.
    async fn try_set_flag(&self, key: &str, flag: RunFlag) -> Result<bool>;

    async fn clear_flag(&self, key: &str, flag: RunFlag) -> Result<()>;

    /// Every stored run state, most recently updated first
    async fn list(&self) -> Result<Vec<RunState>>;
}

pub(crate) fn missing_state(key: &str) -> DeployError {
    DeployError::Storage(format!("Run state {key} not found"))
}
