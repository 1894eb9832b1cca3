//! State manager for run state persistence

use crate::adapters::state::{missing_state, RunStateStore};
use crate::core::state::run_state::{RunFlag, RunState};
use crate::domain::blob::BlobDescriptor;
use crate::domain::destination::DestinationKind;
use crate::domain::ids::RunId;
use crate::domain::Result;
use std::sync::Arc;

/// Reads [`RunState`] and opens [`RunHandle`]s over a pluggable store
#[derive(Clone)]
pub struct StateManager {
    storage: Arc<dyn RunStateStore>,
}

impl StateManager {
    pub fn new(storage: Arc<dyn RunStateStore>) -> Self {
        Self { storage }
    }

    /// Load the state for a run, if any invocation has created one
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails for reasons other than "not found".
    pub async fn load(
        &self,
        run_id: &RunId,
        destination: DestinationKind,
    ) -> Result<Option<RunState>> {
        let key = RunState::generate_id(destination, run_id);
        self.storage.load(&key).await
    }

    /// Create the run's state row on first use and return a handle to it
    /// along with its current contents
    pub async fn open(
        &self,
        run_id: &RunId,
        destination: DestinationKind,
    ) -> Result<(RunHandle, RunState)> {
        let fresh = RunState::new(run_id.clone(), destination);
        let current = self.storage.insert_if_absent(&fresh).await?;
        tracing::debug!(
            run_id = %run_id,
            destination = %destination,
            staged_blobs = current.blobs.len(),
            should_sleep = current.should_sleep,
            "Run state opened"
        );

        let handle = RunHandle {
            storage: Arc::clone(&self.storage),
            key: current.id.clone(),
        };
        Ok((handle, current))
    }
}

/// Atomic operations on one run's stored state
///
/// Every call goes straight to the store. Nothing is cached, so a handle
/// never holds a stale copy another invocation could be racing with.
#[derive(Clone)]
pub struct RunHandle {
    storage: Arc<dyn RunStateStore>,
    key: String,
}

impl RunHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current stored state
    pub async fn snapshot(&self) -> Result<RunState> {
        self.storage
            .load(&self.key)
            .await?
            .ok_or_else(|| missing_state(&self.key))
    }

    pub async fn stage_blob(&self, blob: &BlobDescriptor) -> Result<()> {
        self.storage.stage_blob(&self.key, blob).await
    }

    pub async fn remove_committed(&self, committed: &[BlobDescriptor]) -> Result<()> {
        self.storage.remove_committed(&self.key, committed).await
    }

    /// Claim a flag for this invocation
    ///
    /// Returns `false` if another invocation already holds it.
    pub async fn try_claim(&self, flag: RunFlag) -> Result<bool> {
        let claimed = self.storage.try_set_flag(&self.key, flag).await?;
        tracing::debug!(run_state_id = %self.key, %flag, claimed, "Run flag claim");
        Ok(claimed)
    }

    /// Give a claimed flag back after the guarded work failed
    pub async fn release(&self, flag: RunFlag) -> Result<()> {
        self.storage.clear_flag(&self.key, flag).await
    }
}

/// A handle over a fresh in-memory store
#[cfg(test)]
pub(crate) async fn test_handle(destination: DestinationKind) -> RunHandle {
    use crate::adapters::state::MemoryStateStore;

    let manager = StateManager::new(Arc::new(MemoryStateStore::new()));
    let run_id = RunId::new("2025-01-01T00:00:00Z").unwrap();
    manager.open(&run_id, destination).await.unwrap().0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::state::MemoryStateStore;

    #[tokio::test]
    async fn test_open_then_stage_round_trip() {
        let manager = StateManager::new(Arc::new(MemoryStateStore::new()));
        let run_id = RunId::new("r1").unwrap();

        let (handle, state) = manager.open(&run_id, DestinationKind::GitHub).await.unwrap();
        assert!(state.blobs.is_empty());

        handle
            .stage_blob(&BlobDescriptor::from_sha("index.html", "abc"))
            .await
            .unwrap();

        let loaded = manager
            .load(&run_id, DestinationKind::GitHub)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.blobs.len(), 1);
    }

    #[tokio::test]
    async fn test_second_open_sees_first_handles_writes() {
        let manager = StateManager::new(Arc::new(MemoryStateStore::new()));
        let run_id = RunId::new("r1").unwrap();

        let (first, _) = manager.open(&run_id, DestinationKind::GitHub).await.unwrap();
        assert!(first.try_claim(RunFlag::RepositoryReset).await.unwrap());

        let (second, state) = manager.open(&run_id, DestinationKind::GitHub).await.unwrap();
        assert!(state.repository_reset);
        assert!(!second.try_claim(RunFlag::RepositoryReset).await.unwrap());
    }

    #[tokio::test]
    async fn test_state_is_scoped_by_destination() {
        let manager = StateManager::new(Arc::new(MemoryStateStore::new()));
        let run_id = RunId::new("r1").unwrap();

        let (handle, _) = manager.open(&run_id, DestinationKind::GitHub).await.unwrap();
        handle.try_claim(RunFlag::Finished).await.unwrap();

        assert!(manager
            .load(&run_id, DestinationKind::Bunny)
            .await
            .unwrap()
            .is_none());
    }
}
