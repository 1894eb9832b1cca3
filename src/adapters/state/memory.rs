//! In-memory run state store

use super::{missing_state, RunStateStore};
use crate::core::state::{RunFlag, RunState};
use crate::domain::blob::BlobDescriptor;
use crate::domain::{DeployError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Run state store backed by a `HashMap`
///
/// Used by tests and dry runs. State is lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    states: Mutex<HashMap<String, RunState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, RunState>>> {
        self.states
            .lock()
            .map_err(|e| DeployError::Storage(format!("State lock poisoned: {e}")))
    }

    fn modify<R>(&self, key: &str, apply: impl FnOnce(&mut RunState) -> R) -> Result<R> {
        let mut states = self.lock()?;
        let state = states.get_mut(key).ok_or_else(|| missing_state(key))?;
        let result = apply(state);
        state.touch();
        Ok(result)
    }
}

#[async_trait]
impl RunStateStore for MemoryStateStore {
    async fn load(&self, key: &str) -> Result<Option<RunState>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn insert_if_absent(&self, state: &RunState) -> Result<RunState> {
        let mut states = self.lock()?;
        Ok(states
            .entry(state.id.clone())
            .or_insert_with(|| state.clone())
            .clone())
    }

    async fn stage_blob(&self, key: &str, blob: &BlobDescriptor) -> Result<()> {
        self.modify(key, |state| state.stage_blob(blob.clone()))
    }

    async fn remove_committed(&self, key: &str, committed: &[BlobDescriptor]) -> Result<()> {
        self.modify(key, |state| state.remove_committed(committed))
    }

    async fn try_set_flag(&self, key: &str, flag: RunFlag) -> Result<bool> {
        self.modify(key, |state| state.try_set(flag))
    }

    async fn clear_flag(&self, key: &str, flag: RunFlag) -> Result<()> {
        self.modify(key, |state| state.clear(flag))
    }

    async fn list(&self) -> Result<Vec<RunState>> {
        let mut all: Vec<RunState> = self.lock()?.values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all)
    }
}
