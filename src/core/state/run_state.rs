//! Cross-invocation state for one run against one destination
//!
//! A run is driven by many short invocations. Anything one invocation must
//! hand to the next (staged blobs, the quota sleep flag, whether the
//! repository was already reset, whether the run has finished) lives here and
//! is persisted in a [`RunStateStore`](crate::adapters::state::RunStateStore).

use crate::domain::blob::BlobDescriptor;
use crate::domain::destination::DestinationKind;
use crate::domain::ids::RunId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A claimable on/off marker in [`RunState`]
///
/// Overlapping invocations race for these. The store flips a flag atomically
/// and tells exactly one caller that it won.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunFlag {
    ShouldSleep,
    RepositoryReset,
    Finished,
}

impl RunFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunFlag::ShouldSleep => "should_sleep",
            RunFlag::RepositoryReset => "repository_reset",
            RunFlag::Finished => "finished",
        }
    }
}

impl std::fmt::Display for RunFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted state of a run
///
/// # Examples
///
/// ```
/// use sitepush::core::state::RunState;
/// use sitepush::domain::{BlobDescriptor, DestinationKind, RunId};
///
/// let run_id = RunId::new("2025-01-01T00:00:00Z").unwrap();
/// let mut state = RunState::new(run_id, DestinationKind::GitHub);
///
/// state.stage_blob(BlobDescriptor::from_sha("index.html", "a1"));
/// state.stage_blob(BlobDescriptor::from_sha("index.html", "b2"));
///
/// assert_eq!(state.blobs.len(), 1);
/// assert_eq!(state.id, "github:2025-01-01T00:00:00Z");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    /// Storage key, `{destination}:{run_id}`
    pub id: String,

    pub run_id: RunId,

    pub destination: DestinationKind,

    /// Blobs created remotely but not yet committed
    #[serde(default)]
    pub blobs: Vec<BlobDescriptor>,

    /// A quota sleep was already taken for this run
    #[serde(default)]
    pub should_sleep: bool,

    /// The repository was already cleared for this run
    #[serde(default)]
    pub repository_reset: bool,

    /// When the completion event fired
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,

    pub updated_at: DateTime<Utc>,
}

impl RunState {
    /// Generate the storage key for a run and destination
    pub fn generate_id(destination: DestinationKind, run_id: &RunId) -> String {
        format!("{}:{}", destination.as_str(), run_id.as_str())
    }

    pub fn new(run_id: RunId, destination: DestinationKind) -> Self {
        Self {
            id: Self::generate_id(destination, &run_id),
            run_id,
            destination,
            blobs: Vec::new(),
            should_sleep: false,
            repository_reset: false,
            finished_at: None,
            updated_at: Utc::now(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Stages a blob for the run's tree
    ///
    /// A later blob for the same path replaces the earlier one; a tree may
    /// not contain the same path twice.
    pub fn stage_blob(&mut self, blob: BlobDescriptor) {
        match self.blobs.iter_mut().find(|b| b.path == blob.path) {
            Some(existing) => *existing = blob,
            None => self.blobs.push(blob),
        }
    }

    /// Drops exactly the given blobs after their tree was committed
    ///
    /// Blobs staged while the commit was in flight are kept for the next
    /// commit. The quota sleep may be taken again afterwards.
    pub fn remove_committed(&mut self, committed: &[BlobDescriptor]) {
        self.blobs.retain(|blob| !committed.contains(blob));
        self.should_sleep = false;
    }

    pub fn flag(&self, flag: RunFlag) -> bool {
        match flag {
            RunFlag::ShouldSleep => self.should_sleep,
            RunFlag::RepositoryReset => self.repository_reset,
            RunFlag::Finished => self.finished_at.is_some(),
        }
    }

    /// Turns a flag on; true only if it was off before
    pub fn try_set(&mut self, flag: RunFlag) -> bool {
        if self.flag(flag) {
            return false;
        }
        match flag {
            RunFlag::ShouldSleep => self.should_sleep = true,
            RunFlag::RepositoryReset => self.repository_reset = true,
            RunFlag::Finished => self.finished_at = Some(Utc::now()),
        }
        true
    }

    pub fn clear(&mut self, flag: RunFlag) {
        match flag {
            RunFlag::ShouldSleep => self.should_sleep = false,
            RunFlag::RepositoryReset => self.repository_reset = false,
            RunFlag::Finished => self.finished_at = None,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> RunState {
        RunState::new(
            RunId::new("2025-01-01T00:00:00Z").unwrap(),
            DestinationKind::GitHub,
        )
    }

    #[test]
    fn test_new_state_is_empty() {
        let state = state();
        assert!(state.blobs.is_empty());
        assert!(!state.should_sleep);
        assert!(!state.repository_reset);
        assert!(!state.is_finished());
    }

    #[test]
    fn test_stage_blob_keeps_distinct_paths() {
        let mut state = state();
        state.stage_blob(BlobDescriptor::from_sha("a.html", "1"));
        state.stage_blob(BlobDescriptor::from_sha("b.html", "2"));
        state.stage_blob(BlobDescriptor::from_sha("a.html", "3"));

        assert_eq!(state.blobs.len(), 2);
        assert_eq!(state.blobs[0].sha.as_deref(), Some("3"));
    }

    #[test]
    fn test_remove_committed_keeps_later_blobs() {
        let mut state = state();
        state.stage_blob(BlobDescriptor::from_sha("a.html", "1"));
        state.stage_blob(BlobDescriptor::from_sha("b.html", "2"));
        state.should_sleep = true;
        state.repository_reset = true;
        let committed = vec![BlobDescriptor::from_sha("a.html", "1")];

        // Re-staged while the commit was in flight
        state.stage_blob(BlobDescriptor::from_sha("a.html", "9"));
        state.remove_committed(&committed);

        assert_eq!(state.blobs.len(), 2);
        assert_eq!(state.blobs[0].sha.as_deref(), Some("9"));
        assert!(!state.should_sleep);
        assert!(state.repository_reset);
    }

    #[test]
    fn test_try_set_wins_once() {
        let mut state = state();
        for flag in [RunFlag::ShouldSleep, RunFlag::RepositoryReset, RunFlag::Finished] {
            assert!(state.try_set(flag), "{flag} should be claimable");
            assert!(!state.try_set(flag), "{flag} claimed twice");
            state.clear(flag);
            assert!(!state.flag(flag));
        }
    }

    #[test]
    fn test_finished_flag_stamps_time() {
        let mut state = state();
        state.try_set(RunFlag::Finished);
        assert!(state.is_finished());
        assert!(state.finished_at.is_some());
    }

    #[test]
    fn test_state_json_round_trip_tolerates_missing_fields() {
        let json = serde_json::json!({
            "id": "github:r1",
            "run_id": "r1",
            "destination": "github",
            "updated_at": "2025-01-01T00:00:00Z"
        });
        let state: RunState = serde_json::from_value(json).unwrap();
        assert!(state.blobs.is_empty());
        assert!(state.finished_at.is_none());
    }
}
