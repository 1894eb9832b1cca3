//! Remote API quota governor
//!
//! Before a rate-limited backend transfers a batch it asks the governor
//! whether the remaining quota covers the batch. If it does not, the
//! invocation waits for the quota window to reset, at most once per run.
//! The wait is claimed in the run state before sleeping, so of several
//! overlapping invocations only one sleeps.

use crate::adapters::github::GitHubClient;
use crate::core::state::{RunFlag, RunHandle};
use crate::domain::errors::BackendError;
use crate::domain::rate::RateLimitSnapshot;
use crate::domain::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Anything that can report its current quota
#[async_trait]
pub trait QuotaSource: Send + Sync {
    async fn quota(&self) -> std::result::Result<RateLimitSnapshot, BackendError>;
}

#[async_trait]
impl QuotaSource for GitHubClient {
    async fn quota(&self) -> std::result::Result<RateLimitSnapshot, BackendError> {
        self.rate_limit().await
    }
}

/// Result of a quota check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateCheck {
    /// Quota seen before any wait; `None` when the query failed
    pub snapshot: Option<RateLimitSnapshot>,
    pub slept_seconds: u64,
}

pub struct RateGovernor {
    source: Arc<dyn QuotaSource>,
}

impl RateGovernor {
    pub fn new(source: Arc<dyn QuotaSource>) -> Self {
        Self { source }
    }

    /// Check the quota for `requests` calls, waiting for the reset if needed
    ///
    /// # Errors
    ///
    /// Fails only if the sleep claim cannot be written. A failed quota query
    /// is logged and treated as "no wait".
    pub async fn check(&self, requests: usize, state: &RunHandle) -> Result<RateCheck> {
        let snapshot = match self.source.quota().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "Rate limit query failed, continuing without wait");
                return Ok(RateCheck::default());
            }
        };

        let no_wait = RateCheck {
            snapshot: Some(snapshot),
            slept_seconds: 0,
        };
        if !snapshot.is_short_for(requests) {
            return Ok(no_wait);
        }
        if !state.try_claim(RunFlag::ShouldSleep).await? {
            tracing::debug!(
                run_state_id = %state.key(),
                remaining = snapshot.remaining,
                "Quota wait already taken for this run"
            );
            return Ok(no_wait);
        }

        let wait = snapshot.seconds_until_reset(Utc::now());
        tracing::info!(
            run_state_id = %state.key(),
            remaining = snapshot.remaining,
            requests,
            wait_seconds = wait,
            "API quota too low for batch, waiting for reset"
        );
        tokio::time::sleep(Duration::from_secs(wait)).await;

        Ok(RateCheck {
            snapshot: Some(snapshot),
            slept_seconds: wait,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::manager::test_handle;
    use crate::domain::destination::DestinationKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedQuota {
        remaining: u64,
        reset_in: i64,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QuotaSource for FixedQuota {
        async fn quota(&self) -> std::result::Result<RateLimitSnapshot, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RateLimitSnapshot {
                remaining: self.remaining,
                limit: 5000,
                reset_epoch: Utc::now().timestamp() + self.reset_in,
            })
        }
    }

    struct BrokenQuota;

    #[async_trait]
    impl QuotaSource for BrokenQuota {
        async fn quota(&self) -> std::result::Result<RateLimitSnapshot, BackendError> {
            Err(BackendError::ConnectionFailed("timeout".to_string()))
        }
    }

    fn governor(remaining: u64, reset_in: i64) -> RateGovernor {
        RateGovernor::new(Arc::new(FixedQuota {
            remaining,
            reset_in,
            calls: AtomicUsize::new(0),
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_once_when_quota_is_short() {
        let governor = governor(3, 120);
        let state = test_handle(DestinationKind::GitHub).await;

        let first = governor.check(50, &state).await.unwrap();
        assert!(first.slept_seconds >= 119);
        assert!(state.snapshot().await.unwrap().should_sleep);

        let second = governor.check(50, &state).await.unwrap();
        assert_eq!(second.slept_seconds, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_checks_sleep_once() {
        let governor = governor(0, 100);
        let state = test_handle(DestinationKind::GitHub).await;
        let other = state.clone();

        let (a, b) = tokio::join!(governor.check(2, &state), governor.check(2, &other));
        let mut slept = [a.unwrap().slept_seconds, b.unwrap().slept_seconds];
        slept.sort_unstable();

        assert_eq!(slept[0], 0);
        assert!(slept[1] >= 99);
    }

    #[tokio::test]
    async fn test_no_wait_when_quota_covers_batch() {
        let governor = governor(4000, 120);
        let state = test_handle(DestinationKind::GitHub).await;

        let check = governor.check(50, &state).await.unwrap();
        assert_eq!(check.slept_seconds, 0);
        assert_eq!(check.snapshot.map(|s| s.remaining), Some(4000));
        assert!(!state.snapshot().await.unwrap().should_sleep);
    }

    #[tokio::test]
    async fn test_failed_query_means_no_wait() {
        let governor = RateGovernor::new(Arc::new(BrokenQuota));
        let state = test_handle(DestinationKind::GitHub).await;

        let check = governor.check(50, &state).await.unwrap();
        assert_eq!(check, RateCheck::default());
        assert!(!state.snapshot().await.unwrap().should_sleep);
    }
}
