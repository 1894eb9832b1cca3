//! Remote API quota snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Quota reported by a rate-limited API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    /// Requests left in the current window
    pub remaining: u64,
    /// Requests allowed per window
    pub limit: u64,
    /// Unix time at which the window resets
    pub reset_epoch: i64,
}

impl RateLimitSnapshot {
    /// Whether the window cannot cover `requests` more calls
    pub fn is_short_for(&self, requests: usize) -> bool {
        self.remaining < requests as u64
    }

    /// Seconds until the window resets, never negative
    pub fn seconds_until_reset(&self, now: DateTime<Utc>) -> u64 {
        let wait = self.reset_epoch - now.timestamp();
        u64::try_from(wait).unwrap_or(0)
    }
}
