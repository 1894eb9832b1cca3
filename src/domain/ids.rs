//! Identifier types
//!
//! A run is addressed by the start time of the export it belongs to, so every
//! invocation of the same export resolves to the same run-state key.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Run identifier newtype wrapper
///
/// # Examples
///
/// ```
/// use sitepush::domain::ids::RunId;
/// use chrono::{TimeZone, Utc};
///
/// let start = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
/// let run_id = RunId::from_start_time(start);
/// assert_eq!(run_id.as_str(), "2025-03-01T12:00:00Z");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    /// Creates a new RunId from a string
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is empty
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Run ID cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Derives the run identifier from an export start time (RFC 3339, UTC, seconds)
    pub fn from_start_time(start: DateTime<Utc>) -> Self {
        Self(start.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    /// Returns the run ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for RunId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
