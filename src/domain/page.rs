//! Page ledger records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One crawled page of the static export
///
/// Records are created by the exporter. Deployment only ever sets
/// `last_transferred_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Ledger row identity, used as the stable selection order
    pub id: i64,

    /// Page URL
    pub url: String,

    /// Output path relative to the archive directory; empty for non-file pages
    pub file_path: Option<String>,

    /// When the file was last written to the destination
    pub last_transferred_at: Option<DateTime<Utc>>,
}

impl PageRecord {
    /// Creates a page that has never been transferred
    pub fn new(id: i64, url: impl Into<String>, file_path: Option<String>) -> Self {
        Self {
            id,
            url: url.into(),
            file_path,
            last_transferred_at: None,
        }
    }

    /// Returns the output path if the page produced a file
    pub fn file_path(&self) -> Option<&str> {
        self.file_path.as_deref().filter(|p| !p.is_empty())
    }

    /// Whether the page has an output file at all
    pub fn has_file(&self) -> bool {
        self.file_path().is_some()
    }

    /// Whether the page still has to be transferred for a run started at `start`
    ///
    /// Files written during this run are skipped; files written by an
    /// earlier run become eligible again.
    pub fn is_eligible(&self, start: DateTime<Utc>) -> bool {
        self.has_file()
            && match self.last_transferred_at {
                None => true,
                Some(at) => at < start,
            }
    }
}
