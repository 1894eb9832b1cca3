//! Page ledger abstraction
//!
//! The ledger is owned by the exporter. Deployment reads it to find pending
//! files and writes exactly one column back: `last_transferred_at`.

pub mod memory;

pub use crate::adapters::postgresql::PostgresLedger;
pub use memory::MemoryLedger;

use crate::domain::page::PageRecord;
use crate::domain::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Query and update interface over the page ledger
#[async_trait]
pub trait PageLedger: Send + Sync {
    /// Pages still to transfer for a run started at `start`, ordered by id
    ///
    /// `limit = None` returns every pending page.
    async fn pending_pages(
        &self,
        start: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<PageRecord>>;

    /// Number of pages still to transfer for a run started at `start`
    async fn count_pending(&self, start: DateTime<Utc>) -> Result<u64>;

    /// Number of pages that have an output file, regardless of status
    async fn count_with_files(&self) -> Result<u64>;

    /// Records that the page's file was written to the destination
    async fn mark_transferred(&self, page_id: i64, at: DateTime<Utc>) -> Result<()>;

    /// Checks the ledger is reachable
    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }
}
