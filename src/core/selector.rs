//! Batch selection over the page ledger

use crate::adapters::ledger::PageLedger;
use crate::domain::page::PageRecord;
use crate::domain::run::RunContext;
use crate::domain::Result;

/// Next batch of pending pages and the run's progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Pending pages in ledger order, at most the requested batch size
    pub batch: Vec<PageRecord>,
    /// Every page still pending, not just this batch
    pub pages_remaining: u64,
    /// Every page with an output file, regardless of status
    pub total_pages: u64,
}

impl Selection {
    pub fn pages_processed(&self) -> u64 {
        self.total_pages.saturating_sub(self.pages_remaining)
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }
}

/// Select the next batch for a run
///
/// `batch_size = None` selects every pending page. Read-only.
pub async fn select_batch(
    ledger: &dyn PageLedger,
    run: &RunContext,
    batch_size: Option<usize>,
) -> Result<Selection> {
    let start = run.archive_start_time;
    let batch = ledger.pending_pages(start, batch_size).await?;
    let pages_remaining = ledger.count_pending(start).await?;
    let total_pages = ledger.count_with_files().await?;

    tracing::debug!(
        run_id = %run.run_id,
        batch = batch.len(),
        pages_remaining,
        total_pages,
        "Batch selected"
    );

    Ok(Selection {
        batch,
        pages_remaining,
        total_pages,
    })
}
