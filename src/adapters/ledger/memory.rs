//! In-memory page ledger for tests and fixtures

use super::PageLedger;
use crate::domain::page::PageRecord;
use crate::domain::{DeployError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Page ledger held in a `BTreeMap` keyed by page id
#[derive(Debug, Default)]
pub struct MemoryLedger {
    pages: Mutex<BTreeMap<i64, PageRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a ledger from file paths, ids assigned from 1 in order
    pub fn with_files<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ledger = Self::new();
        for (idx, file) in files.into_iter().enumerate() {
            let file = file.into();
            let id = idx as i64 + 1;
            ledger.insert(PageRecord::new(id, format!("/{file}"), Some(file)));
        }
        ledger
    }

    /// Adds or replaces a record. Fixture use only; deployment never creates pages.
    pub fn insert(&self, page: PageRecord) {
        if let Ok(mut pages) = self.pages.lock() {
            pages.insert(page.id, page);
        }
    }

    /// Snapshot of a record
    pub fn get(&self, page_id: i64) -> Option<PageRecord> {
        self.pages.lock().ok()?.get(&page_id).cloned()
    }

    /// Snapshot of every record, ordered by id
    pub fn all(&self) -> Vec<PageRecord> {
        self.pages
            .lock()
            .map(|pages| pages.values().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<i64, PageRecord>>> {
        self.pages
            .lock()
            .map_err(|e| DeployError::Storage(format!("Ledger lock poisoned: {e}")))
    }
}

#[async_trait]
impl PageLedger for MemoryLedger {
    async fn pending_pages(
        &self,
        start: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<PageRecord>> {
        let pages = self.lock()?;
        let pending = pages.values().filter(|p| p.is_eligible(start)).cloned();
        Ok(match limit {
            Some(limit) => pending.take(limit).collect(),
            None => pending.collect(),
        })
    }

    async fn count_pending(&self, start: DateTime<Utc>) -> Result<u64> {
        let pages = self.lock()?;
        Ok(pages.values().filter(|p| p.is_eligible(start)).count() as u64)
    }

    async fn count_with_files(&self) -> Result<u64> {
        let pages = self.lock()?;
        Ok(pages.values().filter(|p| p.has_file()).count() as u64)
    }

    async fn mark_transferred(&self, page_id: i64, at: DateTime<Utc>) -> Result<()> {
        let mut pages = self.lock()?;
        let page = pages
            .get_mut(&page_id)
            .ok_or_else(|| DeployError::Storage(format!("Unknown page id {page_id}")))?;
        page.last_transferred_at = Some(at);
        Ok(())
    }
}
