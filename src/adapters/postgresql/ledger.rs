//! PostgreSQL page ledger

use crate::adapters::ledger::PageLedger;
use crate::adapters::postgresql::client::PostgresClient;
use crate::domain::page::PageRecord;
use crate::domain::{DeployError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_postgres::Row;

/// Eligible pages for a run started at `$1`
const PENDING_FILTER: &str = "file_path IS NOT NULL AND file_path <> '' \
     AND (last_transferred_at IS NULL OR last_transferred_at < $1)";

/// Page ledger stored in a PostgreSQL table
pub struct PostgresLedger {
    client: Arc<PostgresClient>,
    table: String,
}

impl PostgresLedger {
    /// `table` must already be validated as a plain identifier
    pub fn new(client: Arc<PostgresClient>, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }
}

fn page_from_row(row: &Row) -> Result<PageRecord> {
    Ok(PageRecord {
        id: row
            .try_get("id")
            .map_err(|e| DeployError::Storage(format!("Invalid page row: {e}")))?,
        url: row
            .try_get("url")
            .map_err(|e| DeployError::Storage(format!("Invalid page row: {e}")))?,
        file_path: row
            .try_get("file_path")
            .map_err(|e| DeployError::Storage(format!("Invalid page row: {e}")))?,
        last_transferred_at: row
            .try_get("last_transferred_at")
            .map_err(|e| DeployError::Storage(format!("Invalid page row: {e}")))?,
    })
}

#[async_trait]
impl PageLedger for PostgresLedger {
    async fn pending_pages(
        &self,
        start: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<PageRecord>> {
        let rows = match limit {
            Some(limit) => {
                let query = format!(
                    "SELECT id, url, file_path, last_transferred_at FROM {} WHERE {} \
                     ORDER BY id LIMIT $2",
                    self.table,
                    PENDING_FILTER
                );
                let limit = limit as i64;
                self.client.query(&query, &[&start, &limit]).await?
            }
            None => {
                let query = format!(
                    "SELECT id, url, file_path, last_transferred_at FROM {} WHERE {} ORDER BY id",
                    self.table,
                    PENDING_FILTER
                );
                self.client.query(&query, &[&start]).await?
            }
        };

        rows.iter().map(page_from_row).collect()
    }

    async fn count_pending(&self, start: DateTime<Utc>) -> Result<u64> {
        let query = format!(
            "SELECT COUNT(*) FROM {} WHERE {}",
            self.table,
            PENDING_FILTER
        );
        let rows = self.client.query(&query, &[&start]).await?;
        first_count(&rows)
    }

    async fn count_with_files(&self) -> Result<u64> {
        let query = format!(
            "SELECT COUNT(*) FROM {} WHERE file_path IS NOT NULL AND file_path <> ''",
            self.table
        );
        let rows = self.client.query(&query, &[]).await?;
        first_count(&rows)
    }

    async fn mark_transferred(&self, page_id: i64, at: DateTime<Utc>) -> Result<()> {
        let statement = format!(
            "UPDATE {} SET last_transferred_at = $1 WHERE id = $2",
            self.table
        );
        let updated = self.client.execute(&statement, &[&at, &page_id]).await?;
        if updated == 0 {
            return Err(DeployError::Storage(format!("Unknown page id {page_id}")));
        }
        Ok(())
    }

    async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await
    }
}

fn first_count(rows: &[Row]) -> Result<u64> {
    let count: i64 = rows
        .first()
        .ok_or_else(|| DeployError::Storage("COUNT returned no rows".to_string()))?
        .try_get(0)
        .map_err(|e| DeployError::Storage(format!("Invalid count: {e}")))?;
    Ok(count.max(0) as u64)
}
