//! PostgreSQL run state store
//!
//! Each run state is one JSONB document keyed by `{destination}:{run_id}`.
//! Writes lock the row with `SELECT ... FOR UPDATE`, change it and store it
//! in one transaction, so overlapping invocations never overwrite each
//! other's staged blobs or flag claims.

use crate::adapters::postgresql::client::PostgresClient;
use crate::adapters::state::{missing_state, RunStateStore};
use crate::core::state::{RunFlag, RunState};
use crate::domain::blob::BlobDescriptor;
use crate::domain::{DeployError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_postgres::Row;

pub struct PostgresStateStore {
    client: Arc<PostgresClient>,
    table: String,
}

impl PostgresStateStore {
    pub fn new(client: Arc<PostgresClient>, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    /// Applies `apply` to the locked row and writes it back before commit
    async fn modify<R, F>(&self, key: &str, apply: F) -> Result<R>
    where
        F: FnOnce(&mut RunState) -> R + Send,
        R: Send,
    {
        let mut session = self.client.session().await?;
        let tx = session
            .transaction()
            .await
            .map_err(|e| DeployError::Storage(format!("Failed to begin transaction: {e}")))?;

        let select = format!("SELECT state FROM {} WHERE id = $1 FOR UPDATE", self.table);
        let row = tx
            .query_opt(&select, &[&key])
            .await
            .map_err(|e| DeployError::Storage(format!("Query failed: {e}")))?
            .ok_or_else(|| missing_state(key))?;

        let mut state = state_from_row(&row)?;
        let result = apply(&mut state);
        state.touch();

        let document = serde_json::to_value(&state)?;
        let update = format!(
            "UPDATE {} SET state = $2, updated_at = $3 WHERE id = $1",
            self.table
        );
        tx.execute(&update, &[&key, &document, &state.updated_at])
            .await
            .map_err(|e| DeployError::Storage(format!("Statement execution failed: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| DeployError::Storage(format!("Failed to commit transaction: {e}")))?;

        Ok(result)
    }
}

fn state_from_row(row: &Row) -> Result<RunState> {
    let document: serde_json::Value = row
        .try_get("state")
        .map_err(|e| DeployError::Storage(format!("Invalid run state row: {e}")))?;
    Ok(serde_json::from_value(document)?)
}

#[async_trait]
impl RunStateStore for PostgresStateStore {
    async fn load(&self, key: &str) -> Result<Option<RunState>> {
        let query = format!("SELECT state FROM {} WHERE id = $1", self.table);
        let rows = self.client.query(&query, &[&key]).await?;
        rows.first().map(state_from_row).transpose()
    }

    async fn insert_if_absent(&self, state: &RunState) -> Result<RunState> {
        let document = serde_json::to_value(state)?;
        let destination = state.destination.as_str();
        let statement = format!(
            "INSERT INTO {} (id, run_id, destination, state, updated_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO NOTHING",
            self.table
        );

        let inserted = self
            .client
            .execute(
                &statement,
                &[
                    &state.id,
                    &state.run_id.as_str(),
                    &destination,
                    &document,
                    &state.updated_at,
                ],
            )
            .await?;
        if inserted > 0 {
            tracing::debug!(run_state_id = %state.id, "Run state created in PostgreSQL");
        }

        self.load(&state.id)
            .await?
            .ok_or_else(|| missing_state(&state.id))
    }

    async fn stage_blob(&self, key: &str, blob: &BlobDescriptor) -> Result<()> {
        let blob = blob.clone();
        self.modify(key, move |state| state.stage_blob(blob)).await
    }

    async fn remove_committed(&self, key: &str, committed: &[BlobDescriptor]) -> Result<()> {
        self.modify(key, |state| state.remove_committed(committed))
            .await
    }

    async fn try_set_flag(&self, key: &str, flag: RunFlag) -> Result<bool> {
        self.modify(key, |state| state.try_set(flag)).await
    }

    async fn clear_flag(&self, key: &str, flag: RunFlag) -> Result<()> {
        self.modify(key, |state| state.clear(flag)).await
    }

    async fn list(&self) -> Result<Vec<RunState>> {
        let query = format!("SELECT state FROM {} ORDER BY updated_at DESC", self.table);
        let rows = self.client.query(&query, &[]).await?;
        rows.iter().map(state_from_row).collect()
    }
}
