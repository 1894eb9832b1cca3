//! Storage factory
//!
//! Builds the page ledger and run state store from configuration, sharing one
//! connection pool between them.

use crate::adapters::ledger::PageLedger;
use crate::adapters::postgresql::{PostgresClient, PostgresLedger, PostgresStateStore};
use crate::adapters::state::RunStateStore;
use crate::config::schema::LedgerConfig;
use crate::domain::Result;
use std::sync::Arc;

/// Ledger and run state store handed to the transfer task
#[derive(Clone)]
pub struct Storage {
    pub ledger: Arc<dyn PageLedger>,
    pub state: Arc<dyn RunStateStore>,
}

impl Storage {
    pub fn new(ledger: Arc<dyn PageLedger>, state: Arc<dyn RunStateStore>) -> Self {
        Self { ledger, state }
    }
}

/// Create the PostgreSQL-backed ledger and state store
///
/// Runs the schema migration first when `run_migrations` is enabled.
///
/// # Errors
///
/// Returns an error if the pool cannot be created, or the migration fails
pub async fn create_storage(config: &LedgerConfig) -> Result<Storage> {
    let client = Arc::new(PostgresClient::new(config)?);
    tracing::info!(
        database = %client.connection_string_safe(),
        pages_table = %config.pages_table,
        "Creating PostgreSQL ledger and run state storage"
    );

    if config.run_migrations {
        client
            .run_migrations(&config.pages_table, &config.state_table)
            .await?;
    }

    let ledger = Arc::new(PostgresLedger::new(client.clone(), &config.pages_table));
    let state = Arc::new(PostgresStateStore::new(client, &config.state_table));

    Ok(Storage::new(ledger, state))
}
