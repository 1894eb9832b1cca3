//! PostgreSQL client implementation
//!
//! Pooled connections shared by the page ledger and the run state store.

use crate::config::schema::LedgerConfig;
use crate::domain::{DeployError, Result};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use postgres_native_tls::MakeTlsConnector;
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio_postgres::config::SslMode;
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};

const INITIAL_SCHEMA: &str = include_str!("../../../migrations/001_initial_schema.sql");

/// PostgreSQL client for sitepush
pub struct PostgresClient {
    pool: Pool,
    statement_timeout_ms: u64,
    connection_safe: String,
}

impl PostgresClient {
    /// Create a new PostgreSQL client
    ///
    /// No connection is opened until the first query.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string or TLS setup is invalid.
    pub fn new(config: &LedgerConfig) -> Result<Self> {
        let conn_str = config.connection_string.expose_secret().as_str();
        let mut pg_config: tokio_postgres::Config = conn_str.parse().map_err(|e| {
            DeployError::Configuration(format!("Invalid PostgreSQL connection string: {e}"))
        })?;

        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let manager = match config.ssl_mode.as_str() {
            "disable" => {
                pg_config.ssl_mode(SslMode::Disable);
                Manager::from_config(pg_config, NoTls, manager_config)
            }
            mode => {
                pg_config.ssl_mode(if mode == "allow" || mode == "prefer" {
                    SslMode::Prefer
                } else {
                    SslMode::Require
                });
                let connector = native_tls::TlsConnector::builder()
                    .danger_accept_invalid_certs(!mode.starts_with("verify"))
                    .danger_accept_invalid_hostnames(mode != "verify-full")
                    .build()
                    .map_err(|e| {
                        DeployError::Configuration(format!("Failed to build TLS connector: {e}"))
                    })?;
                Manager::from_config(pg_config, MakeTlsConnector::new(connector), manager_config)
            }
        };

        let timeout = Duration::from_secs(config.connection_timeout_seconds);
        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .wait_timeout(Some(timeout))
            .create_timeout(Some(timeout))
            .recycle_timeout(Some(timeout))
            .runtime(deadpool_postgres::Runtime::Tokio1)
            .build()
            .map_err(|e| DeployError::Storage(format!("Failed to create connection pool: {e}")))?;

        Ok(Self {
            pool,
            statement_timeout_ms: config.statement_timeout_seconds * 1000,
            connection_safe: redact_connection_string(conn_str),
        })
    }

    /// Test the connection to PostgreSQL
    pub async fn test_connection(&self) -> Result<()> {
        let client = self.get_connection().await?;
        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| DeployError::Storage(format!("Connection test failed: {e}")))?;

        tracing::debug!(database = %self.connection_safe, "PostgreSQL connection test successful");
        Ok(())
    }

    /// Create the ledger and run state tables if they don't exist
    pub async fn run_migrations(&self, pages_table: &str, state_table: &str) -> Result<()> {
        let client = self.get_connection().await?;
        let sql = render_schema(pages_table, state_table);

        client
            .batch_execute(&sql)
            .await
            .map_err(|e| DeployError::Storage(format!("Failed to execute migration: {e}")))?;

        tracing::info!(pages_table, state_table, "PostgreSQL schema initialized");
        Ok(())
    }

    /// Get a connection from the pool
    pub async fn get_connection(&self) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| DeployError::Storage(format!("Failed to get connection from pool: {e}")))
    }

    /// Get a pooled connection with the statement timeout applied, for
    /// callers that run their own transaction
    pub async fn session(&self) -> Result<deadpool_postgres::Object> {
        let client = self.get_connection().await?;
        self.set_statement_timeout(&client).await?;
        Ok(client)
    }

    /// Execute a query and return rows
    pub async fn query(&self, query: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>> {
        let client = self.get_connection().await?;
        self.set_statement_timeout(&client).await?;

        client
            .query(query, params)
            .await
            .map_err(|e| DeployError::Storage(format!("Query failed: {e}")))
    }

    /// Execute a statement and return the number of affected rows
    pub async fn execute(&self, statement: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64> {
        let client = self.get_connection().await?;
        self.set_statement_timeout(&client).await?;

        client
            .execute(statement, params)
            .await
            .map_err(|e| DeployError::Storage(format!("Statement execution failed: {e}")))
    }

    async fn set_statement_timeout(&self, client: &deadpool_postgres::Object) -> Result<()> {
        client
            .batch_execute(&format!(
                "SET statement_timeout = {}",
                self.statement_timeout_ms
            ))
            .await
            .map_err(|e| DeployError::Storage(format!("Failed to set statement timeout: {e}")))
    }

    /// The connection target with credentials removed, for logs
    pub fn connection_string_safe(&self) -> &str {
        &self.connection_safe
    }
}

fn render_schema(pages_table: &str, state_table: &str) -> String {
    INITIAL_SCHEMA
        .replace("{pages_table}", pages_table)
        .replace("{state_table}", state_table)
}

/// Hides credentials in a connection string
pub fn redact_connection_string(conn_str: &str) -> String {
    match conn_str.rsplit_once('@') {
        Some((_, host)) => format!("postgresql://***@{host}"),
        None => conn_str.to_string(),
    }
}
