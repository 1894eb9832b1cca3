//! PostgreSQL integration
//!
//! The page ledger and the run state store share one connection pool.

pub mod client;
pub mod ledger;
pub mod state;

pub use client::PostgresClient;
pub use ledger::PostgresLedger;
pub use state::PostgresStateStore;
