//! External system integrations for sitepush.
//!
//! - [`ledger`] - Page ledger trait with PostgreSQL and in-memory implementations
//! - [`state`] - Run state store trait with PostgreSQL and in-memory implementations
//! - [`postgresql`] - Shared PostgreSQL pool, migrations and queries
//! - [`factory`] - Builds the ledger and state store from configuration
//! - [`s3`] - AWS S3 and DigitalOcean Spaces client
//! - [`bunny`] - BunnyCDN edge storage client
//! - [`github`] - GitHub git data API client
//! - [`http`] - Shared HTTP client construction and retry
//!
//! Remote clients are stateless. Anything that must survive between
//! invocations goes through the run state store.

pub mod bunny;
pub mod factory;
pub mod github;
pub mod http;
pub mod ledger;
pub mod postgresql;
pub mod s3;
pub mod state;
