//! Domain models and types for sitepush.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Ledger records** ([`PageRecord`]) and the eligibility rule for transfer
//! - **Run context** ([`RunContext`], [`RunId`]) identifying one export
//! - **Destination kinds** ([`DestinationKind`])
//! - **Remote artifacts** ([`BlobDescriptor`], [`RateLimitSnapshot`])
//! - **Error types** ([`DeployError`], [`BackendError`]) and the [`Result`] alias
//!
//! # Error Handling
//!
//! All fallible library operations return [`Result<T, DeployError>`]:
//!
//! ```rust,no_run
//! use sitepush::domain::Result;
//!
//! fn example() -> Result<()> {
//!     let config = sitepush::config::load_config("sitepush.toml")?;
//!     println!("Deploying to {}", config.destination);
//!     Ok(())
//! }
//! ```

pub mod blob;
pub mod destination;
pub mod errors;
pub mod ids;
pub mod page;
pub mod rate;
pub mod result;
pub mod run;

// Re-export commonly used types for convenience
pub use blob::BlobDescriptor;
pub use destination::DestinationKind;
pub use errors::{BackendError, DeployError};
pub use ids::RunId;
pub use page::PageRecord;
pub use rate::RateLimitSnapshot;
pub use result::Result;
pub use run::{ExportKind, RunContext};
