//! Core deployment logic for sitepush.
//!
//! # Modules
//!
//! - [`selector`] - Next batch of pending pages and run progress
//! - [`rate`] - API quota checks and the once-per-run wait
//! - [`assembler`] - Blob staging and the single tree commit
//! - [`backend`] - Destination backends and their registry
//! - [`notify`] - Completion events and notification channels
//! - [`state`] - Run state carried between invocations
//! - [`transfer`] - One invocation of a deployment
//!
//! # Example
//!
//! ```rust,no_run
//! use sitepush::config::load_config;
//! use sitepush::core::transfer::TransferTask;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("sitepush.toml")?;
//! let task = TransferTask::from_config(&config, None).await?;
//!
//! loop {
//!     let report = task.perform().await?;
//!     println!("{}", report.message);
//!     if report.done {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod backend;
pub mod notify;
pub mod rate;
pub mod selector;
pub mod state;
pub mod transfer;
