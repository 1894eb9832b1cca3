// Sitepush - Resumable static-site deployment
// Copyright (c) 2025 Sitepush Contributors
// Licensed under the MIT License

//! # Sitepush - Resumable static-site deployment
//!
//! Sitepush pushes a statically exported website to AWS S3, DigitalOcean
//! Spaces, BunnyCDN storage or a GitHub repository. A site is usually far too
//! large to upload in one go, so the work is split into short invocations that
//! each move one batch of files and then stop.
//!
//! ## Overview
//!
//! - A **page ledger** (PostgreSQL) lists every exported page, its output file
//!   and when it was last transferred
//! - Each invocation **selects** the next batch of pages that have not been
//!   transferred since the export started
//! - A **backend** writes the batch to its destination and the ledger records
//!   which pages made it
//! - **Run state** (staged Git blobs, rate-limit bookkeeping) survives between
//!   invocations, so a GitHub deployment ends in a single commit
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface, including the invocation loop
//! - [`core`] - Selection, backends, rate limiting and the transfer task
//! - [`adapters`] - Remote clients and ledger/state storage
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sitepush::config::load_config;
//! use sitepush::core::transfer::TransferTask;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("sitepush.toml")?;
//!     let task = TransferTask::from_config(&config, None).await?;
//!
//!     loop {
//!         let report = task.perform().await?;
//!         println!("{}", report.message);
//!         if report.done {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Library operations return [`domain::Result`], whose error type is
//! [`domain::DeployError`]. Per-file failures are not errors: they are
//! reported in the invocation outcome and the file is retried later.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
