//! Configuration management for sitepush.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! sitepush uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `SITEPUSH_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Validation of the active destination only
//!
//! # Example Configuration
//!
//! ```toml
//! destination = "github"
//!
//! [run]
//! archive_dir = "/var/exports/site"
//! archive_start_time = "2025-03-01T10:00:00Z"
//! export_kind = "full"
//!
//! [github]
//! owner = "octo"
//! repository = "site"
//! personal_access_token = "${GITHUB_TOKEN}"
//!
//! [ledger]
//! connection_string = "${SITEPUSH_DATABASE_URL}"
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sitepush::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("sitepush.toml")?;
//! println!("Destination: {}", config.destination);
//! println!("Archive: {}", config.run.archive_dir);
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, load_config_unvalidated};
pub use schema::{
    AccountType, ApplicationConfig, AwsConfig, BunnyConfig, DigitalOceanConfig, GitHubConfig,
    LedgerConfig, LoggingConfig, NotificationsConfig, RetryConfig, RunConfig, SitepushConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
