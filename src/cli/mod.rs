//! CLI interface and argument parsing
//!
//! The `deploy` command doubles as the external scheduler: it calls the
//! transfer task repeatedly until the destination reports done.

pub mod commands;

use clap::{Parser, Subcommand};

/// Sitepush - resumable static-site deployment
#[derive(Parser, Debug)]
#[command(name = "sitepush")]
#[command(version, about, long_about = None)]
#[command(author = "Sitepush Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "sitepush.toml", env = "SITEPUSH_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "SITEPUSH_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deploy the current export to the configured destination
    Deploy(commands::deploy::DeployArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Show progress and run state for the current export
    Status(commands::status::StatusArgs),
}
