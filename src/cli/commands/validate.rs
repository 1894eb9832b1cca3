//! Validate config command implementation

use super::{EXIT_CONFIG, EXIT_OK};
use crate::adapters::postgresql::client::redact_connection_string;
use crate::config::{load_config_unvalidated, SitepushConfig};
use crate::domain::DestinationKind;
use clap::Args;
use secrecy::ExposeSecret;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("Validating configuration file: {config_path}");
        println!();

        let config = match load_config_unvalidated(config_path) {
            Ok(c) => {
                println!("Configuration file loaded successfully");
                c
            }
            Err(e) => {
                println!("Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        match config.validate() {
            Ok(()) => {
                println!("Configuration is valid");
                println!();
                print_summary(&config);
                Ok(EXIT_OK)
            }
            Err(e) => {
                println!("Configuration validation failed");
                println!("   Error: {e}");
                println!();
                Ok(EXIT_CONFIG)
            }
        }
    }
}

fn print_summary(config: &SitepushConfig) {
    println!("Configuration Summary:");
    println!("  Log Level: {}", config.application.log_level);
    println!("  Dry Run: {}", config.application.dry_run);
    println!("  Archive Dir: {}", config.run.archive_dir);
    println!(
        "  Archive Start: {}",
        config
            .run
            .archive_start_time
            .as_deref()
            .unwrap_or("(from --start-time)")
    );
    println!("  Export Kind: {}", config.run.export_kind);
    println!("  Destination: {}", config.destination);

    match config.destination {
        DestinationKind::Aws => {
            if let Some(ref aws) = config.aws {
                println!("  Bucket: {} ({})", aws.bucket, aws.region);
                println!(
                    "  Subdirectory: {}",
                    aws.subdirectory.as_deref().unwrap_or("/")
                );
            }
        }
        DestinationKind::DigitalOcean => {
            if let Some(ref spaces) = config.digitalocean {
                println!("  Space: {} ({})", spaces.bucket, spaces.endpoint_url());
                println!("  Batch Size: {}", spaces.batch_size);
            }
        }
        DestinationKind::Bunny => {
            if let Some(ref bunny) = config.bunny {
                println!("  Storage Zone: {}", bunny.storage_zone);
                println!("  Batch Size: {}", bunny.batch_size);
            }
        }
        DestinationKind::GitHub => {
            if let Some(ref github) = config.github {
                println!("  Repository: {}/{}", github.owner, github.repository);
                println!("  Branch: {}", github.branch);
                println!("  Batch Size: {}", github.batch_size);
            }
        }
    }

    println!(
        "  Ledger: {}",
        redact_connection_string(config.ledger.connection_string.expose_secret().as_str())
    );
    println!("  Pages Table: {}", config.ledger.pages_table);
    println!(
        "  Webhook: {}",
        if config.notifications.webhook_url.is_some() {
            "configured"
        } else {
            "none"
        }
    );
    println!();
}
