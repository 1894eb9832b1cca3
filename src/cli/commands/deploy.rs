//! Deploy command implementation
//!
//! Drives the transfer task invocation by invocation until the destination
//! holds the whole export, one invocation is requested, or a shutdown signal
//! arrives. Progress survives between runs of the command, so stopping early
//! is always safe.

use super::{exit_code_for, EXIT_CONFIG, EXIT_OK, EXIT_PARTIAL};
use crate::config::load_config_unvalidated;
use crate::config::schema::parse_start_time;
use crate::core::transfer::{InvocationReport, TransferTask};
use crate::domain::DestinationKind;
use clap::Args;
use std::time::Duration;
use tokio::sync::watch;

/// Arguments for the deploy command
#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Override the configured destination (aws, digitalocean, bunny, github)
    #[arg(long)]
    pub destination: Option<DestinationKind>,

    /// Run a single invocation and exit
    #[arg(long)]
    pub once: bool,

    /// Stop after this many invocations (0 = until done)
    #[arg(long, default_value_t = 0)]
    pub max_invocations: usize,

    /// Pause between invocations
    #[arg(long, default_value_t = 1000)]
    pub interval_ms: u64,

    /// Report the next batch without transferring or marking anything
    #[arg(long)]
    pub dry_run: bool,

    /// Override the export start time (RFC 3339)
    #[arg(long)]
    pub start_time: Option<String>,
}

impl DeployArgs {
    /// Execute the deploy command
    pub async fn execute(
        &self,
        config_path: &str,
        mut shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting deploy command");

        let mut config = match load_config_unvalidated(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        if let Some(destination) = self.destination {
            tracing::info!(destination = %destination, "Overriding destination from CLI");
            config.destination = destination;
        }
        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.application.dry_run = true;
        }

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(EXIT_CONFIG);
        }

        let start_override = match self.start_time.as_deref().map(parse_start_time).transpose() {
            Ok(start) => start,
            Err(e) => {
                eprintln!("{e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let task = match TransferTask::from_config(&config, start_override).await {
            Ok(task) => task,
            Err(e) => {
                tracing::error!(error = %e, "Failed to initialize deployment");
                eprintln!("Failed to initialize deployment: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        let dry_run = config.application.dry_run;
        if dry_run {
            println!("DRY RUN MODE - nothing will be uploaded or marked");
        }
        println!(
            "Deploying '{}' to {} (run {})",
            task.run().archive_name,
            task.destination(),
            task.run().run_id
        );

        let single = self.once || dry_run;
        let mut invocations = 0;
        let mut last: Option<InvocationReport> = None;

        loop {
            if *shutdown_signal.borrow() {
                println!("Shutdown requested. Progress is saved; run the same command to resume.");
                break;
            }

            invocations += 1;
            let report = match task.perform().await {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!(error = %e, invocation = invocations, "Invocation failed");
                    eprintln!("Deployment failed: {e}");
                    return Ok(exit_code_for(&e));
                }
            };

            print_report(&report);
            let done = report.done;
            last = Some(report);

            if done {
                println!("Deployment complete.");
                return Ok(EXIT_OK);
            }
            if single || (self.max_invocations > 0 && invocations >= self.max_invocations) {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(self.interval_ms)) => {}
                _ = shutdown_signal.changed() => {}
            }
        }

        Ok(match last {
            Some(report) if report.failed > 0 => EXIT_PARTIAL,
            _ => EXIT_OK,
        })
    }
}

fn print_report(report: &InvocationReport) {
    println!("{}", report.message);
    if report.failed > 0 {
        println!("  {} file(s) failed and will be retried", report.failed);
    }
    if report.skipped > 0 {
        println!("  {} empty file(s) skipped", report.skipped);
    }
    if report.slept_seconds > 0 {
        println!("  Waited {}s for the API rate limit to reset", report.slept_seconds);
    }
    if let Some(ref sha) = report.commit_sha {
        println!("  Commit: {sha}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_config_is_config_error() {
        let args = DeployArgs {
            destination: None,
            once: true,
            max_invocations: 0,
            interval_ms: 0,
            dry_run: false,
            start_time: None,
        };
        let (_tx, rx) = watch::channel(false);
        let code = args
            .execute("/nonexistent/sitepush.toml", rx)
            .await
            .unwrap();
        assert_eq!(code, EXIT_CONFIG);
    }
}
