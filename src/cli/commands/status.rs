//! Status command implementation
//!
//! Shows ledger progress for the current export and the run state saved by
//! earlier invocations.

use super::{exit_code_for, EXIT_CONFIG, EXIT_OK};
use crate::adapters::factory::create_storage;
use crate::config::load_config;
use crate::config::schema::parse_start_time;
use crate::core::selector::select_batch;
use crate::core::state::{RunState, StateManager};
use crate::domain::DestinationKind;
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Destination to report on (defaults to the configured one)
    #[arg(long)]
    pub destination: Option<DestinationKind>,

    /// Export start time (RFC 3339), when not set in the configuration
    #[arg(long)]
    pub start_time: Option<String>,

    /// List every stored run state instead of the current run only
    #[arg(long)]
    pub all: bool,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking deployment status");

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };
        let destination = self.destination.unwrap_or(config.destination);

        let storage = match create_storage(&config.ledger).await {
            Ok(s) => s,
            Err(e) => {
                println!("Failed to connect to the ledger database");
                println!("   Error: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        if self.all {
            let states = match storage.state.list().await {
                Ok(states) => states,
                Err(e) => {
                    println!("Failed to load run states");
                    println!("   Error: {e}");
                    return Ok(exit_code_for(&e));
                }
            };
            print_state_table(&states);
            return Ok(EXIT_OK);
        }

        let start_override = match self.start_time.as_deref().map(parse_start_time).transpose() {
            Ok(start) => start,
            Err(e) => {
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };
        let run = match config.run.to_context(start_override) {
            Ok(run) => run,
            Err(e) => {
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let selection = match select_batch(storage.ledger.as_ref(), &run, Some(0)).await {
            Ok(selection) => selection,
            Err(e) => {
                println!("Failed to read the page ledger");
                println!("   Error: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        println!("Deployment Status");
        println!();
        println!("  Destination: {destination}");
        println!("  Archive: {} ({})", run.archive_name, run.export_kind);
        println!("  Run: {}", run.run_id);
        println!(
            "  Progress: {} of {} pages/files",
            selection.pages_processed(),
            selection.total_pages
        );

        let manager = StateManager::new(storage.state);
        match manager.load(&run.run_id, destination).await {
            Ok(Some(state)) => {
                println!("  Staged blobs: {}", state.blobs.len());
                println!("  Rate-limit wait taken: {}", yes_no(state.should_sleep));
                println!("  Repository reset: {}", yes_no(state.repository_reset));
                println!("  Finished: {}", finished_label(&state));
            }
            Ok(None) => println!("  No invocation has run yet"),
            Err(e) => {
                println!("Failed to load run state");
                println!("   Error: {e}");
                return Ok(exit_code_for(&e));
            }
        }

        println!();
        Ok(EXIT_OK)
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn finished_label(state: &RunState) -> String {
    state
        .finished_at
        .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "no".to_string())
}

fn print_state_table(states: &[RunState]) {
    if states.is_empty() {
        println!("No deployment history found.");
        println!("Run 'sitepush deploy' to start a deployment.");
        return;
    }

    println!("Found {} run(s):", states.len());
    println!();
    println!(
        "{:<14} {:<24} {:<8} {:<22} {:<22}",
        "Destination", "Run", "Blobs", "Finished", "Updated"
    );
    println!("{}", "-".repeat(92));
    for state in states {
        println!(
            "{:<14} {:<24} {:<8} {:<22} {:<22}",
            state.destination.as_str(),
            state.run_id.as_str(),
            state.blobs.len(),
            finished_label(state),
            state.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    println!();
}
