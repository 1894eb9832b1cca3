//! Logging and observability
//!
//! Structured logging via `tracing`, with helper macros that keep field names
//! consistent across destinations so log queries work the same for all of them.
//!
//! # Example
//!
//! ```no_run
//! use sitepush::logging::init_logging;
//! use sitepush::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!(destination = "github", "Deployment started");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};

/// Log progress of a run after an invocation
///
/// # Example
///
/// ```no_run
/// use sitepush::log_batch_progress;
///
/// log_batch_progress!("bunny", "2025-01-01T00:00:00Z", 25, 120);
/// ```
#[macro_export]
macro_rules! log_batch_progress {
    ($destination:expr, $run_id:expr, $processed:expr, $total:expr) => {
        tracing::info!(
            destination = %$destination,
            run_id = %$run_id,
            pages_processed = $processed,
            total_pages = $total,
            progress_pct = if $total == 0 {
                100.0
            } else {
                $processed as f64 / $total as f64 * 100.0
            },
            "Batch progress"
        );
    };
}

/// Log a file that could not be transferred; it stays pending
///
/// # Example
///
/// ```no_run
/// use sitepush::log_transfer_failure;
///
/// log_transfer_failure!("digitalocean", "blog/index.html", "connection reset");
/// ```
#[macro_export]
macro_rules! log_transfer_failure {
    ($destination:expr, $file_path:expr, $reason:expr) => {
        tracing::warn!(
            destination = %$destination,
            file_path = %$file_path,
            reason = %$reason,
            "File transfer failed, will retry on a later invocation"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use sitepush::log_retry_attempt;
///
/// log_retry_attempt!(2, 3, "Connection timeout");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_attempts:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_attempts = $max_attempts,
            reason = %$reason,
            "Retrying request"
        );
    };
}
