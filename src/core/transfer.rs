//! Transfer task - one invocation of a resumable deployment
//!
//! A run moves `PENDING -> IN_PROGRESS -> DONE`, but nothing stores that
//! state directly: "done" is read off the page ledger, and the run state only
//! remembers that the completion event already fired. Every call to
//! [`TransferTask::perform`] does one bounded slice of work:
//!
//! 1. Short-circuit if the run already finished
//! 2. Backend preparation (repository checks, reset)
//! 3. Select the next batch of pending pages
//! 4. Transfer the batch (rate-limited backends may wait first)
//! 5. Mark the written pages in the ledger
//! 6. On the transition into DONE: claim completion, finalize and notify
//!
//! Invocations of one run may overlap. Run state is only changed through
//! atomic [`RunHandle`] operations, and completion is claimed in the store so
//! exactly one invocation finalizes.

use crate::adapters::factory::{create_storage, Storage};
use crate::adapters::ledger::PageLedger;
use crate::config::SitepushConfig;
use crate::core::backend::{create_backend, BatchOutcome, DeployBackend, PageOutcome};
use crate::core::notify::{create_notifier, DeployEvent, Notifier};
use crate::core::selector::{select_batch, Selection};
use crate::core::state::{RunFlag, RunHandle, StateManager};
use crate::domain::destination::DestinationKind;
use crate::domain::ids::RunId;
use crate::domain::rate::RateLimitSnapshot;
use crate::domain::run::RunContext;
use crate::domain::{DeployError, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Outcome of one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationReport {
    pub destination: DestinationKind,
    pub run_id: RunId,
    pub pages_processed: u64,
    pub total_pages: u64,
    pub transferred: usize,
    pub failed: usize,
    /// Pages marked without a write (empty files)
    pub skipped: usize,
    pub slept_seconds: u64,
    /// The destination holds the whole export
    pub done: bool,
    pub commit_sha: Option<String>,
    pub message: String,
}

pub struct TransferTask {
    run: RunContext,
    backend: Arc<dyn DeployBackend>,
    ledger: Arc<dyn PageLedger>,
    state: StateManager,
    notifier: Notifier,
    dry_run: bool,
}

impl TransferTask {
    pub fn new(
        run: RunContext,
        backend: Arc<dyn DeployBackend>,
        storage: Storage,
        notifier: Notifier,
    ) -> Self {
        Self {
            run,
            backend,
            ledger: storage.ledger,
            state: StateManager::new(storage.state),
            notifier,
            dry_run: false,
        }
    }

    /// Report what would be transferred without calling the backend or
    /// writing the ledger
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Build a task for the configured destination, backed by PostgreSQL
    ///
    /// `start_override` replaces `run.archive_start_time`.
    pub async fn from_config(
        config: &SitepushConfig,
        start_override: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        let run = config
            .run
            .to_context(start_override)
            .map_err(DeployError::Configuration)?;
        let backend = create_backend(config.destination, config)?;
        let storage = create_storage(&config.ledger).await?;
        let notifier = create_notifier(config)?;

        Ok(Self::new(run, backend, storage, notifier).with_dry_run(config.application.dry_run))
    }

    pub fn run(&self) -> &RunContext {
        &self.run
    }

    pub fn destination(&self) -> DestinationKind {
        self.backend.kind()
    }

    /// Run one invocation
    ///
    /// # Errors
    ///
    /// Storage failures, backend setup failures, bulk sync failures and
    /// finalization failures abort the invocation. Single-file failures do
    /// not; they are counted in the report and retried next time.
    pub async fn perform(&self) -> Result<InvocationReport> {
        let kind = self.backend.kind();
        let finished = self
            .state
            .load(&self.run.run_id, kind)
            .await?
            .is_some_and(|state| state.is_finished());

        if finished {
            return self.already_finished().await;
        }

        if self.dry_run {
            return self.dry_run_report().await;
        }

        let (state, current) = self.state.open(&self.run.run_id, kind).await?;
        if current.is_finished() {
            return self.already_finished().await;
        }

        tracing::info!(
            destination = %kind,
            run_id = %self.run.run_id,
            archive_dir = %self.run.archive_dir.display(),
            staged_blobs = current.blobs.len(),
            "Starting invocation"
        );

        self.backend.prepare(&self.run, &state).await?;

        let selection =
            select_batch(self.ledger.as_ref(), &self.run, self.backend.batch_size()).await?;

        if selection.is_empty() {
            let total = selection.total_pages;
            let commit_sha = self.finish(&state, total).await?;
            return Ok(self.report(total, total, &BatchOutcome::default(), true, commit_sha));
        }

        // Blobs are staged in the store as they are created, before any
        // page of the batch is marked
        let outcome = self
            .backend
            .transfer_batch(&self.run, &selection.batch, &state)
            .await?;

        let marked = self.mark_pages(&outcome).await?;
        let processed = (selection.pages_processed() + marked).min(selection.total_pages);
        crate::log_batch_progress!(kind, self.run.run_id, processed, selection.total_pages);

        let drained = processed >= selection.total_pages;
        if drained && !self.backend.finalizes_on_empty_selection() {
            let commit_sha = self.finish(&state, selection.total_pages).await?;
            return Ok(self.report(processed, selection.total_pages, &outcome, true, commit_sha));
        }

        Ok(self.report(processed, selection.total_pages, &outcome, false, None))
    }

    async fn already_finished(&self) -> Result<InvocationReport> {
        let total = self.ledger.count_with_files().await?;
        tracing::info!(
            destination = %self.backend.kind(),
            run_id = %self.run.run_id,
            "Run already finished"
        );
        Ok(self.report(total, total, &BatchOutcome::default(), true, None))
    }

    /// Record every written page, returning how many were marked
    async fn mark_pages(&self, outcome: &BatchOutcome) -> Result<u64> {
        // Never earlier than the run start, or the page would stay eligible
        let marked_at = Utc::now().max(self.run.archive_start_time);
        let mut marked = 0;

        for result in &outcome.results {
            if result.outcome.marks_page() {
                self.ledger
                    .mark_transferred(result.page_id, marked_at)
                    .await?;
                marked += 1;
            }
        }
        Ok(marked)
    }

    /// Claim completion, finalize the backend and fire the event
    ///
    /// Only the invocation that wins the claim finalizes. If finalization
    /// fails the claim is released so a later invocation retries it.
    async fn finish(&self, state: &RunHandle, total_pages: u64) -> Result<Option<String>> {
        if !state.try_claim(RunFlag::Finished).await? {
            tracing::info!(
                destination = %self.backend.kind(),
                run_id = %self.run.run_id,
                "Run finished by another invocation"
            );
            return Ok(None);
        }

        let commit_sha = match self.backend.finalize(&self.run, state).await {
            Ok(commit_sha) => commit_sha,
            Err(e) => {
                if let Err(release) = state.release(RunFlag::Finished).await {
                    tracing::error!(error = %release, "Failed to release completion claim");
                }
                return Err(e);
            }
        };

        let finished_at = state
            .snapshot()
            .await
            .ok()
            .and_then(|s| s.finished_at)
            .unwrap_or_else(Utc::now);
        let event = DeployEvent::TransferFinished {
            destination: self.backend.kind(),
            run_id: self.run.run_id.clone(),
            archive_name: self.run.archive_name.clone(),
            pages_total: total_pages,
            commit_sha: commit_sha.clone(),
            finished_at,
        };
        let delivered = self.notifier.notify(&event).await;

        tracing::info!(
            destination = %self.backend.kind(),
            run_id = %self.run.run_id,
            total_pages,
            commit = ?commit_sha,
            notifications = delivered,
            "Transfer finished"
        );
        Ok(commit_sha)
    }

    async fn dry_run_report(&self) -> Result<InvocationReport> {
        let selection =
            select_batch(self.ledger.as_ref(), &self.run, self.backend.batch_size()).await?;

        for page in &selection.batch {
            tracing::info!(
                destination = %self.backend.kind(),
                file_path = %page.file_path().unwrap_or_default(),
                "Dry run: would transfer"
            );
        }

        let mut report = self.report(
            selection.pages_processed(),
            selection.total_pages,
            &BatchOutcome::default(),
            selection.is_empty(),
            None,
        );
        report.message = dry_run_message(&selection);
        Ok(report)
    }

    fn report(
        &self,
        processed: u64,
        total: u64,
        outcome: &BatchOutcome,
        done: bool,
        commit_sha: Option<String>,
    ) -> InvocationReport {
        let kind = self.backend.kind();
        let snapshot = outcome.rate.and_then(|r| r.snapshot);

        InvocationReport {
            destination: kind,
            run_id: self.run.run_id.clone(),
            pages_processed: processed,
            total_pages: total,
            transferred: outcome.count(|o| *o == PageOutcome::Transferred),
            failed: outcome.count(|o| !o.marks_page()),
            skipped: outcome.count(|o| matches!(o, PageOutcome::Skipped(_))),
            slept_seconds: outcome.rate.map(|r| r.slept_seconds).unwrap_or(0),
            done,
            commit_sha,
            message: progress_message(kind, processed, total, done, snapshot),
        }
    }
}

/// Human-readable progress line for an invocation
pub fn progress_message(
    kind: DestinationKind,
    processed: u64,
    total: u64,
    done: bool,
    quota: Option<RateLimitSnapshot>,
) -> String {
    match (kind, done) {
        (DestinationKind::GitHub, true) => {
            format!("Committed {processed} of {total} pages/files")
        }
        (DestinationKind::GitHub, false) => match quota {
            Some(quota) => format!(
                "Committing {processed} of {total} pages/files \
                 (Your hourly GitHub API rate limit: {}/{} requests left)",
                quota.remaining, quota.limit
            ),
            None => format!("Committing {processed} of {total} pages/files"),
        },
        (_, true) => format!("Uploaded {processed} of {total} pages/files"),
        (_, false) => format!("Uploading {processed} of {total} pages/files"),
    }
}

fn dry_run_message(selection: &Selection) -> String {
    format!(
        "Dry run: {} of {} pending pages/files selected ({} of {} processed)",
        selection.batch.len(),
        selection.pages_remaining,
        selection.pages_processed(),
        selection.total_pages
    )
}
