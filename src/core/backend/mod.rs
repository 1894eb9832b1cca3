//! Deploy backends
//!
//! Every destination implements [`DeployBackend`]. The transfer task drives a
//! backend through three steps per invocation:
//!
//! 1. [`prepare`](DeployBackend::prepare) - one-time or per-invocation setup
//!    (for GitHub: make sure the repository exists, or reset it)
//! 2. [`transfer_batch`](DeployBackend::transfer_batch) - write the selected
//!    files and report a per-page outcome
//! 3. [`finalize`](DeployBackend::finalize) - runs once the export has drained
//!
//! Backends never touch the page ledger; the task marks pages from the
//! reported outcomes. Run state is reached through a [`RunHandle`], whose
//! writes land in the store immediately.

pub mod bunny;
pub mod github;
pub mod object_storage;

pub use self::bunny::BunnyBackend;
pub use self::github::GitHubBackend;
pub use self::object_storage::ObjectStoreBackend;

use crate::config::SitepushConfig;
use crate::core::rate::RateCheck;
use crate::core::state::RunHandle;
use crate::domain::destination::DestinationKind;
use crate::domain::page::PageRecord;
use crate::domain::run::RunContext;
use crate::domain::{DeployError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// What happened to one page of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// Written to the destination
    Transferred,
    /// Nothing to write; marked so the run can drain
    Skipped(String),
    /// Not written; the page stays pending
    Failed(String),
}

impl PageOutcome {
    /// Whether the ledger should record the page as transferred
    pub fn marks_page(&self) -> bool {
        !matches!(self, PageOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResult {
    pub page_id: i64,
    pub file_path: String,
    pub outcome: PageOutcome,
}

/// Result of one `transfer_batch` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub results: Vec<PageResult>,
    /// Quota check, for rate-limited backends
    pub rate: Option<RateCheck>,
}

impl BatchOutcome {
    pub fn push(&mut self, page: &PageRecord, outcome: PageOutcome) {
        self.results.push(PageResult {
            page_id: page.id,
            file_path: page.file_path().unwrap_or_default().to_string(),
            outcome,
        });
    }

    pub fn count(&self, predicate: impl Fn(&PageOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| predicate(&r.outcome)).count()
    }
}

/// Common capability of every destination
#[async_trait]
pub trait DeployBackend: Send + Sync {
    fn kind(&self) -> DestinationKind;

    /// Pages per invocation; `None` selects every pending page
    fn batch_size(&self) -> Option<usize>;

    /// Whether finalization waits for an invocation with nothing left to select
    fn finalizes_on_empty_selection(&self) -> bool {
        self.kind().finalizes_on_empty_selection()
    }

    /// Setup run at the start of every invocation
    ///
    /// Failures are fatal for the invocation.
    async fn prepare(&self, _run: &RunContext, _state: &RunHandle) -> Result<()> {
        Ok(())
    }

    /// Write a batch of pages
    ///
    /// Per-file failures are reported in the outcome. An `Err` aborts the
    /// invocation.
    async fn transfer_batch(
        &self,
        run: &RunContext,
        batch: &[PageRecord],
        state: &RunHandle,
    ) -> Result<BatchOutcome>;

    /// Completion step, returning a commit sha when the backend produces one
    async fn finalize(&self, run: &RunContext, state: &RunHandle) -> Result<Option<String>>;
}

/// Create the backend for a destination
///
/// # Errors
///
/// Returns a configuration error if the destination's section is missing or a
/// client cannot be built.
pub fn create_backend(
    kind: DestinationKind,
    config: &SitepushConfig,
) -> Result<Arc<dyn DeployBackend>> {
    let missing = || {
        DeployError::Configuration(format!(
            "[{kind}] configuration is required when destination = '{kind}'"
        ))
    };

    let backend: Arc<dyn DeployBackend> = match kind {
        DestinationKind::Aws => {
            let aws = config.aws.as_ref().ok_or_else(missing)?;
            Arc::new(ObjectStoreBackend::aws(aws)?)
        }
        DestinationKind::DigitalOcean => {
            let spaces = config.digitalocean.as_ref().ok_or_else(missing)?;
            Arc::new(ObjectStoreBackend::digitalocean(spaces)?)
        }
        DestinationKind::Bunny => {
            let bunny = config.bunny.as_ref().ok_or_else(missing)?;
            Arc::new(BunnyBackend::new(bunny)?)
        }
        DestinationKind::GitHub => {
            let github = config.github.as_ref().ok_or_else(missing)?;
            Arc::new(GitHubBackend::new(github)?)
        }
    };

    tracing::debug!(destination = %kind, batch_size = ?backend.batch_size(), "Backend created");
    Ok(backend)
}

/// Optional fixed pause between per-file calls
pub(crate) async fn throttle(delay: Option<std::time::Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::parse_config;

    const BUNNY_TOML: &str = r#"
destination = "bunny"

[run]
archive_dir = "/tmp/export"

[bunny]
storage_zone = "zone"
access_key = "key"

[ledger]
connection_string = "postgresql://localhost/sitepush"
"#;

    #[test]
    fn test_create_backend_uses_destination_section() {
        let config = parse_config(BUNNY_TOML).unwrap();
        let backend = create_backend(DestinationKind::Bunny, &config).unwrap();
        assert_eq!(backend.kind(), DestinationKind::Bunny);
        assert_eq!(backend.batch_size(), Some(25));
        assert!(!backend.finalizes_on_empty_selection());
    }

    #[test]
    fn test_create_backend_missing_section() {
        let config = parse_config(BUNNY_TOML).unwrap();
        let err = match create_backend(DestinationKind::GitHub, &config) {
            Err(e) => e,
            Ok(_) => panic!("expected missing section error"),
        };
        assert!(err.to_string().contains("[github] configuration is required"));
    }

    #[test]
    fn test_failed_pages_are_not_marked() {
        assert!(PageOutcome::Transferred.marks_page());
        assert!(PageOutcome::Skipped("empty".to_string()).marks_page());
        assert!(!PageOutcome::Failed("timeout".to_string()).marks_page());
    }
}
