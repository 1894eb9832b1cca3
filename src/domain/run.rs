//! Run context for one export

use super::ids::RunId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Kind of export that produced the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    /// Every page was regenerated
    #[default]
    Full,
    /// Only changed pages were regenerated
    Incremental,
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportKind::Full => write!(f, "full"),
            ExportKind::Incremental => write!(f, "incremental"),
        }
    }
}

impl FromStr for ExportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(ExportKind::Full),
            "incremental" => Ok(ExportKind::Incremental),
            _ => Err(format!(
                "Invalid export kind '{s}'. Must be 'full' or 'incremental'"
            )),
        }
    }
}

/// Immutable description of the export being deployed
///
/// Loaded once per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    pub run_id: RunId,
    pub archive_start_time: DateTime<Utc>,
    pub archive_dir: PathBuf,
    pub archive_name: String,
    pub export_kind: ExportKind,
}

impl RunContext {
    pub fn new(
        archive_start_time: DateTime<Utc>,
        archive_dir: impl Into<PathBuf>,
        archive_name: impl Into<String>,
        export_kind: ExportKind,
    ) -> Self {
        Self {
            run_id: RunId::from_start_time(archive_start_time),
            archive_start_time,
            archive_dir: archive_dir.into(),
            archive_name: archive_name.into(),
            export_kind,
        }
    }

    /// A ledger file path relative to the archive directory
    ///
    /// Ledger paths may be stored absolute or relative; both resolve to the
    /// same key.
    pub fn relative_path<'a>(&self, file_path: &'a str) -> &'a str {
        let dir = self.archive_dir.to_string_lossy();
        let dir = dir.trim_end_matches('/');
        let relative = if dir.is_empty() {
            file_path
        } else {
            file_path
                .strip_prefix(dir)
                .filter(|rest| rest.starts_with('/'))
                .unwrap_or(file_path)
        };
        relative.trim_start_matches('/')
    }

    /// Resolves a ledger file path against the archive directory
    pub fn local_path(&self, file_path: &str) -> PathBuf {
        self.archive_dir.join(self.relative_path(file_path))
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }
}
