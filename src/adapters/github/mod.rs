//! GitHub repository backend client

pub mod client;
pub mod models;

pub use client::{GitHubClient, MARKER_FILE};
pub use models::BranchHead;
