//! Deployment destination kinds

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Remote hosting backend a run is deployed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationKind {
    /// AWS S3 bucket, bulk directory sync
    Aws,
    /// DigitalOcean Spaces, per-file upload
    DigitalOcean,
    /// BunnyCDN edge storage
    Bunny,
    /// GitHub repository, blob/tree/commit
    GitHub,
}

impl DestinationKind {
    pub const ALL: [DestinationKind; 4] = [
        DestinationKind::Aws,
        DestinationKind::DigitalOcean,
        DestinationKind::Bunny,
        DestinationKind::GitHub,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationKind::Aws => "aws",
            DestinationKind::DigitalOcean => "digitalocean",
            DestinationKind::Bunny => "bunny",
            DestinationKind::GitHub => "github",
        }
    }

    /// Whether finalization waits for an invocation that selects nothing
    pub fn finalizes_on_empty_selection(&self) -> bool {
        matches!(self, DestinationKind::GitHub)
    }
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DestinationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "aws" | "s3" => Ok(DestinationKind::Aws),
            "digitalocean" | "spaces" => Ok(DestinationKind::DigitalOcean),
            "bunny" | "bunnycdn" => Ok(DestinationKind::Bunny),
            "github" => Ok(DestinationKind::GitHub),
            _ => Err(format!(
                "Unknown destination '{s}'. Must be one of: aws, digitalocean, bunny, github"
            )),
        }
    }
}
