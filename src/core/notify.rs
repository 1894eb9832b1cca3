//! Completion notifications
//!
//! Delivery is best-effort: a failing channel is logged and never fails the
//! invocation that finished the run.

use crate::adapters::github::GitHubClient;
use crate::adapters::http::{build_client, error_for_status};
use crate::config::SitepushConfig;
use crate::domain::destination::DestinationKind;
use crate::domain::errors::BackendError;
use crate::domain::ids::RunId;
use crate::domain::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Event type sent with the repository dispatch
pub const DISPATCH_EVENT_TYPE: &str = "repository dispatch";

/// Events that trigger notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeployEvent {
    TransferFinished {
        destination: DestinationKind,
        run_id: RunId,
        archive_name: String,
        pages_total: u64,
        /// Set by backends that finish with a commit
        commit_sha: Option<String>,
        finished_at: DateTime<Utc>,
    },
}

/// A place completion events are delivered to
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn notify(&self, event: &DeployEvent) -> std::result::Result<(), BackendError>;
}

/// POSTs the event as JSON to a configured URL
pub struct WebhookChannel {
    webhook_url: String,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(webhook_url: String, timeout_seconds: u64) -> std::result::Result<Self, BackendError> {
        Ok(Self {
            webhook_url,
            client: build_client(timeout_seconds)?,
        })
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn notify(&self, event: &DeployEvent) -> std::result::Result<(), BackendError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(event)
            .send()
            .await?;
        error_for_status(response).await?;
        Ok(())
    }
}

/// Fires a `repository_dispatch` on the deployed repository after a commit
pub struct RepositoryDispatchChannel {
    client: Arc<GitHubClient>,
}

impl RepositoryDispatchChannel {
    pub fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NotificationChannel for RepositoryDispatchChannel {
    fn name(&self) -> &'static str {
        "repository_dispatch"
    }

    async fn notify(&self, event: &DeployEvent) -> std::result::Result<(), BackendError> {
        let DeployEvent::TransferFinished {
            run_id,
            archive_name,
            commit_sha,
            ..
        } = event;

        // Nothing was pushed, so there is nothing to build
        let Some(commit_sha) = commit_sha else {
            return Ok(());
        };

        self.client
            .dispatch(
                DISPATCH_EVENT_TYPE,
                json!({
                    "run_id": run_id,
                    "archive_name": archive_name,
                    "commit_sha": commit_sha,
                }),
            )
            .await
    }
}

/// Fan-out over every configured channel
#[derive(Clone, Default)]
pub struct Notifier {
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Deliver to every channel, returning how many succeeded
    pub async fn notify(&self, event: &DeployEvent) -> usize {
        let mut delivered = 0;
        for channel in &self.channels {
            match channel.notify(event).await {
                Ok(()) => {
                    delivered += 1;
                    tracing::debug!(channel = channel.name(), "Notification delivered");
                }
                Err(e) => {
                    tracing::warn!(
                        channel = channel.name(),
                        error = %e,
                        "Notification failed"
                    );
                }
            }
        }
        delivered
    }
}

/// Build the notifier for a configuration
pub fn create_notifier(config: &SitepushConfig) -> Result<Notifier> {
    let mut notifier = Notifier::new();

    if let Some(url) = config
        .notifications
        .webhook_url
        .as_ref()
        .filter(|u| !u.is_empty())
    {
        let channel = WebhookChannel::new(url.clone(), config.notifications.timeout_seconds)?;
        notifier = notifier.with_channel(Arc::new(channel));
    }

    if config.destination == DestinationKind::GitHub {
        if let Some(github) = config.github.as_ref().filter(|g| g.repository_dispatch) {
            let client = Arc::new(GitHubClient::new(github)?);
            notifier = notifier.with_channel(Arc::new(RepositoryDispatchChannel::new(client)));
        }
    }

    Ok(notifier)
}
