//! Configuration schema types
//!
//! This module defines the configuration structure for sitepush. Every
//! destination has its own section; only the one selected by `destination`
//! has to be present and valid.

use crate::config::SecretString;
use crate::domain::destination::DestinationKind;
use crate::domain::run::{ExportKind, RunContext};
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main sitepush configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitepushConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// The export being deployed
    pub run: RunConfig,

    /// Active destination (aws, digitalocean, bunny, github)
    pub destination: DestinationKind,

    /// AWS S3 configuration (required if destination = aws)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsConfig>,

    /// DigitalOcean Spaces configuration (required if destination = digitalocean)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digitalocean: Option<DigitalOceanConfig>,

    /// BunnyCDN storage configuration (required if destination = bunny)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bunny: Option<BunnyConfig>,

    /// GitHub configuration (required if destination = github)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<GitHubConfig>,

    /// Page ledger and run state database
    pub ledger: LedgerConfig,

    /// Completion notifications
    #[serde(default)]
    pub notifications: NotificationsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SitepushConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.run.validate()?;
        self.validate_destination(self.destination)?;
        self.ledger.validate()?;
        self.notifications.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Validates the section for `kind`
    ///
    /// All destination sections may be present in the file, but only the
    /// active one is checked.
    pub fn validate_destination(&self, kind: DestinationKind) -> Result<(), String> {
        match kind {
            DestinationKind::Aws => match self.aws {
                Some(ref config) => config.validate(),
                None => Err(missing_section(kind)),
            },
            DestinationKind::DigitalOcean => match self.digitalocean {
                Some(ref config) => config.validate(),
                None => Err(missing_section(kind)),
            },
            DestinationKind::Bunny => match self.bunny {
                Some(ref config) => config.validate(),
                None => Err(missing_section(kind)),
            },
            DestinationKind::GitHub => match self.github {
                Some(ref config) => config.validate(),
                None => Err(missing_section(kind)),
            },
        }
    }
}

fn missing_section(kind: DestinationKind) -> String {
    format!("[{kind}] configuration is required when destination = '{kind}'")
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Dry run mode (report pending pages, don't upload or mark)
    #[serde(default)]
    pub dry_run: bool,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            dry_run: false,
        }
    }
}

/// Description of the export to deploy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Directory the exporter wrote the site into
    pub archive_dir: String,

    /// Start time of the export (RFC 3339); may be supplied on the command line instead
    #[serde(default)]
    pub archive_start_time: Option<String>,

    /// Human-readable export name, used in commit messages
    #[serde(default)]
    pub archive_name: Option<String>,

    /// full or incremental
    #[serde(default)]
    pub export_kind: ExportKind,
}

impl RunConfig {
    fn validate(&self) -> Result<(), String> {
        if self.archive_dir.trim().is_empty() {
            return Err("run.archive_dir cannot be empty".to_string());
        }
        if let Some(ref start) = self.archive_start_time {
            parse_start_time(start)?;
        }
        Ok(())
    }

    /// Builds the run context, preferring `start_override` over the configured start time
    ///
    /// # Errors
    ///
    /// Returns an error if no start time is available or it is not RFC 3339
    pub fn to_context(&self, start_override: Option<DateTime<Utc>>) -> Result<RunContext, String> {
        let start = match (start_override, &self.archive_start_time) {
            (Some(start), _) => start,
            (None, Some(start)) => parse_start_time(start)?,
            (None, None) => {
                return Err(
                    "run.archive_start_time is required (or pass --start-time)".to_string()
                )
            }
        };

        let name = match self.archive_name {
            Some(ref name) if !name.trim().is_empty() => name.clone(),
            _ => Path::new(&self.archive_dir)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.archive_dir.clone()),
        };

        Ok(RunContext::new(
            start,
            &self.archive_dir,
            name,
            self.export_kind,
        ))
    }
}

/// Parses an RFC 3339 timestamp into UTC
pub fn parse_start_time(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("Invalid archive start time '{value}': {e}"))
}

/// Retry configuration for HTTP backends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// AWS S3 configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    pub bucket: String,

    #[serde(default = "default_aws_region")]
    pub region: String,

    pub access_key: String,

    /// Stored securely in memory and automatically zeroized on drop
    pub access_secret: SecretString,

    /// Key prefix inside the bucket
    #[serde(default)]
    pub subdirectory: Option<String>,

    /// Custom endpoint for S3-compatible stores
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Pages marked per invocation; unset marks every pending page after the sync
    #[serde(default)]
    pub batch_size: Option<usize>,
}

impl AwsConfig {
    fn validate(&self) -> Result<(), String> {
        if self.bucket.is_empty() {
            return Err("aws.bucket cannot be empty".to_string());
        }
        if self.region.is_empty() {
            return Err("aws.region cannot be empty".to_string());
        }
        if self.access_key.is_empty() {
            return Err("aws.access_key cannot be empty".to_string());
        }
        if self.access_secret.expose_secret().is_empty() {
            return Err("aws.access_secret cannot be empty".to_string());
        }
        if let Some(ref endpoint) = self.endpoint {
            validate_http_url("aws.endpoint", endpoint)?;
        }
        if self.batch_size == Some(0) {
            return Err("aws.batch_size must be > 0 when set".to_string());
        }
        Ok(())
    }
}

/// DigitalOcean Spaces configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigitalOceanConfig {
    /// Space name
    pub bucket: String,

    /// Datacenter region, e.g. nyc3
    pub region: String,

    pub key: String,

    /// Stored securely in memory and automatically zeroized on drop
    pub secret: SecretString,

    /// Key prefix inside the space
    #[serde(default)]
    pub folder: Option<String>,

    /// Overrides `https://{region}.digitaloceanspaces.com`
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_digitalocean_batch_size")]
    pub batch_size: usize,

    /// Pause after each upload
    #[serde(default = "default_true")]
    pub throttle: bool,

    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
}

impl DigitalOceanConfig {
    fn validate(&self) -> Result<(), String> {
        if self.bucket.is_empty() {
            return Err("digitalocean.bucket cannot be empty".to_string());
        }
        if self.region.is_empty() {
            return Err("digitalocean.region cannot be empty".to_string());
        }
        if self.key.is_empty() {
            return Err("digitalocean.key cannot be empty".to_string());
        }
        if self.secret.expose_secret().is_empty() {
            return Err("digitalocean.secret cannot be empty".to_string());
        }
        if let Some(ref endpoint) = self.endpoint {
            validate_http_url("digitalocean.endpoint", endpoint)?;
        }
        validate_batch_size("digitalocean.batch_size", self.batch_size)
    }

    /// The Spaces endpoint for the configured region
    pub fn endpoint_url(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}.digitaloceanspaces.com", self.region))
    }
}

/// BunnyCDN edge storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BunnyConfig {
    pub storage_zone: String,

    /// Storage zone password
    /// Stored securely in memory and automatically zeroized on drop
    pub access_key: SecretString,

    #[serde(default = "default_bunny_storage_endpoint")]
    pub storage_endpoint: String,

    /// Directory inside the storage zone
    #[serde(default)]
    pub cdn_directory: Option<String>,

    /// Site path of the page uploaded as the zone's custom 404
    #[serde(default)]
    pub custom_404_path: Option<String>,

    #[serde(default = "default_bunny_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub throttle: bool,

    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl BunnyConfig {
    fn validate(&self) -> Result<(), String> {
        if self.storage_zone.is_empty() {
            return Err("bunny.storage_zone cannot be empty".to_string());
        }
        if self.access_key.expose_secret().is_empty() {
            return Err("bunny.access_key cannot be empty".to_string());
        }
        validate_http_url("bunny.storage_endpoint", &self.storage_endpoint)?;
        validate_batch_size("bunny.batch_size", self.batch_size)
    }
}

/// GitHub account type owning the repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Repository belongs to the token's user and may be created on demand
    #[default]
    Personal,
    /// Repository belongs to an organization and must already exist
    Organization,
}

/// GitHub repository configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    #[serde(default)]
    pub account_type: AccountType,

    /// User or organization login
    pub owner: String,

    pub repository: String,

    /// Stored securely in memory and automatically zeroized on drop
    pub personal_access_token: SecretString,

    #[serde(default = "default_branch")]
    pub branch: String,

    /// Folder inside the repository the site is committed into
    #[serde(default)]
    pub folder_path: Option<String>,

    #[serde(default = "default_github_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_github_batch_size")]
    pub batch_size: usize,

    /// Pause after each blob call
    #[serde(default)]
    pub throttle_request: bool,

    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,

    /// Delete and recreate the repository at the start of a full export
    #[serde(default)]
    pub clear_repository: bool,

    /// Visibility used when the repository is created
    #[serde(default = "default_true")]
    pub private: bool,

    /// Commit message; `{archive_name}` is replaced with the run's name
    #[serde(default = "default_commit_message")]
    pub commit_message: String,

    /// Send a repository_dispatch event after the commit
    #[serde(default = "default_true")]
    pub repository_dispatch: bool,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl GitHubConfig {
    fn validate(&self) -> Result<(), String> {
        if self.owner.is_empty() {
            return Err("github.owner cannot be empty".to_string());
        }
        if self.repository.is_empty() {
            return Err("github.repository cannot be empty".to_string());
        }
        if self.personal_access_token.expose_secret().is_empty() {
            return Err("github.personal_access_token cannot be empty".to_string());
        }
        if self.branch.is_empty() {
            return Err("github.branch cannot be empty".to_string());
        }
        validate_http_url("github.api_base_url", &self.api_base_url)?;
        validate_batch_size("github.batch_size", self.batch_size)
    }

    /// Renders the commit message for an export
    pub fn render_commit_message(&self, archive_name: &str) -> String {
        self.commit_message.replace("{archive_name}", archive_name)
    }
}

/// PostgreSQL page ledger and run state configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// PostgreSQL connection string
    /// Stored securely in memory and automatically zeroized on drop
    pub connection_string: SecretString,

    /// Maximum number of connections in the pool
    #[serde(default = "default_pg_max_connections")]
    pub max_connections: usize,

    /// Connection timeout in seconds
    #[serde(default = "default_pg_connection_timeout_seconds")]
    pub connection_timeout_seconds: u64,

    /// Statement timeout in seconds
    #[serde(default = "default_pg_statement_timeout_seconds")]
    pub statement_timeout_seconds: u64,

    /// SSL mode (disable, allow, prefer, require, verify-ca, verify-full)
    #[serde(default = "default_pg_ssl_mode")]
    pub ssl_mode: String,

    /// Table holding one row per exported page
    #[serde(default = "default_pages_table")]
    pub pages_table: String,

    /// Table holding run state documents
    #[serde(default = "default_state_table")]
    pub state_table: String,

    /// Create the tables on connect if they don't exist
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

impl LedgerConfig {
    fn validate(&self) -> Result<(), String> {
        let conn_str = self.connection_string.expose_secret();
        if conn_str.is_empty() {
            return Err("ledger.connection_string cannot be empty".to_string());
        }

        if !conn_str.starts_with("postgresql://") && !conn_str.starts_with("postgres://") {
            return Err(
                "ledger.connection_string must start with postgresql:// or postgres://"
                    .to_string(),
            );
        }

        if self.max_connections == 0 || self.max_connections > 100 {
            return Err(format!(
                "ledger.max_connections must be between 1 and 100, got {}",
                self.max_connections
            ));
        }

        let valid_ssl_modes = [
            "disable",
            "allow",
            "prefer",
            "require",
            "verify-ca",
            "verify-full",
        ];
        if !valid_ssl_modes.contains(&self.ssl_mode.as_str()) {
            return Err(format!(
                "ledger.ssl_mode must be one of: {}, got '{}'",
                valid_ssl_modes.join(", "),
                self.ssl_mode
            ));
        }

        validate_identifier("ledger.pages_table", &self.pages_table)?;
        validate_identifier("ledger.state_table", &self.state_table)?;
        Ok(())
    }
}

/// Completion notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// URL receiving a JSON POST when a deployment finishes
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default = "default_notification_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl NotificationsConfig {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref url) = self.webhook_url {
            validate_http_url("notifications.webhook_url", url)?;
        }
        Ok(())
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_seconds: default_notification_timeout_seconds(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default)]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy (daily, hourly, never)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path cannot be empty when local_enabled".to_string());
        }

        Ok(())
    }

    /// Console-only logging, used before the configuration file is read
    pub fn console_only() -> Self {
        Self {
            local_enabled: false,
            ..Self::default()
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

fn validate_http_url(field: &str, value: &str) -> Result<(), String> {
    let parsed = url::Url::parse(value).map_err(|e| format!("{field} is not a valid URL: {e}"))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(format!("{field} must start with http:// or https://"));
    }
    Ok(())
}

fn validate_batch_size(field: &str, value: usize) -> Result<(), String> {
    if value == 0 || value > 1000 {
        return Err(format!("{field} must be between 1 and 1000, got {value}"));
    }
    Ok(())
}

fn validate_identifier(field: &str, value: &str) -> Result<(), String> {
    let mut chars = value.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') || value.len() > 63 {
        return Err(format!(
            "{field} must be a plain SQL identifier (letters, digits, underscore), got '{value}'"
        ));
    }
    Ok(())
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_notification_timeout_seconds() -> u64 {
    30
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_retries() -> usize {
    3
}

fn default_throttle_ms() -> u64 {
    1000
}

fn default_aws_region() -> String {
    "us-east-1".to_string()
}

fn default_digitalocean_batch_size() -> usize {
    250
}

fn default_bunny_batch_size() -> usize {
    25
}

fn default_bunny_storage_endpoint() -> String {
    "https://storage.bunnycdn.com".to_string()
}

fn default_github_batch_size() -> usize {
    50
}

fn default_github_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_commit_message() -> String {
    "Updated/Added {archive_name}".to_string()
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

fn default_pg_max_connections() -> usize {
    10
}

fn default_pg_connection_timeout_seconds() -> u64 {
    30
}

fn default_pg_statement_timeout_seconds() -> u64 {
    60
}

fn default_pg_ssl_mode() -> String {
    "prefer".to_string()
}

fn default_pages_table() -> String {
    "pages".to_string()
}

fn default_state_table() -> String {
    "sitepush_run_state".to_string()
}
