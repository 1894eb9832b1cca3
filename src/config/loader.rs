//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::SitepushConfig;
use super::secret::secret_string;
use crate::domain::errors::DeployError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into SitepushConfig
/// 4. Applies environment variable overrides (SITEPUSH_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns `DeployError::Configuration` if the file is missing or unreadable,
/// a referenced variable is unset, or parsing or validation fails.
///
/// # Examples
///
/// ```no_run
/// use sitepush::config::loader::load_config;
///
/// let config = load_config("sitepush.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<SitepushConfig> {
    let config = load_config_unvalidated(path)?;

    config.validate().map_err(|e| {
        DeployError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Loads and parses configuration without running validation
///
/// Used when command-line flags may still change the active destination.
pub fn load_config_unvalidated(path: impl AsRef<Path>) -> Result<SitepushConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(DeployError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        DeployError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses configuration text, applying substitution and overrides
pub fn parse_config(contents: &str) -> Result<SitepushConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: SitepushConfig = toml::from_str(&contents)
        .map_err(|e| DeployError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| DeployError::Other(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    processed_line = processed_line.replace(&format!("${{{var_name}}}"), &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(DeployError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env_var(name) {
        Some(val) => val.parse().map(Some).map_err(|_| {
            DeployError::Configuration(format!("Invalid value '{val}' for {name}"))
        }),
        None => Ok(None),
    }
}

/// Applies environment variable overrides using the SITEPUSH_* prefix
///
/// Environment variables follow the pattern `SITEPUSH_<SECTION>_<KEY>`,
/// for example `SITEPUSH_GITHUB_PERSONAL_ACCESS_TOKEN` or `SITEPUSH_RUN_ARCHIVE_DIR`.
/// Destination sections are only overridden when present in the file.
fn apply_env_overrides(config: &mut SitepushConfig) -> Result<()> {
    // Application overrides
    if let Some(val) = env_var("SITEPUSH_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(val) = env_parse("SITEPUSH_APPLICATION_DRY_RUN")? {
        config.application.dry_run = val;
    }
    if let Some(val) = env_var("SITEPUSH_DESTINATION") {
        config.destination = val.parse().map_err(DeployError::Configuration)?;
    }

    // Run overrides
    if let Some(val) = env_var("SITEPUSH_RUN_ARCHIVE_DIR") {
        config.run.archive_dir = val;
    }
    if let Some(val) = env_var("SITEPUSH_RUN_ARCHIVE_START_TIME") {
        config.run.archive_start_time = Some(val);
    }
    if let Some(val) = env_var("SITEPUSH_RUN_ARCHIVE_NAME") {
        config.run.archive_name = Some(val);
    }
    if let Some(val) = env_var("SITEPUSH_RUN_EXPORT_KIND") {
        config.run.export_kind = val.parse().map_err(DeployError::Configuration)?;
    }

    if let Some(ref mut aws) = config.aws {
        if let Some(val) = env_var("SITEPUSH_AWS_BUCKET") {
            aws.bucket = val;
        }
        if let Some(val) = env_var("SITEPUSH_AWS_REGION") {
            aws.region = val;
        }
        if let Some(val) = env_var("SITEPUSH_AWS_ACCESS_KEY") {
            aws.access_key = val;
        }
        if let Some(val) = env_var("SITEPUSH_AWS_ACCESS_SECRET") {
            aws.access_secret = secret_string(val);
        }
        if let Some(val) = env_var("SITEPUSH_AWS_SUBDIRECTORY") {
            aws.subdirectory = Some(val);
        }
    }

    if let Some(ref mut spaces) = config.digitalocean {
        if let Some(val) = env_var("SITEPUSH_DIGITALOCEAN_BUCKET") {
            spaces.bucket = val;
        }
        if let Some(val) = env_var("SITEPUSH_DIGITALOCEAN_REGION") {
            spaces.region = val;
        }
        if let Some(val) = env_var("SITEPUSH_DIGITALOCEAN_KEY") {
            spaces.key = val;
        }
        if let Some(val) = env_var("SITEPUSH_DIGITALOCEAN_SECRET") {
            spaces.secret = secret_string(val);
        }
        if let Some(val) = env_parse("SITEPUSH_DIGITALOCEAN_BATCH_SIZE")? {
            spaces.batch_size = val;
        }
    }

    if let Some(ref mut bunny) = config.bunny {
        if let Some(val) = env_var("SITEPUSH_BUNNY_STORAGE_ZONE") {
            bunny.storage_zone = val;
        }
        if let Some(val) = env_var("SITEPUSH_BUNNY_ACCESS_KEY") {
            bunny.access_key = secret_string(val);
        }
        if let Some(val) = env_var("SITEPUSH_BUNNY_STORAGE_ENDPOINT") {
            bunny.storage_endpoint = val;
        }
        if let Some(val) = env_parse("SITEPUSH_BUNNY_BATCH_SIZE")? {
            bunny.batch_size = val;
        }
    }

    if let Some(ref mut github) = config.github {
        if let Some(val) = env_var("SITEPUSH_GITHUB_OWNER") {
            github.owner = val;
        }
        if let Some(val) = env_var("SITEPUSH_GITHUB_REPOSITORY") {
            github.repository = val;
        }
        if let Some(val) = env_var("SITEPUSH_GITHUB_PERSONAL_ACCESS_TOKEN") {
            github.personal_access_token = secret_string(val);
        }
        if let Some(val) = env_var("SITEPUSH_GITHUB_BRANCH") {
            github.branch = val;
        }
        if let Some(val) = env_var("SITEPUSH_GITHUB_API_BASE_URL") {
            github.api_base_url = val;
        }
        if let Some(val) = env_parse("SITEPUSH_GITHUB_BATCH_SIZE")? {
            github.batch_size = val;
        }
    }

    // Ledger overrides
    if let Some(val) = env_var("SITEPUSH_LEDGER_CONNECTION_STRING") {
        config.ledger.connection_string = secret_string(val);
    }
    if let Some(val) = env_parse("SITEPUSH_LEDGER_MAX_CONNECTIONS")? {
        config.ledger.max_connections = val;
    }
    if let Some(val) = env_var("SITEPUSH_LEDGER_SSL_MODE") {
        config.ledger.ssl_mode = val;
    }

    if let Some(val) = env_var("SITEPUSH_NOTIFICATIONS_WEBHOOK_URL") {
        config.notifications.webhook_url = Some(val);
    }

    // Logging overrides
    if let Some(val) = env_parse("SITEPUSH_LOGGING_LOCAL_ENABLED")? {
        config.logging.local_enabled = val;
    }
    if let Some(val) = env_var("SITEPUSH_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::destination::DestinationKind;
    use secrecy::ExposeSecret;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const GITHUB_TOML: &str = r#"
destination = "github"

[application]
log_level = "debug"

[run]
archive_dir = "/var/exports/site"
archive_start_time = "2025-03-01T10:00:00Z"

[github]
owner = "octo"
repository = "site"
personal_access_token = "ghp_from_file"

[ledger]
connection_string = "postgresql://localhost/sitepush"
"#;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("SITEPUSH_TEST_SUBST_VAR", "test_value");
        let input = "token = \"${SITEPUSH_TEST_SUBST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "token = \"test_value\"\n");
        std::env::remove_var("SITEPUSH_TEST_SUBST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("SITEPUSH_TEST_MISSING_VAR");
        let input = "token = \"${SITEPUSH_TEST_MISSING_VAR}\"";
        let err = substitute_env_vars(input).unwrap_err();
        assert!(err.to_string().contains("SITEPUSH_TEST_MISSING_VAR"));
    }

    #[test]
    fn test_substitute_skips_comments() {
        std::env::remove_var("SITEPUSH_TEST_COMMENTED_VAR");
        let input = "# token = \"${SITEPUSH_TEST_COMMENTED_VAR}\"";
        assert!(substitute_env_vars(input).is_ok());
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent-sitepush.toml");
        assert!(matches!(result, Err(DeployError::Configuration(_))));
    }

    #[test]
    fn test_load_config_valid() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(GITHUB_TOML.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.destination, DestinationKind::GitHub);
        assert_eq!(config.application.log_level, "debug");

        let github = config.github.unwrap();
        assert_eq!(github.owner, "octo");
        assert_eq!(github.branch, "main");
        assert_eq!(github.batch_size, 50);
        assert_eq!(config.ledger.pages_table, "pages");
    }

    #[test]
    fn test_load_config_invalid_destination_section() {
        let toml = GITHUB_TOML.replace("destination = \"github\"", "destination = \"bunny\"");
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml.as_bytes()).unwrap();

        let err = load_config(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("[bunny]"));
    }

    #[test]
    fn test_env_override_replaces_secret() {
        std::env::set_var("SITEPUSH_GITHUB_PERSONAL_ACCESS_TOKEN", "ghp_from_env");
        let config = parse_config(GITHUB_TOML);
        std::env::remove_var("SITEPUSH_GITHUB_PERSONAL_ACCESS_TOKEN");

        let github = config.unwrap().github.unwrap();
        assert_eq!(github.personal_access_token.expose_secret(), "ghp_from_env");
    }

    #[test]
    fn test_digitalocean_throttles_by_default() {
        let toml = r#"
destination = "digitalocean"

[run]
archive_dir = "/var/exports/site"

[digitalocean]
bucket = "site"
region = "nyc3"
key = "key"
secret = "secret"

[ledger]
connection_string = "postgresql://localhost/sitepush"
"#;
        let spaces = parse_config(toml).unwrap().digitalocean.unwrap();
        assert!(spaces.throttle);
        assert_eq!(spaces.throttle_ms, 1000);
    }
}
