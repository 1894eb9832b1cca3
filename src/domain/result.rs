//! Result type alias for sitepush

use super::errors::DeployError;

/// Result type alias for sitepush operations
///
/// # Examples
///
/// ```
/// use sitepush::domain::result::Result;
/// use sitepush::domain::errors::DeployError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(DeployError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, DeployError>;
