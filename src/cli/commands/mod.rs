//! CLI command implementations
//!
//! Commands return a process exit code:
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Done, or stopped cleanly |
//! | 1 | Stopped with files that failed to transfer |
//! | 2 | Configuration error |
//! | 4 | Connection or setup error |
//! | 5 | Fatal error |

pub mod deploy;
pub mod status;
pub mod validate;

use crate::domain::errors::BackendError;
use crate::domain::DeployError;

pub const EXIT_OK: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;
pub const EXIT_CONNECTION: i32 = 4;
pub const EXIT_FATAL: i32 = 5;

/// Exit code for an error that aborted a command
pub fn exit_code_for(error: &DeployError) -> i32 {
    match error {
        DeployError::Configuration(_) | DeployError::Validation(_) => EXIT_CONFIG,
        DeployError::Storage(_)
        | DeployError::Backend(
            BackendError::ConnectionFailed(_)
            | BackendError::AuthenticationFailed(_)
            | BackendError::RepositorySetup(_),
        ) => EXIT_CONNECTION,
        _ => EXIT_FATAL,
    }
}
