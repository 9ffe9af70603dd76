//! Error types for azdo
//!
//! The taxonomy every command shares. Leaf commands return `anyhow::Result`
//! and wrap lower-level failures with context; the dispatcher walks the
//! chain and picks the exit code from the first [`CliError`] it finds.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::client::ClientError;

/// Process exit codes
pub mod exit {
    /// Command completed
    pub const OK: i32 = 0;
    /// Generic failure
    pub const ERROR: i32 = 1;
    /// Cancelled by the user or by the root deadline
    pub const CANCEL: i32 = 2;
    /// Missing or rejected credentials
    pub const AUTH: i32 = 4;
}

/// Top-level error kinds recognised by the dispatcher
#[derive(Error, Debug)]
pub enum CliError {
    /// Bad flag or positional argument; rendered with the command usage
    #[error("{message}")]
    Flag {
        message: String,
        /// Usage block of the command that rejected the input
        usage: Option<String>,
    },

    /// Missing or invalid credentials
    #[error("{0}")]
    Auth(String),

    /// A valid query returned nothing
    #[error("{0}")]
    NoResults(String),

    /// A named resource does not exist
    #[error("{0}")]
    NotFound(String),

    /// User declined a confirmation or the process was interrupted
    #[error("cancelled")]
    Cancel,

    /// A child process exited unsuccessfully
    #[error("{command} exited with status {code}")]
    ExternalCommandExit { command: String, code: i32 },

    /// Retryable failure, surfaced after retries are exhausted
    #[error("{0}")]
    Transient(String),

    /// The pager stopped reading standard output
    #[error("pager pipe closed")]
    ClosedPagerPipe,
}

impl CliError {
    /// Create a flag error without a usage block
    pub fn flag(message: impl Into<String>) -> Self {
        Self::Flag {
            message: message.into(),
            usage: None,
        }
    }

    /// Create a flag error that prints the given usage block
    pub fn flag_with_usage(message: impl Into<String>, usage: impl Into<String>) -> Self {
        Self::Flag {
            message: message.into(),
            usage: Some(usage.into()),
        }
    }

    /// Create a transient error
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }
}

/// Filesystem errors
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// Failed to create directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to write file
    #[error("Failed to write file '{path}': {error}")]
    WriteFile { path: PathBuf, error: String },

    /// Failed to read file
    #[error("Failed to read file '{path}': {error}")]
    ReadFile { path: PathBuf, error: String },
}

/// Find the first [`CliError`] in an error chain
pub fn find_cli_error(err: &anyhow::Error) -> Option<&CliError> {
    err.chain().find_map(|cause| cause.downcast_ref::<CliError>())
}

/// Whether an error chain ends in a broken pipe to the pager
pub fn is_closed_pager_pipe(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(cause.downcast_ref::<CliError>(), Some(CliError::ClosedPagerPipe))
            || cause
                .downcast_ref::<io::Error>()
                .is_some_and(|e| e.kind() == io::ErrorKind::BrokenPipe)
    })
}

/// Whether an error chain is worth retrying
pub fn is_transient(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(cause.downcast_ref::<CliError>(), Some(CliError::Transient(_)))
            || cause
                .downcast_ref::<ClientError>()
                .is_some_and(ClientError::is_transient)
    })
}

/// Whether an error chain represents a cancellation
pub fn is_cancel(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(cause.downcast_ref::<CliError>(), Some(CliError::Cancel))
            || matches!(cause.downcast_ref::<ClientError>(), Some(ClientError::Cancelled))
    })
}

/// Map an error chain onto the process exit code
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if is_closed_pager_pipe(err) {
        return exit::OK;
    }
    if is_cancel(err) {
        return exit::CANCEL;
    }
    for cause in err.chain() {
        if let Some(cli) = cause.downcast_ref::<CliError>() {
            return match cli {
                CliError::Auth(_) => exit::AUTH,
                CliError::Cancel => exit::CANCEL,
                CliError::ExternalCommandExit { code, .. } => *code,
                CliError::ClosedPagerPipe => exit::OK,
                _ => exit::ERROR,
            };
        }
        if let Some(client) = cause.downcast_ref::<ClientError>() {
            if client.is_auth_error() {
                return exit::AUTH;
            }
        }
    }
    exit::ERROR
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_cancel_maps_to_two() {
        let err = anyhow::Error::new(CliError::Cancel).context("deleting project");
        assert_eq!(exit_code(&err), exit::CANCEL);
    }

    #[test]
    fn test_auth_maps_to_four_through_context() {
        let err: anyhow::Result<()> = Err(CliError::Auth("no token".into()).into());
        let err = err.context("listing projects").unwrap_err();
        assert_eq!(exit_code(&err), exit::AUTH);
    }

    #[test]
    fn test_client_unauthorized_maps_to_four() {
        let err = anyhow::Error::new(ClientError::Api {
            status: 401,
            message: "unauthorized".into(),
        });
        assert_eq!(exit_code(&err), exit::AUTH);
    }

    #[test]
    fn test_external_command_code_passes_through() {
        let err = anyhow::Error::new(CliError::ExternalCommandExit {
            command: "sh".into(),
            code: 7,
        });
        assert_eq!(exit_code(&err), 7);
    }

    #[test]
    fn test_broken_pipe_is_clean_exit() {
        let io = io::Error::new(io::ErrorKind::BrokenPipe, "pipe");
        let err = anyhow::Error::new(io).context("writing table");
        assert_eq!(exit_code(&err), exit::OK);
    }

    #[test]
    fn test_generic_error_maps_to_one() {
        let err = anyhow::anyhow!("boom");
        assert_eq!(exit_code(&err), exit::ERROR);
        assert!(!is_transient(&err));
    }

    #[test]
    fn test_transient_is_detected_in_chain() {
        let err = anyhow::Error::new(CliError::transient("operation queued")).context("waiting");
        assert!(is_transient(&err));
    }
}
