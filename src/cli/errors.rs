//! CLI error types
//!
//! Setup failures (config, data directory, boot) exit with status 1. A
//! request the engine refused has already been written to stdout as
//! `{status: "error", ...}`; it surfaces here only so the process exits
//! with status 2.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::engine::EngineError;

/// Exit status for setup failures
pub const EXIT_FAILURE: i32 = 1;

/// Exit status when the engine rejected or failed the request
pub const EXIT_REQUEST_FAILED: i32 = 2;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid config: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(String),

    #[error("data directory {} is already initialized", .0.display())]
    AlreadyInitialized(PathBuf),

    #[error("data directory {} is not initialized; run 'aeroquery init' first", .0.display())]
    NotInitialized(PathBuf),

    #[error("boot failed: {0}")]
    Boot(String),

    /// Engine outcome, reported on stdout before this error is returned
    #[error("request failed with {code} (HTTP equivalent {status})")]
    Request { code: String, status: u16 },
}

impl CliError {
    /// Stable code; engine refusals carry the engine's own code
    pub fn code(&self) -> &str {
        match self {
            CliError::Config(_) => "AEROQUERY_CLI_CONFIG_ERROR",
            CliError::Io(_) => "AEROQUERY_CLI_IO_ERROR",
            CliError::AlreadyInitialized(_) => "AEROQUERY_CLI_ALREADY_INITIALIZED",
            CliError::NotInitialized(_) => "AEROQUERY_CLI_NOT_INITIALIZED",
            CliError::Boot(_) => "AEROQUERY_CLI_BOOT_FAILED",
            CliError::Request { code, .. } => code,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Request { .. } => EXIT_REQUEST_FAILED,
            _ => EXIT_FAILURE,
        }
    }
}

impl From<&EngineError> for CliError {
    fn from(err: &EngineError) -> Self {
        CliError::Request {
            code: err.code().to_string(),
            status: err.status_code(),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Io(format!("JSON error: {}", e))
    }
}

pub type CliResult<T> = Result<T, CliError>;
