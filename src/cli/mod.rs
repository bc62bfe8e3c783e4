//! CLI module for aeroquery
//!
//! Provides command-line interface for:
//! - init: Write default config and create the data directory
//! - serve: Boot the engine and serve HTTP
//! - ingest: Ingest a local file
//! - query: One-shot query from a stdin JSON line

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{
    init, ingest, query, run, run_command, serve, CacheSection, Config, ExecutorSection,
    IngestSection,
};
pub use errors::{CliError, CliResult, EXIT_FAILURE, EXIT_REQUEST_FAILED};
pub use io::{read_request, write_error_to, write_response, write_response_to};
