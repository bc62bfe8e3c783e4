//! aeroquery CLI entry point
//!
//! Installs logging, delegates to the CLI module, prints errors to stderr
//! and exits with the error's status.

use aeroquery::{cli, observability};

fn main() {
    observability::init_logging("info");

    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(e.exit_code());
    }
}
