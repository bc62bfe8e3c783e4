//! CLI argument definitions using clap
//!
//! Commands:
//! - aeroquery init --config <path>
//! - aeroquery serve --config <path>
//! - aeroquery ingest --config <path> --name <name> --file <path> [--format csv|json]
//! - aeroquery query --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// aeroquery - dataset query engine with cached results
#[derive(Parser, Debug)]
#[command(name = "aeroquery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a default config (if missing) and create the data directory
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./aeroquery.json")]
        config: PathBuf,
    },

    /// Start the HTTP server
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./aeroquery.json")]
        config: PathBuf,
    },

    /// Ingest a local CSV or JSON file
    Ingest {
        /// Path to configuration file
        #[arg(long, default_value = "./aeroquery.json")]
        config: PathBuf,

        /// Display name of the dataset
        #[arg(long)]
        name: String,

        /// File to ingest
        #[arg(long)]
        file: PathBuf,

        /// csv or json; detected from the file extension when omitted
        #[arg(long)]
        format: Option<String>,
    },

    /// Run one query read as a JSON line from stdin
    Query {
        /// Path to configuration file
        #[arg(long, default_value = "./aeroquery.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ingest() {
        let cli = Cli::try_parse_from([
            "aeroquery", "ingest", "--name", "sales", "--file", "sales.csv",
        ])
        .unwrap();

        match cli.command {
            Command::Ingest {
                config,
                name,
                file,
                format,
            } => {
                assert_eq!(config, PathBuf::from("./aeroquery.json"));
                assert_eq!(name, "sales");
                assert_eq!(file, PathBuf::from("sales.csv"));
                assert!(format.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_ingest_requires_file() {
        assert!(Cli::try_parse_from(["aeroquery", "ingest", "--name", "x"]).is_err());
    }
}
