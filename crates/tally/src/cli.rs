//! Command line arguments.

use crate::{AppError, AppResult};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tally_common::Timestamp;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "tally", author, version, about = "Aggregate and compare entity event metrics", long_about = None)]
pub struct Cli {
    /// Configuration file path (YAML or TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// JSON file holding an array of events
    #[arg(short, long)]
    pub events: PathBuf,

    /// Log level, overrides the configuration
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Evaluate as of this instant (RFC 3339) instead of the current time
    #[arg(long, value_name = "RFC3339")]
    pub now: Option<Timestamp>,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// What to compute.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Aggregated metrics for one entity
    Entity {
        /// Entity id
        id: String,
    },
    /// Date-aligned comparison of several entities
    Compare {
        /// Entity ids, in display order
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,

        /// Display label for an entity, as ID=NAME
        #[arg(long = "label", value_name = "ID=NAME")]
        labels: Vec<String>,
    },
}

/// Splits an `ID=NAME` label argument.
pub fn parse_label(raw: &str) -> AppResult<(String, String)> {
    match raw.split_once('=') {
        Some((id, name)) if !id.trim().is_empty() && !name.trim().is_empty() => {
            Ok((id.trim().to_string(), name.trim().to_string()))
        }
        _ => Err(AppError::InvalidLabel(raw.to_string())),
    }
}
