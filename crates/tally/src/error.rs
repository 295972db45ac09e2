//! Application-wide error types using thiserror.

use std::path::PathBuf;
use tally_common::TallyError;
use tally_config::ConfigError;

/// Main application error type.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Engine error.
    #[error(transparent)]
    Engine(#[from] TallyError),

    /// The events file could not be read or parsed.
    #[error("Failed to load events from {path}: {source}")]
    Events {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: TallyError,
    },

    /// A `--label` argument was not of the form `ID=NAME`.
    #[error("Invalid label '{0}', expected ID=NAME")]
    InvalidLabel(String),

    /// Output serialization failed.
    #[error("Failed to serialize output: {0}")]
    Output(#[from] serde_json::Error),
}

/// Result type for the application.
pub type AppResult<T> = Result<T, AppError>;
