//! Error types and utilities for Tally

use crate::EntityId;
use thiserror::Error;

/// Result type alias for Tally operations
pub type Result<T> = std::result::Result<T, TallyError>;

/// Main error type for Tally operations
#[derive(Error, Debug)]
pub enum TallyError {
    /// The event repository failed to answer a query
    #[error("Transport error for entity {entity_id}: {message}")]
    Transport {
        entity_id: EntityId,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The event repository did not answer within the fetch deadline
    #[error("Fetch for entity {entity_id} timed out after {after_ms}ms")]
    Timeout { entity_id: EntityId, after_ms: u64 },

    /// Configuration related errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Validation errors for configuration or input data
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The controller was shut down and accepts no further work
    #[error("Controller has been shut down")]
    Closed,
}

impl TallyError {
    /// Create a new transport error
    pub fn transport(entity_id: EntityId, msg: impl Into<String>) -> Self {
        Self::Transport {
            entity_id,
            message: msg.into(),
            source: None,
        }
    }

    /// Create a new transport error with source
    pub fn transport_with_source(
        entity_id: EntityId,
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            entity_id,
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a new configuration error with source
    pub fn config_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: None,
        }
    }

    /// Create a new validation error for a specific field
    pub fn validation_field(msg: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Returns true for failures of the repository call itself.
    ///
    /// These are the errors worth retrying, and the ones a view keeps its
    /// last-known-good data through.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }

    /// Entity the error relates to, if any.
    #[must_use]
    pub const fn entity_id(&self) -> Option<&EntityId> {
        match self {
            Self::Transport { entity_id, .. } | Self::Timeout { entity_id, .. } => Some(entity_id),
            _ => None,
        }
    }
}
