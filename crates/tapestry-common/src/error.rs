//! Error types shared across the Tapestry workspace

use thiserror::Error;

/// Result type alias for Tapestry operations
pub type Result<T> = std::result::Result<T, TapestryError>;

/// Workspace-wide error type for glue code that crosses crate boundaries.
///
/// The ingestion core carries its own finer-grained errors
/// (transport/map/store); this type is for everything around them.
#[derive(Error, Debug)]
pub enum TapestryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Source not registered: {0}")]
    UnknownSource(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl TapestryError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
