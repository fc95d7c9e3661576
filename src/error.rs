//! Error types for aliaslink.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for aliaslink operations.
pub type Result<T> = std::result::Result<T, LinkError>;

/// Error type for aliaslink operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LinkError {
    /// Reading or writing a file failed.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A vocabulary, registry or author file does not exist.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// CSV table could not be read or written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON registry or author list could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML config or front matter could not be parsed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A match pattern failed to compile.
    #[error("Pattern build error: {0}")]
    Pattern(String),

    /// Invalid input provided (missing config key, malformed record).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The external chooser failed for one request.
    #[error("Disambiguation failed: {0}")]
    Gateway(String),

    /// The external chooser cannot be reached at all (no credential, no network).
    #[error("Disambiguation gateway unavailable: {0}")]
    GatewayUnavailable(String),
}

impl LinkError {
    /// Wrap an IO error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            LinkError::NotFound(path)
        } else {
            LinkError::Io { path, source }
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        LinkError::InvalidInput(msg.into())
    }

    /// Create a pattern build error.
    pub fn pattern(msg: impl Into<String>) -> Self {
        LinkError::Pattern(msg.into())
    }

    /// Create a gateway error.
    pub fn gateway(msg: impl Into<String>) -> Self {
        LinkError::Gateway(msg.into())
    }
}
