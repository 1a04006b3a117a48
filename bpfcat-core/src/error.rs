//! Error types for bpfcat-core

use thiserror::Error;

/// Main error type for the bpfcat-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid request input (missing url, malformed body, bad query param)
    #[error("validation error: {0}")]
    Validation(String),

    /// Repository URL already cataloged
    #[error("repository URL already exists: {0}")]
    DuplicateUrl(String),

    /// Repository not found
    #[error("repository not found: {0}")]
    RepoNotFound(i64),

    /// A snapshot row (analysis, primitive analysis, overhead test) not found
    #[error("{kind} not found: {id}")]
    SnapshotNotFound { kind: &'static str, id: i64 },

    /// Analyzer service unreachable or returned a non-2xx response
    #[error("analyzer error: {0}")]
    Analyzer(String),
}

/// Result type alias for bpfcat-core
pub type Result<T> = std::result::Result<T, Error>;
