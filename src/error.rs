//! Error types for the assistant bridge

use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the assistant bridge
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Station not configured
    #[error("unknown station: {0}")]
    UnknownStation(String),

    /// Session document missing
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Assistant API returned a non-success status
    #[error("assistant API error: {status} - {body}")]
    AssistantApi { status: u16, body: String },

    /// Run reached a terminal failure status
    #[error("run failed with status: {0}")]
    RunFailed(String),

    /// Run did not settle within the polling budget
    #[error("run timed out after {0} ms")]
    RunTimeout(u128),

    /// Final assistant message could not be interpreted
    #[error("invalid assistant response: {0}")]
    InvalidResponse(String),

    /// Function handler failed
    #[error("function error: {0}")]
    Function(String),

    /// Function name not in the dispatch table
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// A function call failed and its run was cancelled
    #[error("function execution terminated")]
    FunctionTerminated,

    /// Vector store maintenance error
    #[error("vector store error: {0}")]
    VectorStore(String),

    /// Downstream integration error (weather, forms relay)
    #[error("integration error: {0}")]
    Integration(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
