//! Error types for OpSignal
//!
//! Provides a unified error type hierarchy for the entire system.

use thiserror::Error;

/// Result type alias using OpSignal's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for OpSignal
#[derive(Error, Debug)]
pub enum Error {
    // Malformed input: filter values, batch shape, bucket names
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // Authentication/Authorization Errors
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    // Storage Errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // Query Errors
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    // Configuration Errors
    #[error("Configuration error: {0}")]
    Config(String),

    // IO Errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// HTTP-equivalent status code for surfacing this error to a caller.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::Auth(AuthError::PermissionDenied(_)) => 403,
            Error::Auth(_) => 401,
            Error::Query(QueryError::Timeout(_)) => 504,
            _ => 500,
        }
    }
}

/// Malformed-input errors, surfaced as 4xx before any store access
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("invalid {field} time: {value}")]
    InvalidTime { field: &'static str, value: String },

    #[error("unrecognized bucket granularity: {0} (expected \"hour\" or \"day\")")]
    InvalidBucket(String),

    #[error("malformed signal batch: {0}")]
    MalformedBatch(String),

    #[error("{field} must be non-negative, got {value}")]
    NegativeValue { field: &'static str, value: f64 },

    #[error("alerts must not contain empty strings")]
    EmptyAlert,

    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// Authentication/Authorization errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("invalid API key")]
    InvalidApiKey,

    #[error("missing credential")]
    MissingCredential,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token expired")]
    TokenExpired,

    #[error("permission denied: {0}")]
    PermissionDenied(String),
}

/// Storage-related errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("open failed: {0}")]
    OpenFailed(String),

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("read failed: {0}")]
    ReadFailed(String),

    #[error("corrupt record: {0}")]
    CorruptRecord(String),
}

/// Query-related errors
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("query timeout after {0}ms")]
    Timeout(u64),

    #[error("execution error: {0}")]
    ExecutionError(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
