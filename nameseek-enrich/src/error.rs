//! Error types for nameseek-enrich
//!
//! Two layers:
//! - `ProviderError`: one failed adapter call. Classified as transient,
//!   validation or fatal and always isolated to its task.
//! - `EnrichError`: run-level failures (configuration, checkpoint
//!   durability, dataset IO) that abort the whole run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single provider adapter call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("request timed out")]
    Timeout,

    #[error("rate limited by provider")]
    RateLimited { retry_after: Option<Duration> },

    /// Unparseable or schema-violating response
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("authentication failed: {0}")]
    AuthError(String),

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("provider server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Request rejected as permanently invalid (HTTP 400/404/422)
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// How the retry controller treats a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Retried with exponential backoff up to the attempt limit
    Transient,
    /// Retried once; fatal on the second consecutive occurrence
    Validation,
    /// Never retried
    Fatal,
}

impl ProviderError {
    pub fn class(&self) -> FailureClass {
        match self {
            ProviderError::Timeout
            | ProviderError::RateLimited { .. }
            | ProviderError::NetworkError(_)
            | ProviderError::Server { .. } => FailureClass::Transient,
            ProviderError::InvalidResponse(_) => FailureClass::Validation,
            ProviderError::AuthError(_) | ProviderError::InvalidInput(_) => FailureClass::Fatal,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ProviderError::Timeout => FailureKind::Timeout,
            ProviderError::RateLimited { .. } => FailureKind::RateLimited,
            ProviderError::InvalidResponse(_) => FailureKind::InvalidResponse,
            ProviderError::AuthError(_) => FailureKind::AuthError,
            ProviderError::NetworkError(_) => FailureKind::NetworkError,
            ProviderError::Server { .. } => FailureKind::ServerError,
            ProviderError::InvalidInput(_) => FailureKind::InvalidInput,
        }
    }

    /// Provider-supplied wait hint, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Serializable error kind recorded in checkpoints and summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    RateLimited,
    InvalidResponse,
    AuthError,
    NetworkError,
    ServerError,
    InvalidInput,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::InvalidResponse => "invalid_response",
            FailureKind::AuthError => "auth_error",
            FailureKind::NetworkError => "network_error",
            FailureKind::ServerError => "server_error",
            FailureKind::InvalidInput => "invalid_input",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run-level error; aborts the run
#[derive(Debug, Error)]
pub enum EnrichError {
    /// Invalid mode/tier/provider combination or missing input
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Durable append failed; progress can no longer be recorded
    #[error("Checkpoint write failed for '{key}': {source}")]
    CheckpointWrite {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Checkpoint could not be opened or read
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Base dataset could not be read or output written
    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Common error: {0}")]
    Common(#[from] nameseek_common::Error),
}

impl From<csv::Error> for EnrichError {
    fn from(err: csv::Error) -> Self {
        EnrichError::Dataset(err.to_string())
    }
}

/// Result type for run-level operations
pub type EnrichResult<T> = Result<T, EnrichError>;
