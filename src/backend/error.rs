//! Backend error types

use thiserror::Error;

/// Transport failure with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Network, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// Connection refused, DNS, TLS
    Network,
    Timeout,
    /// Non-success HTTP status
    Status(u16),
    /// Response body was not what we expected
    Decode,
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            BackendErrorKind::Timeout
        } else if e.is_decode() {
            BackendErrorKind::Decode
        } else if let Some(status) = e.status() {
            BackendErrorKind::Status(status.as_u16())
        } else {
            BackendErrorKind::Network
        };
        Self::new(kind, e.to_string())
    }
}

/// The flow could not be loaded
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    #[error("flow store unavailable: {0}")]
    Unavailable(#[source] BackendError),
    #[error("stored flow is malformed: {0}")]
    Malformed(String),
}

/// The flow could not be saved
#[derive(Debug, Clone, Error)]
pub enum SaveError {
    #[error("flow store unavailable: {0}")]
    Unavailable(#[source] BackendError),
    #[error("flow could not be encoded: {0}")]
    Encode(String),
}

/// The fallback oracle failed to answer
#[derive(Debug, Clone, Error)]
#[error("oracle lookup failed: {0}")]
pub struct OracleError(#[from] pub BackendError);
