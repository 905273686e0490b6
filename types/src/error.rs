//! Classified failures crossing the gateway boundary.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure taxonomy. Callers branch on this, never on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The call could not reach the upstream boundary.
    NetworkError,
    /// The per-attempt deadline elapsed.
    TimeoutError,
    /// Upstream answered with a failure status.
    UpstreamError,
    /// Upstream signaled rate or credit exhaustion.
    QuotaError,
    UnknownError,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NetworkError => "NetworkError",
            ErrorKind::TimeoutError => "TimeoutError",
            ErrorKind::UpstreamError => "UpstreamError",
            ErrorKind::QuotaError => "QuotaError",
            ErrorKind::UnknownError => "UnknownError",
        }
    }

    /// Whether another attempt could plausibly succeed.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, ErrorKind::NetworkError | ErrorKind::TimeoutError)
    }

    /// Connectivity failures share one user-facing message.
    #[must_use]
    pub const fn is_connectivity(self) -> bool {
        self.is_transient()
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure, serializable as the `error` field of a [`crate::Reply`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct GatewayError {
    pub kind: ErrorKind,
    pub message: String,
    /// HTTP status when upstream answered at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl GatewayError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkError, message)
    }

    #[must_use]
    pub fn timeout(deadline: Duration) -> Self {
        Self::new(
            ErrorKind::TimeoutError,
            format!("no response within {}ms", deadline.as_millis()),
        )
    }

    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::UpstreamError,
            message: message.into(),
            status,
        }
    }

    pub fn quota(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::QuotaError,
            message: message.into(),
            status,
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownError, message)
    }

    #[must_use]
    pub const fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}
