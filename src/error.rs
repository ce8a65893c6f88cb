//! Error types for the resilience toolkit
//!
//! Failures of wrapped operations are classified once, where they are first
//! observed, into a closed `FaultKind`. Retry and throttling decisions switch
//! on that tag only.

use std::io;

use serde::Serialize;
use thiserror::Error;

// == Fault Kind ==
/// Closed classification of an operation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FaultKind {
    /// Peer reset the connection
    ConnectionReset,
    /// Peer refused the connection
    ConnectionRefused,
    /// Request or connect timed out
    TimedOut,
    /// DNS lookup failed
    HostNotFound,
    /// No route to the remote network
    NetworkUnreachable,
    /// Upstream answered with a 5xx status
    ServerError(u16),
    /// Upstream signalled quota exhaustion (HTTP 429 or equivalent)
    RateLimited,
    /// Anything that will not succeed on a second try
    Permanent,
}

impl FaultKind {
    /// Transient faults are worth another attempt.
    pub fn is_retryable(self) -> bool {
        !matches!(self, FaultKind::Permanent)
    }

    pub fn is_rate_limit(self) -> bool {
        matches!(self, FaultKind::RateLimited)
    }

    /// Classifies an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => FaultKind::RateLimited,
            408 | 504 => FaultKind::TimedOut,
            500..=599 => FaultKind::ServerError(status),
            _ => FaultKind::Permanent,
        }
    }

    /// Classifies an I/O error kind.
    pub fn from_io(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                FaultKind::ConnectionReset
            }
            io::ErrorKind::ConnectionRefused => FaultKind::ConnectionRefused,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => FaultKind::TimedOut,
            io::ErrorKind::AddrNotAvailable => FaultKind::HostNotFound,
            io::ErrorKind::NotConnected | io::ErrorKind::BrokenPipe => {
                FaultKind::NetworkUnreachable
            }
            _ => FaultKind::Permanent,
        }
    }
}

// == Classify Trait ==
/// Implemented by error types that can be routed through the toolkit.
pub trait Classify {
    fn fault_kind(&self) -> FaultKind;
}

impl Classify for FaultKind {
    fn fault_kind(&self) -> FaultKind {
        *self
    }
}

impl Classify for io::Error {
    fn fault_kind(&self) -> FaultKind {
        FaultKind::from_io(self.kind())
    }
}

// == Client Error ==
/// Ready-made classified error for integration clients.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} ({kind:?})")]
pub struct ClientError {
    pub kind: FaultKind,
    pub message: String,
}

impl ClientError {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Builds an error from an HTTP response status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self::new(FaultKind::from_status(status), message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Permanent, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(FaultKind::RateLimited, message)
    }
}

impl Classify for ClientError {
    fn fault_kind(&self) -> FaultKind {
        self.kind
    }
}

impl From<io::Error> for ClientError {
    fn from(err: io::Error) -> Self {
        Self::new(FaultKind::from_io(err.kind()), err.to_string())
    }
}

// == Retry Error ==
/// Terminal outcome of a retried operation.
#[derive(Error, Debug)]
pub enum RetryError<E> {
    /// Attempts exhausted, or the first failure was not retryable
    #[error("operation failed after {attempts} attempt(s): {last_error}")]
    Exhausted { attempts: u32, last_error: E },

    /// Cancelled while waiting between attempts
    #[error("operation cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}

impl<E> RetryError<E> {
    /// Number of invocations made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::Cancelled { attempts } => {
                *attempts
            }
        }
    }

    pub fn last_error(&self) -> Option<&E> {
        match self {
            RetryError::Exhausted { last_error, .. } => Some(last_error),
            RetryError::Cancelled { .. } => None,
        }
    }

    pub fn into_last_error(self) -> Option<E> {
        match self {
            RetryError::Exhausted { last_error, .. } => Some(last_error),
            RetryError::Cancelled { .. } => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }
}

// == Rate Limit Error ==
/// Outcome of a cancellable throttled call.
#[derive(Error, Debug)]
pub enum RateLimitError<E> {
    /// The operation ran and failed
    #[error(transparent)]
    Operation(E),

    /// Cancelled before the operation was started
    #[error("rate-limited call cancelled while queued")]
    Cancelled,
}

impl<E> RateLimitError<E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RateLimitError::Cancelled)
    }

    pub fn into_operation_error(self) -> Option<E> {
        match self {
            RateLimitError::Operation(err) => Some(err),
            RateLimitError::Cancelled => None,
        }
    }
}
