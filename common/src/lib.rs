pub mod logger;
pub mod validate;

use std::io;

use thiserror::Error;

/// The six error kinds surfaced by the library, per the protocol's failure
/// semantics table. Each carries its own cause so callers can chain it.
#[derive(Debug, Error)]
pub enum Error {
    /// An input did not meet its documented bounds or allowlist. Raised
    /// synchronously and never touches a socket.
    #[error("validation failed for {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// Address resolution or socket setup failed.
    #[error("connection failed: {0}")]
    Connection(#[source] io::Error),

    /// A command send failed after exhausting the dispatcher's retry
    /// budget.
    #[error("command send failed after retries: {0}")]
    Command(#[source] io::Error),

    /// `tune` did not observe a matching status packet within its
    /// deadline.
    #[error("tune timed out waiting for a matching status reply")]
    Timeout,

    /// The standalone discovery listener's socket failed.
    #[error("discovery failed: {0}")]
    Discovery(#[source] io::Error),

    /// The operation was attempted on a closed controller.
    #[error("controller is closed")]
    State,
}

impl Error {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// The `ErrorKind` this error belongs to, used to key the metrics'
    /// `errors_by_kind` map.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Connection(_) => ErrorKind::Connection,
            Self::Command(_) => ErrorKind::Command,
            Self::Timeout => ErrorKind::Timeout,
            Self::Discovery(_) => ErrorKind::Discovery,
            Self::State => ErrorKind::State,
        }
    }
}

/// Discriminant for [`Error`], used as a map key in metrics so repeated
/// errors of the same kind can be tallied without retaining every cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Connection,
    Command,
    Timeout,
    Discovery,
    State,
}

pub type Result<T> = std::result::Result<T, Error>;
