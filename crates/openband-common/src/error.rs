//! Error taxonomy for the steering engine.
//!
//! Each kind maps to a fixed propagation policy (see module docs on the
//! callers): `NotFound` is always handled locally, `Malformed`/`Unsupported`
//! are logged and absorbed, `QueueFull`/`Invariant` raise a counter and
//! continue, and `Fatal` is the only variant allowed to unwind past the
//! dispatcher.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OswError {
    #[error("not found: {key}")]
    NotFound { key: String },

    #[error("malformed {what} at offset {offset}: {reason}")]
    Malformed {
        what: String,
        offset: usize,
        reason: String,
    },

    #[error("unsupported: {operation}")]
    Unsupported { operation: String },

    #[error("queue full: dropped {dropped} event(s)")]
    QueueFull { dropped: u64 },

    #[error("invariant violated in {component}: {reason}")]
    Invariant { component: String, reason: String },

    #[error("fatal: {reason}")]
    Fatal { reason: String },
}

impl OswError {
    pub fn not_found(key: impl Into<String>) -> Self {
        OswError::NotFound { key: key.into() }
    }

    pub fn malformed(what: impl Into<String>, offset: usize, reason: impl Into<String>) -> Self {
        OswError::Malformed {
            what: what.into(),
            offset,
            reason: reason.into(),
        }
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        OswError::Unsupported {
            operation: operation.into(),
        }
    }

    pub fn invariant(component: impl Into<String>, reason: impl Into<String>) -> Self {
        OswError::Invariant {
            component: component.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error kind is ever allowed to propagate out of the
    /// dispatcher and abort process init.
    pub fn is_fatal(&self) -> bool {
        matches!(self, OswError::Fatal { .. })
    }
}

pub type OswResult<T> = Result<T, OswError>;
