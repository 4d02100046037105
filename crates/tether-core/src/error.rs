//! Error taxonomy shared by every tether component.
//!
//! Failures never cross the connection actor as panics or propagated errors. They are
//! classified into an [`ErrorKind`], recorded in the connection's error history, and
//! either drive a transition (transient failures) or surface as a terminal
//! notification (fatal ones).
//!
//! Component crates provide `From` conversions into [`LinkError`], so callers that
//! compose several components only ever handle one error type:
//!
//! ```
//! use tether_core::{ErrorKind, LinkError};
//!
//! fn classify(err: &LinkError) -> &'static str {
//!     match err.kind() {
//!         ErrorKind::Connection => "retry later",
//!         ErrorKind::Protocol => "give up",
//!         ErrorKind::Validation => "fix the input",
//!         ErrorKind::QueueFull => "shed load",
//!     }
//! }
//!
//! let err = LinkError::Connection("connection reset by peer".into());
//! assert_eq!(classify(&err), "retry later");
//! assert!(err.is_transient());
//! ```

use std::fmt;

/// Classification of a failure.
///
/// Rate-limit deferral has no kind: a deferred message stays queued and
/// is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorKind {
    /// Transient transport failure; eligible for reconnection.
    Connection,
    /// Fatal protocol violation, such as an abnormal close code.
    Protocol,
    /// Caller input rejected before any state change.
    Validation,
    /// The outbound queue holds only high-priority messages and is at capacity.
    QueueFull,
}

impl ErrorKind {
    /// Returns `true` if failures of this kind may be retried.
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorKind::Connection)
    }

    /// Stable lowercase label, used for metrics and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Validation => "validation",
            ErrorKind::QueueFull => "queue_full",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Umbrella error for the connection stack.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    /// A transient transport failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// A fatal protocol failure.
    #[error("protocol error: {reason} (code {code})")]
    Protocol {
        /// Close or protocol code reported by the peer.
        code: u16,
        /// Human-readable reason.
        reason: String,
    },

    /// Caller input was rejected.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The outbound queue is full of high-priority messages.
    #[error("message queue full ({capacity} high-priority messages queued)")]
    QueueFull {
        /// Configured queue capacity.
        capacity: usize,
    },
}

impl LinkError {
    /// Returns the taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LinkError::Connection(_) => ErrorKind::Connection,
            LinkError::Protocol { .. } => ErrorKind::Protocol,
            LinkError::Validation(_) => ErrorKind::Validation,
            LinkError::QueueFull { .. } => ErrorKind::QueueFull,
        }
    }

    /// Returns `true` if this error may be retried.
    pub fn is_transient(&self) -> bool {
        self.kind().is_transient()
    }
}
