//! Saving and restoring a session across process restarts.
//!
//! The connection never persists anything itself. A [`SessionSnapshot`] is the
//! portable subset of a [`Context`]: where to connect, what is still queued, and what
//! went wrong so far. Sockets, timers and rate-limit windows are not saved. How the
//! snapshot is encoded is up to a [`PersistenceHook`].

use crate::config::LinkConfig;
use crate::context::{Context, ErrorRecord, MessageMetrics};
use bytes::Bytes;
use std::time::Instant;
use tether_core::{ErrorKind, LinkError};
use tether_queue::Priority;

/// A queued message as saved in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SavedMessage {
    /// Message bytes.
    pub payload: Vec<u8>,
    /// Drain lane.
    pub priority: Priority,
}

/// An error record as saved in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SavedError {
    /// Taxonomy bucket.
    pub kind: ErrorKind,
    /// Rendered error.
    pub message: String,
    /// Where the error came from.
    pub note: String,
}

/// Portable state of a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionSnapshot {
    /// Target URL, if a CONNECT was ever accepted.
    pub url: Option<String>,
    /// Requested sub-protocols.
    pub protocols: Vec<String>,
    /// Queued messages in drain order.
    pub queued: Vec<SavedMessage>,
    /// Message counters.
    pub metrics: MessageMetrics,
    /// Retained errors, oldest first.
    pub errors: Vec<SavedError>,
}

/// Encodes and decodes snapshots.
pub trait PersistenceHook {
    /// Encoding failure.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Encodes a snapshot.
    fn serialize(&self, session: &SessionSnapshot) -> Result<Vec<u8>, Self::Error>;

    /// Decodes a snapshot.
    fn deserialize(&self, bytes: &[u8]) -> Result<SessionSnapshot, Self::Error>;
}

impl Context {
    /// Captures the portable part of this context.
    pub fn snapshot_session(&self) -> SessionSnapshot {
        SessionSnapshot {
            url: self.connection.url.clone(),
            protocols: self.connection.protocols.clone(),
            queued: self
                .queue
                .iter()
                .map(|message| SavedMessage {
                    payload: message.payload.to_vec(),
                    priority: message.priority,
                })
                .collect(),
            metrics: self.metrics,
            errors: self
                .errors
                .iter()
                .map(|record| SavedError {
                    kind: record.kind,
                    message: record.message.clone(),
                    note: record.note.clone(),
                })
                .collect(),
        }
    }

    /// Builds a disconnected context from a snapshot.
    ///
    /// Messages beyond the configured queue capacity are subject to the configured
    /// overflow policy, exactly as if they had been sent in order. Restored errors are
    /// stamped with `now`. Messages the queue refuses outright are counted in a
    /// trailing `QueueFull` error record.
    pub fn restore_session(config: &LinkConfig, session: SessionSnapshot, now: Instant) -> Self {
        let mut ctx = Context::new(config);
        ctx.connection.url = session.url;
        ctx.connection.protocols = session.protocols;
        ctx.metrics = session.metrics;

        let mut refused = None;
        let mut dropped = 0usize;
        for message in session.queued {
            let payload = Bytes::from(message.payload);
            if let Err(full) = ctx.queue.enqueue(payload, message.priority, now) {
                refused = Some(LinkError::from(full));
                dropped += 1;
            }
        }
        for error in session.errors {
            ctx.errors.push(ErrorRecord {
                at: now,
                kind: error.kind,
                message: error.message,
                note: error.note,
            });
        }
        if let Some(error) = refused {
            #[cfg(feature = "tracing")]
            tracing::warn!(dropped, "restored session exceeded the message queue");
            ctx.errors
                .push(ErrorRecord::new(now, &error, format!("restore dropped {dropped}")));
        }
        ctx
    }
}
