//! Notifications delivered to listeners and subscribers.

use crate::context::{Context, ErrorRecord};
use crate::status::ConnectionStatus;
use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tether_core::{LifecycleEvent, LinkError};
use tether_queue::MessageId;

/// Events emitted by a connection.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// The status changed.
    StateChanged {
        connection_name: String,
        timestamp: Instant,
        from: ConnectionStatus,
        to: ConnectionStatus,
        /// Context right after the transition.
        snapshot: Arc<Context>,
    },
    /// A message arrived.
    Message {
        connection_name: String,
        timestamp: Instant,
        payload: Bytes,
    },
    /// Reconnection gave up. The connection is back at disconnected.
    MaxRetries {
        connection_name: String,
        timestamp: Instant,
        attempts: u32,
        last_error: Option<ErrorRecord>,
    },
    /// An unrecoverable failure parked the connection at disconnected.
    FatalError {
        connection_name: String,
        timestamp: Instant,
        error: LinkError,
    },
    /// A message was refused because the queue is full.
    QueueFull {
        connection_name: String,
        timestamp: Instant,
        capacity: usize,
    },
    /// A queued message was dropped to make room.
    MessageEvicted {
        connection_name: String,
        timestamp: Instant,
        id: MessageId,
    },
    /// The rate limiter deferred the queue drain.
    SendDeferred {
        connection_name: String,
        timestamp: Instant,
        retry_after: Duration,
    },
    /// A command was refused without a state change.
    Rejected {
        connection_name: String,
        timestamp: Instant,
        reason: String,
    },
}

impl LifecycleEvent for ConnectionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ConnectionEvent::StateChanged { .. } => "state_changed",
            ConnectionEvent::Message { .. } => "message",
            ConnectionEvent::MaxRetries { .. } => "max_retries",
            ConnectionEvent::FatalError { .. } => "fatal_error",
            ConnectionEvent::QueueFull { .. } => "queue_full",
            ConnectionEvent::MessageEvicted { .. } => "message_evicted",
            ConnectionEvent::SendDeferred { .. } => "send_deferred",
            ConnectionEvent::Rejected { .. } => "rejected",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            ConnectionEvent::StateChanged { timestamp, .. }
            | ConnectionEvent::Message { timestamp, .. }
            | ConnectionEvent::MaxRetries { timestamp, .. }
            | ConnectionEvent::FatalError { timestamp, .. }
            | ConnectionEvent::QueueFull { timestamp, .. }
            | ConnectionEvent::MessageEvicted { timestamp, .. }
            | ConnectionEvent::SendDeferred { timestamp, .. }
            | ConnectionEvent::Rejected { timestamp, .. } => *timestamp,
        }
    }

    fn connection_name(&self) -> &str {
        match self {
            ConnectionEvent::StateChanged {
                connection_name, ..
            }
            | ConnectionEvent::Message {
                connection_name, ..
            }
            | ConnectionEvent::MaxRetries {
                connection_name, ..
            }
            | ConnectionEvent::FatalError {
                connection_name, ..
            }
            | ConnectionEvent::QueueFull {
                connection_name, ..
            }
            | ConnectionEvent::MessageEvicted {
                connection_name, ..
            }
            | ConnectionEvent::SendDeferred {
                connection_name, ..
            }
            | ConnectionEvent::Rejected {
                connection_name, ..
            } => connection_name,
        }
    }
}
