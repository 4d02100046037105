//! Inputs to the state machine.

use crate::socket::SocketError;
use bytes::Bytes;
use std::time::Duration;
use tether_core::LinkError;
use tether_queue::{MessageId, Priority};

/// Normal closure.
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code used when a close handshake never completes.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Close codes that indicate a recoverable condition.
const TRANSIENT_CLOSE_CODES: [u16; 7] = [1001, 1005, 1006, 1011, 1012, 1013, 1014];

/// Per-session overrides supplied with CONNECT.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectOptions {
    /// Overrides `max_reconnect_attempts`.
    pub max_attempts: Option<u32>,
    /// Overrides `reconnect_interval`.
    pub base_interval: Option<Duration>,
    /// Overrides `reconnect_backoff_rate`. Values below 1.0 are raised to 1.0.
    pub backoff_rate: Option<f64>,
}

impl ConnectOptions {
    /// Overrides the attempt limit.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Overrides the first retry delay.
    pub fn base_interval(mut self, interval: Duration) -> Self {
        self.base_interval = Some(interval);
        self
    }

    /// Overrides the backoff growth factor.
    pub fn backoff_rate(mut self, rate: f64) -> Self {
        self.backoff_rate = Some(rate);
        self
    }
}

/// A close code and reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// Close code.
    pub code: u16,
    /// Close reason.
    pub reason: String,
}

impl CloseFrame {
    /// Creates a frame.
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

/// Classifies a close observed from the peer.
///
/// Returns `None` for a clean normal closure, a transient [`LinkError::Connection`]
/// for unclean closes and recoverable codes, and a fatal [`LinkError::Protocol`]
/// otherwise.
pub fn classify_close(code: u16, reason: &str, clean: bool) -> Option<LinkError> {
    if clean && code == CLOSE_NORMAL {
        return None;
    }
    if !clean || TRANSIENT_CLOSE_CODES.contains(&code) {
        return Some(LinkError::Connection(if reason.is_empty() {
            format!("socket closed with code {code}")
        } else {
            format!("socket closed with code {code}: {reason}")
        }));
    }
    Some(LinkError::Protocol {
        code,
        reason: reason.to_string(),
    })
}

/// Why an ERROR event was raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCause {
    /// The adapter failed to create a socket.
    ConnectFailed(SocketError),
    /// The socket reported a failure.
    Socket(SocketError),
    /// Sending a probe failed.
    Transport(SocketError),
    /// No probe response arrived in time.
    PongTimeout {
        /// How long the machine waited.
        waited: Duration,
    },
}

impl ErrorCause {
    /// Maps the cause into the shared taxonomy.
    pub fn to_link_error(&self) -> LinkError {
        match self {
            ErrorCause::ConnectFailed(err)
            | ErrorCause::Socket(err)
            | ErrorCause::Transport(err) => {
                if err.kind.is_transient() {
                    LinkError::Connection(err.to_string())
                } else {
                    LinkError::Protocol {
                        code: 1002,
                        reason: err.message.clone(),
                    }
                }
            }
            ErrorCause::PongTimeout { waited } => {
                LinkError::Connection(format!("no pong within {waited:?}"))
            }
        }
    }

    /// Short description used as the error-history note.
    pub fn note(&self) -> &'static str {
        match self {
            ErrorCause::ConnectFailed(_) => "connect failed",
            ErrorCause::Socket(_) => "socket error",
            ErrorCause::Transport(_) => "probe send failed",
            ErrorCause::PongTimeout { .. } => "pong timeout",
        }
    }
}

/// An input to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Open a connection.
    Connect {
        /// Target URL.
        url: String,
        /// Requested sub-protocols.
        protocols: Vec<String>,
        /// Session overrides.
        options: ConnectOptions,
    },
    /// The socket finished its handshake.
    Open,
    /// A failure occurred.
    Error(ErrorCause),
    /// The socket closed.
    Close {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
        /// Whether the close handshake completed.
        clean: bool,
    },
    /// Close the connection gracefully.
    Disconnect {
        /// Close code sent to the peer.
        code: u16,
        /// Close reason sent to the peer.
        reason: String,
    },
    /// A backoff delay elapsed.
    Retry {
        /// Attempt number, starting at 1.
        attempt: u32,
        /// Delay that was waited.
        delay: Duration,
    },
    /// Reconnection attempts are exhausted.
    MaxRetries,
    /// Inbound message.
    Message(Bytes),
    /// Queue an outbound message.
    Send {
        /// Message bytes.
        payload: Bytes,
        /// Drain lane.
        priority: Priority,
    },
    /// Time to probe the peer.
    Ping,
    /// The peer answered a probe.
    Pong {
        /// Round-trip time.
        latency: Duration,
    },
    /// Shut down for good.
    Terminate,
    /// A transmit completed.
    SendSucceeded {
        /// Transmitted message.
        id: MessageId,
    },
    /// A transmit failed.
    SendFailed {
        /// Message that stays queued.
        id: MessageId,
        /// Adapter failure.
        error: SocketError,
    },
    /// Retry a drain the rate limiter deferred.
    Flush,
}

impl Event {
    /// Convenience constructor for CONNECT without protocols or overrides.
    pub fn connect(url: impl Into<String>) -> Self {
        Event::Connect {
            url: url.into(),
            protocols: Vec::new(),
            options: ConnectOptions::default(),
        }
    }

    /// Convenience constructor for a normal-priority SEND.
    pub fn send(payload: impl Into<Bytes>) -> Self {
        Event::Send {
            payload: payload.into(),
            priority: Priority::Normal,
        }
    }

    /// Convenience constructor for a high-priority SEND.
    pub fn send_high(payload: impl Into<Bytes>) -> Self {
        Event::Send {
            payload: payload.into(),
            priority: Priority::High,
        }
    }

    /// Convenience constructor for a normal DISCONNECT.
    pub fn disconnect() -> Self {
        Event::Disconnect {
            code: CLOSE_NORMAL,
            reason: String::new(),
        }
    }

    /// Stable name, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Event::Connect { .. } => "CONNECT",
            Event::Open => "OPEN",
            Event::Error(_) => "ERROR",
            Event::Close { .. } => "CLOSE",
            Event::Disconnect { .. } => "DISCONNECT",
            Event::Retry { .. } => "RETRY",
            Event::MaxRetries => "MAX_RETRIES",
            Event::Message(_) => "MESSAGE",
            Event::Send { .. } => "SEND",
            Event::Ping => "PING",
            Event::Pong { .. } => "PONG",
            Event::Terminate => "TERMINATE",
            Event::SendSucceeded { .. } => "SEND_SUCCEEDED",
            Event::SendFailed { .. } => "SEND_FAILED",
            Event::Flush => "FLUSH",
        }
    }
}
