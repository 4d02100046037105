//! Boundary to the transport.
//!
//! The state machine never touches a socket. The actor calls a [`SocketAdapter`] to
//! create one, keeps the returned [`SocketHandle`] as the only live reference, and
//! receives the socket's callbacks through a [`SocketEvents`] sink. Every callback is
//! tagged with the [`SocketId`] it was created for, so callbacks from a socket that
//! has since been released are recognised and dropped.

use crate::actor::Envelope;
use bytes::Bytes;
use std::fmt;
use tokio::sync::mpsc;

/// Identifier of one socket instance within a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SocketId(pub(crate) u64);

impl SocketId {
    /// Returns the raw id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "socket-{}", self.0)
    }
}

/// Broad classification of transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketErrorKind {
    /// The peer refused the connection.
    Refused,
    /// The connection was reset.
    Reset,
    /// An operation timed out.
    TimedOut,
    /// The socket is already closed.
    Closed,
    /// The peer violated the protocol. Not retryable.
    Protocol,
    /// Anything else.
    Other,
}

impl SocketErrorKind {
    /// Returns `true` unless the failure is a protocol violation.
    pub fn is_transient(self) -> bool {
        self != SocketErrorKind::Protocol
    }
}

impl fmt::Display for SocketErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SocketErrorKind::Refused => "connection refused",
            SocketErrorKind::Reset => "connection reset",
            SocketErrorKind::TimedOut => "timed out",
            SocketErrorKind::Closed => "socket closed",
            SocketErrorKind::Protocol => "protocol violation",
            SocketErrorKind::Other => "socket error",
        })
    }
}

/// A transport failure reported by the adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct SocketError {
    /// Classification.
    pub kind: SocketErrorKind,
    /// Adapter-provided detail.
    pub message: String,
}

impl SocketError {
    /// Creates an error.
    pub fn new(kind: SocketErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Creates sockets.
pub trait SocketAdapter: Send + 'static {
    /// Live socket type.
    type Handle: SocketHandle;

    /// Starts connecting to `url`.
    ///
    /// Returning an error means the attempt failed synchronously. Otherwise the
    /// adapter reports progress through `events`, starting with
    /// [`SocketEvents::open`] or [`SocketEvents::error`].
    fn connect(
        &mut self,
        url: &str,
        protocols: &[String],
        events: SocketEvents,
    ) -> Result<Self::Handle, SocketError>;
}

/// A live socket, exclusively owned by the connection actor.
pub trait SocketHandle: Send + 'static {
    /// Transmits one message.
    fn send(&mut self, payload: &[u8]) -> Result<(), SocketError>;

    /// Transmits a liveness probe. The adapter reports the response through
    /// [`SocketEvents::pong`].
    fn ping(&mut self, payload: &[u8]) -> Result<(), SocketError> {
        self.send(payload)
    }

    /// Starts a close handshake. The adapter reports completion through
    /// [`SocketEvents::close`].
    fn close(&mut self, code: u16, reason: &str);
}

/// Callback delivered by a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// Handshake completed.
    Open,
    /// Inbound message.
    Message(Bytes),
    /// Transport failure.
    Error(SocketError),
    /// Socket closed.
    Close {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
        /// Whether the close handshake completed.
        clean: bool,
    },
    /// Response to a probe.
    Pong,
}

/// Sink through which a socket reports its callbacks to the owning actor.
///
/// Cloneable and cheap. Once the actor has stopped, every call is a no-op.
#[derive(Debug, Clone)]
pub struct SocketEvents {
    socket: SocketId,
    inbox: mpsc::WeakUnboundedSender<Envelope>,
}

impl SocketEvents {
    pub(crate) fn new(socket: SocketId, inbox: mpsc::WeakUnboundedSender<Envelope>) -> Self {
        Self { socket, inbox }
    }

    /// The socket this sink reports for.
    pub fn socket(&self) -> SocketId {
        self.socket
    }

    /// Delivers an arbitrary callback. Returns `false` if the actor has stopped.
    pub fn deliver(&self, event: SocketEvent) -> bool {
        match self.inbox.upgrade() {
            Some(inbox) => inbox.send(Envelope::Socket(self.socket, event)).is_ok(),
            None => false,
        }
    }

    /// Reports a completed handshake.
    pub fn open(&self) -> bool {
        self.deliver(SocketEvent::Open)
    }

    /// Reports an inbound message.
    pub fn message(&self, payload: impl Into<Bytes>) -> bool {
        self.deliver(SocketEvent::Message(payload.into()))
    }

    /// Reports a transport failure.
    pub fn error(&self, error: SocketError) -> bool {
        self.deliver(SocketEvent::Error(error))
    }

    /// Reports that the socket closed.
    pub fn close(&self, code: u16, reason: impl Into<String>, clean: bool) -> bool {
        self.deliver(SocketEvent::Close {
            code,
            reason: reason.into(),
            clean,
        })
    }

    /// Reports a probe response.
    pub fn pong(&self) -> bool {
        self.deliver(SocketEvent::Pong)
    }
}
