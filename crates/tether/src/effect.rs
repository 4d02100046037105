//! Outputs of the state machine.

use crate::event::{CloseFrame, Event};
use crate::events::ConnectionEvent;
use crate::socket::SocketId;
use crate::status::ConnectionStatus;
use bytes::Bytes;
use std::time::Duration;
use tether_queue::MessageId;

/// Timers the machine can arm. Each belongs to exactly one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timer {
    /// Next liveness probe.
    Ping,
    /// Deadline for the outstanding probe's response.
    PongTimeout,
    /// Retry of a drain the rate limiter deferred.
    Drain,
    /// Next reconnection attempt.
    Retry,
    /// Deadline for the peer to acknowledge a close.
    CloseTimeout,
}

impl Timer {
    /// All timers.
    pub const ALL: [Timer; 5] = [
        Timer::Ping,
        Timer::PongTimeout,
        Timer::Drain,
        Timer::Retry,
        Timer::CloseTimeout,
    ];

    /// Status that arms this timer and must cancel it on exit.
    pub fn owner(self) -> ConnectionStatus {
        match self {
            Timer::Ping | Timer::PongTimeout | Timer::Drain => ConnectionStatus::Connected,
            Timer::Retry => ConnectionStatus::Reconnecting,
            Timer::CloseTimeout => ConnectionStatus::Disconnecting,
        }
    }

    /// Timers owned by `status`.
    pub fn owned_by(status: ConnectionStatus) -> impl Iterator<Item = Timer> {
        Timer::ALL.into_iter().filter(move |t| t.owner() == status)
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// Something the actor must do on the machine's behalf.
#[derive(Debug, Clone)]
pub enum Effect {
    /// Create a socket.
    Connect {
        /// Id the new socket's callbacks will carry.
        socket: SocketId,
        /// Target URL.
        url: String,
        /// Requested sub-protocols.
        protocols: Vec<String>,
    },
    /// Send one queued message and report the outcome as
    /// [`Event::SendSucceeded`] or [`Event::SendFailed`].
    Transmit {
        /// Socket to send on.
        socket: SocketId,
        /// Queued message.
        id: MessageId,
        /// Bytes to send.
        payload: Bytes,
    },
    /// Send a liveness probe.
    Probe {
        /// Socket to probe.
        socket: SocketId,
        /// Probe bytes.
        payload: Bytes,
    },
    /// Start a close handshake and keep the socket until it completes.
    Close {
        /// Socket to close.
        socket: SocketId,
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
    /// Drop the socket, optionally closing it first.
    Release {
        /// Socket to drop.
        socket: SocketId,
        /// Close frame to send before dropping.
        close: Option<CloseFrame>,
    },
    /// Arm a timer, replacing any deadline it already has.
    Schedule {
        /// Timer to arm.
        timer: Timer,
        /// Delay from now.
        after: Duration,
        /// Event raised when it fires.
        event: Event,
    },
    /// Disarm a timer.
    Cancel(Timer),
    /// Disarm every timer.
    CancelAll,
    /// Process an event before the next inbox item.
    Raise(Event),
    /// Deliver a notification to listeners and subscribers.
    Notify(ConnectionEvent),
}

impl Effect {
    /// Returns `true` for effects that touch the socket.
    pub fn is_socket_call(&self) -> bool {
        matches!(
            self,
            Effect::Connect { .. }
                | Effect::Transmit { .. }
                | Effect::Probe { .. }
                | Effect::Close { .. }
                | Effect::Release { .. }
        )
    }
}
