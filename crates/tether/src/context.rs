//! The state owned by a connection.
//!
//! A [`Context`] is created once per connection and replaced wholesale by every
//! transition of the [`Machine`](crate::Machine). Outside the machine it is read-only:
//! callers see it through accessors and through the snapshots attached to
//! [`ConnectionEvent::StateChanged`](crate::ConnectionEvent::StateChanged).

use crate::config::LinkConfig;
use crate::socket::SocketId;
use crate::status::ConnectionStatus;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tether_core::{ErrorKind, LinkError};
use tether_healthcheck::HealthMonitor;
use tether_queue::MessageQueue;
use tether_ratelimiter::SlidingWindow;
use tether_reconnect::ReconnectPolicy;

/// Where the connection points and what it currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub(crate) url: Option<String>,
    pub(crate) protocols: Vec<String>,
    pub(crate) socket: Option<SocketId>,
    pub(crate) status: ConnectionStatus,
    pub(crate) ready_state: u8,
}

impl ConnectionInfo {
    fn new() -> Self {
        Self {
            url: None,
            protocols: Vec::new(),
            socket: None,
            status: ConnectionStatus::Disconnected,
            ready_state: ConnectionStatus::Disconnected.ready_state(),
        }
    }

    /// Target URL of the last accepted CONNECT.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Requested sub-protocols.
    pub fn protocols(&self) -> &[String] {
        &self.protocols
    }

    /// The live socket, if any.
    pub fn socket(&self) -> Option<SocketId> {
        self.socket
    }

    /// Current status.
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Raw ready-state code.
    pub fn ready_state(&self) -> u8 {
        self.ready_state
    }
}

/// Reconnection bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryState {
    pub(crate) attempts: u32,
    pub(crate) max_attempts: u32,
    pub(crate) base_interval: Duration,
    pub(crate) backoff_rate: f64,
    pub(crate) last_attempt: Option<Instant>,
}

impl RetryState {
    pub(crate) fn from_config(config: &LinkConfig) -> Self {
        Self {
            attempts: 0,
            max_attempts: config.max_reconnect_attempts,
            base_interval: config.reconnect_interval,
            backoff_rate: config.reconnect_backoff_rate,
            last_attempt: None,
        }
    }

    /// Failed attempts since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Attempt limit for this session.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the first retry.
    pub fn base_interval(&self) -> Duration {
        self.base_interval
    }

    /// Growth factor between delays.
    pub fn backoff_rate(&self) -> f64 {
        self.backoff_rate
    }

    /// When the last failed attempt was recorded.
    pub fn last_attempt(&self) -> Option<Instant> {
        self.last_attempt
    }

    /// Returns `true` if another attempt is allowed.
    pub fn within_limit(&self) -> bool {
        self.attempts < self.max_attempts
    }
}

/// One entry of the error history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// When the error was recorded.
    pub at: Instant,
    /// Taxonomy bucket.
    pub kind: ErrorKind,
    /// Rendered error.
    pub message: String,
    /// What the connection was doing.
    pub note: String,
}

impl ErrorRecord {
    pub(crate) fn new(at: Instant, error: &LinkError, note: impl Into<String>) -> Self {
        Self {
            at,
            kind: error.kind(),
            message: error.to_string(),
            note: note.into(),
        }
    }
}

/// Bounded error log. The oldest entry is evicted past capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorHistory {
    records: VecDeque<ErrorRecord>,
    capacity: usize,
    total: u64,
}

impl ErrorHistory {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(64)),
            capacity,
            total: 0,
        }
    }

    pub(crate) fn push(&mut self, record: ErrorRecord) {
        self.total += 1;
        if self.capacity == 0 {
            return;
        }
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Retained records, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ErrorRecord> + '_ {
        self.records.iter()
    }

    /// Most recent record.
    pub fn last(&self) -> Option<&ErrorRecord> {
        self.records.back()
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Maximum number of retained records.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Errors recorded since the context was created, including evicted ones.
    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Traffic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MessageMetrics {
    /// Messages transmitted.
    pub sent: u64,
    /// Messages received.
    pub received: u64,
    /// Payload bytes transmitted.
    pub bytes_sent: u64,
    /// Payload bytes received.
    pub bytes_received: u64,
    /// Failed transmits.
    pub send_failures: u64,
    /// Drains deferred by the rate limiter.
    pub deferred: u64,
    /// Messages evicted from a full queue.
    pub evicted: u64,
    /// Probes sent.
    pub probes_sent: u64,
    /// Probe responses received.
    pub pongs_received: u64,
}

/// Everything the state machine knows about a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    pub(crate) connection: ConnectionInfo,
    pub(crate) retry: RetryState,
    pub(crate) queue: MessageQueue,
    pub(crate) health: HealthMonitor,
    pub(crate) rate_limit: SlidingWindow,
    pub(crate) errors: ErrorHistory,
    pub(crate) metrics: MessageMetrics,
    pub(crate) next_socket: u64,
    pub(crate) jitter_seed: u64,
}

impl Context {
    /// Creates a context with defaults taken from `config` and a random jitter seed.
    pub fn new(config: &LinkConfig) -> Self {
        Self::with_seed(config, rand::random())
    }

    /// Creates a context with an explicit jitter seed.
    pub fn with_seed(config: &LinkConfig, jitter_seed: u64) -> Self {
        Self {
            connection: ConnectionInfo::new(),
            retry: RetryState::from_config(config),
            queue: MessageQueue::new(config.message_queue_size, config.overflow_policy),
            health: HealthMonitor::new(config.health.samples()),
            rate_limit: SlidingWindow::new(config.rate_limit),
            errors: ErrorHistory::new(config.error_history_size),
            metrics: MessageMetrics::default(),
            next_socket: 1,
            jitter_seed,
        }
    }

    /// Returns a default context that keeps the socket counter and jitter seed.
    pub(crate) fn reset(&self, config: &LinkConfig) -> Self {
        let mut fresh = Self::with_seed(config, self.jitter_seed);
        fresh.next_socket = self.next_socket;
        fresh
    }

    pub(crate) fn allocate_socket(&mut self) -> SocketId {
        let id = SocketId(self.next_socket);
        self.next_socket += 1;
        id
    }

    pub(crate) fn policy(&self, config: &LinkConfig) -> ReconnectPolicy {
        ReconnectPolicy::new(
            self.retry.base_interval,
            self.retry.backoff_rate,
            config.max_reconnect_delay,
        )
        .with_jitter(config.reconnect_jitter, self.jitter_seed)
    }

    /// Connection details.
    pub fn connection(&self) -> &ConnectionInfo {
        &self.connection
    }

    /// Reconnection bookkeeping.
    pub fn retry(&self) -> &RetryState {
        &self.retry
    }

    /// Outbound queue.
    pub fn queue(&self) -> &MessageQueue {
        &self.queue
    }

    /// Probe bookkeeping and latency samples.
    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    /// Rate-limit window.
    pub fn rate_limit(&self) -> &SlidingWindow {
        &self.rate_limit
    }

    /// Error history.
    pub fn errors(&self) -> &ErrorHistory {
        &self.errors
    }

    /// Traffic counters.
    pub fn metrics(&self) -> &MessageMetrics {
        &self.metrics
    }

    /// Current status.
    pub fn status(&self) -> ConnectionStatus {
        self.connection.status
    }

    /// Failed attempts since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.retry.attempts
    }

    /// The live socket, if any.
    pub fn socket(&self) -> Option<SocketId> {
        self.connection.socket
    }
}
