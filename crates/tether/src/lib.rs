//! Connection-lifecycle state machine for persistent, message-oriented clients.
//!
//! `tether` keeps one logical connection alive: it establishes it, reconnects with
//! exponential backoff after transient failures, queues outbound messages under
//! backpressure, rate-limits the drain, and probes the peer for liveness.
//!
//! # Architecture
//!
//! - [`Machine`] is a pure reducer. [`Machine::step`] takes a [`Context`], an
//!   [`Event`] and the current time, and returns the next context together with the
//!   [`Effect`]s to perform. It never touches a socket, a clock or a timer.
//! - [`Connection`] is the actor that runs a machine on tokio. It serializes every
//!   input through one inbox, executes effects, owns the socket handle and the
//!   timers, and publishes notifications.
//! - [`SocketAdapter`] and [`SocketHandle`] are the transport boundary. Callbacks
//!   flow back through [`SocketEvents`], tagged with the socket they belong to.
//! - [`ConnectionHandle`] is the caller API, also available as a
//!   `tower::Service<Command>`.
//!
//! The building blocks live in their own crates and are re-exported here:
//! `tether-queue`, `tether-ratelimiter`, `tether-healthcheck` and `tether-reconnect`.
//!
//! # Example
//!
//! ```rust,no_run
//! use tether::{
//!     Connection, ConnectionStatus, LinkConfig, SocketAdapter, SocketError, SocketEvents,
//!     SocketHandle,
//! };
//! use std::time::Duration;
//!
//! struct Echo(SocketEvents);
//!
//! impl SocketHandle for Echo {
//!     fn send(&mut self, payload: &[u8]) -> Result<(), SocketError> {
//!         self.0.message(payload.to_vec());
//!         Ok(())
//!     }
//!
//!     fn close(&mut self, code: u16, reason: &str) {
//!         self.0.close(code, reason.to_string(), true);
//!     }
//! }
//!
//! struct EchoAdapter;
//!
//! impl SocketAdapter for EchoAdapter {
//!     type Handle = Echo;
//!
//!     fn connect(
//!         &mut self,
//!         _url: &str,
//!         _protocols: &[String],
//!         events: SocketEvents,
//!     ) -> Result<Echo, SocketError> {
//!         events.open();
//!         Ok(Echo(events))
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LinkConfig::builder()
//!     .name("echo")
//!     .ping_interval(Duration::ZERO)
//!     .on_message(|payload| println!("received {} bytes", payload.len()))
//!     .build()?;
//!
//! let handle = Connection::spawn(config, EchoAdapter);
//! handle.connect("ws://localhost:9000")?;
//! handle.wait_for(ConnectionStatus::Connected).await?;
//! handle.send("hello")?;
//! handle.disconnect()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Feature Flags
//!
//! - `tracing` (default): log transitions, recorded errors and dropped events
//! - `metrics`: export counters, gauges and a latency histogram via the `metrics` crate
//! - `serde`: derive `Serialize`/`Deserialize` for [`SessionSnapshot`] and friends

mod actor;
pub mod config;
pub mod context;
pub mod effect;
pub mod event;
pub mod events;
pub mod guards;
mod handle;
pub mod machine;
pub mod persist;
pub mod socket;
mod status;

pub use actor::Connection;
pub use config::{ConfigError, LinkConfig, LinkConfigBuilder};
pub use context::{
    ConnectionInfo, Context, ErrorHistory, ErrorRecord, MessageMetrics, RetryState,
};
pub use effect::{Effect, Timer};
pub use event::{
    classify_close, CloseFrame, ConnectOptions, ErrorCause, Event, CLOSE_ABNORMAL, CLOSE_NORMAL,
};
pub use events::ConnectionEvent;
pub use handle::{Command, ConnectionHandle, HandleError};
pub use machine::{Machine, Step};
pub use persist::{PersistenceHook, SavedError, SavedMessage, SessionSnapshot};
pub use socket::{
    SocketAdapter, SocketError, SocketErrorKind, SocketEvent, SocketEvents, SocketHandle, SocketId,
};
pub use status::ConnectionStatus;

pub use tether_core::{
    ErrorKind, EventListener, EventListeners, FnListener, LifecycleEvent, LinkError,
};
pub use tether_healthcheck::{HealthConfig, HealthMonitor};
pub use tether_queue::{
    Enqueued, MessageId, MessageQueue, OverflowPolicy, Priority, QueueFullError, QueuedMessage,
};
pub use tether_ratelimiter::{Admission, RateLimitConfig, SlidingWindow};
pub use tether_reconnect::{ReconnectPolicy, ReconnectPredicate};
