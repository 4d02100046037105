//! Liveness probing state for a persistent connection.
//!
//! While a connection is up, its owner sends a probe every `ping_interval` and
//! expects a response within `pong_timeout`. This crate holds the bookkeeping for
//! that cycle: [`HealthConfig`] describes it and [`HealthMonitor`] records probe and
//! response times plus a ring buffer of round-trip latencies.
//!
//! ```
//! use std::time::{Duration, Instant};
//! use tether_healthcheck::{HealthConfig, HealthMonitor};
//!
//! let config = HealthConfig::builder()
//!     .ping_interval(Duration::from_secs(15))
//!     .pong_timeout(Duration::from_secs(5))
//!     .samples(10)
//!     .build();
//!
//! let mut monitor = HealthMonitor::new(config.samples());
//! let sent = Instant::now();
//! monitor.record_probe(sent);
//!
//! let received = sent + Duration::from_millis(42);
//! let latency = monitor.latency_since_probe(received).unwrap();
//! monitor.record_response(received, latency);
//!
//! assert_eq!(monitor.average_latency(), Some(Duration::from_millis(42)));
//! ```

mod config;
mod monitor;

pub use config::{HealthConfig, HealthConfigBuilder};
pub use monitor::HealthMonitor;
