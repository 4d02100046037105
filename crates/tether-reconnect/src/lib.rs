//! Reconnection backoff for tether connections.
//!
//! [`ReconnectPolicy`] is a pure delay calculator: given the number of failed
//! attempts it returns how long to wait before the next one. It owns no timers and
//! keeps no counters; the connection state machine tracks attempts and decides when
//! to give up.
//!
//! ```
//! use std::time::Duration;
//! use tether_reconnect::ReconnectPolicy;
//!
//! let policy = ReconnectPolicy::new(Duration::from_millis(500), 2.0, Duration::from_secs(4));
//!
//! assert_eq!(policy.delay(0), Duration::from_millis(500));
//! assert_eq!(policy.delay(2), Duration::from_secs(2));
//! assert_eq!(policy.delay(10), Duration::from_secs(4));
//! ```
//!
//! A [`ReconnectPredicate`] lets callers veto reconnection for specific failures,
//! for example authentication errors that will not heal on their own.

mod policy;

pub use policy::ReconnectPolicy;

use std::sync::Arc;
use tether_core::LinkError;

/// Decides whether a failure should trigger reconnection.
///
/// Only consulted for failures that are already transient.
pub type ReconnectPredicate = Arc<dyn Fn(&LinkError) -> bool + Send + Sync>;
