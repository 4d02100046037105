//! Sliding-window admission control for outbound messages.
//!
//! A [`SlidingWindow`] remembers the timestamps of recently admitted sends. A new
//! send is admitted only if fewer than `messages` sends were admitted within the
//! trailing `window`. Otherwise the caller gets [`Admission::Deferred`] together with
//! the time until the oldest admission leaves the window.
//!
//! The check is synchronous and never sleeps: deferral is a signal to keep the
//! message queued and try again later, not an error.
//!
//! # Examples
//!
//! ```
//! use std::time::{Duration, Instant};
//! use tether_ratelimiter::{Admission, RateLimitConfig, SlidingWindow};
//!
//! let mut window = SlidingWindow::new(RateLimitConfig::new(2, Duration::from_secs(1)));
//! let now = Instant::now();
//!
//! assert!(window.try_acquire(now).is_admitted());
//! assert!(window.try_acquire(now).is_admitted());
//!
//! match window.try_acquire(now) {
//!     Admission::Deferred { retry_after } => assert_eq!(retry_after, Duration::from_secs(1)),
//!     Admission::Admitted => unreachable!(),
//! }
//!
//! // Once the window slides past the first admissions, sends are admitted again.
//! assert!(window.try_acquire(now + Duration::from_secs(1)).is_admitted());
//! ```

mod config;
mod limiter;

pub use config::RateLimitConfig;
pub use limiter::{Admission, SlidingWindow};
