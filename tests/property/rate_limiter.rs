//! Property tests for the sliding-window limiter.
//!
//! Invariants tested:
//! - No window of the configured length ever holds more admissions than allowed
//! - A deferred check always names a wait that ends inside one window

use proptest::prelude::*;
use std::time::{Duration, Instant};
use tether::{Admission, RateLimitConfig, SlidingWindow};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: admissions inside any window never exceed the limit
    #[test]
    fn window_never_exceeds_limit(
        limit in 1usize..=20,
        window_ms in 10u64..=1_000,
        gaps in prop::collection::vec(0u64..=200, 1..200),
    ) {
        let window = Duration::from_millis(window_ms);
        let mut limiter = SlidingWindow::new(RateLimitConfig::new(limit, window));
        let start = Instant::now();
        let mut now = start;
        let mut admitted = Vec::new();

        for gap in gaps {
            now += Duration::from_millis(gap);
            if limiter.try_acquire(now).is_admitted() {
                admitted.push(now);
            }
            prop_assert!(limiter.in_window(now) <= limit);
        }

        // Check every window that starts at an admission
        for (i, &from) in admitted.iter().enumerate() {
            let inside = admitted[i..]
                .iter()
                .take_while(|&&at| at.duration_since(from) < window)
                .count();
            prop_assert!(
                inside <= limit,
                "{} admissions within {:?} but limit was {}",
                inside,
                window,
                limit
            );
        }
    }

    /// Property: waiting out `retry_after` always makes room
    #[test]
    fn retry_after_is_sufficient(
        limit in 1usize..=10,
        window_ms in 10u64..=1_000,
        offsets in prop::collection::vec(0u64..=50, 1..50),
    ) {
        let window = Duration::from_millis(window_ms);
        let mut limiter = SlidingWindow::new(RateLimitConfig::new(limit, window));
        let mut now = Instant::now();

        for offset in offsets {
            now += Duration::from_millis(offset);
            if let Admission::Deferred { retry_after } = limiter.try_acquire(now) {
                prop_assert!(retry_after > Duration::ZERO);
                prop_assert!(retry_after <= window);
                now += retry_after;
                prop_assert!(limiter.try_acquire(now).is_admitted());
            }
        }
    }
}
