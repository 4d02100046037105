use crate::config::RateLimitConfig;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The send may proceed; its timestamp has been recorded.
    Admitted,
    /// The window is full. The send should stay queued for at least `retry_after`.
    Deferred {
        /// Time until the oldest admission leaves the window.
        retry_after: Duration,
    },
}

impl Admission {
    /// Returns `true` for [`Admission::Admitted`].
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

/// Sliding-log rate limiter over a ring of admission timestamps.
///
/// The ring never holds more than `messages` entries, and entries whose age is at
/// least `window` are pruned before every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlidingWindow {
    config: RateLimitConfig,
    admitted: VecDeque<Instant>,
}

impl SlidingWindow {
    /// Creates an empty window.
    ///
    /// Storage grows with use, so a very large `messages` acts as "unlimited".
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            admitted: VecDeque::with_capacity(config.messages.min(64)),
            config,
        }
    }

    /// The configured limit.
    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Drops admissions that have aged out of the window.
    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.admitted.front() {
            if now.saturating_duration_since(oldest) >= self.config.window {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }

    /// Checks the window without recording anything.
    pub fn check(&mut self, now: Instant) -> Admission {
        self.prune(now);
        if self.admitted.len() < self.config.messages {
            Admission::Admitted
        } else {
            Admission::Deferred {
                retry_after: self.retry_after(now),
            }
        }
    }

    /// Admits a send at `now` if the window has room, recording its timestamp.
    pub fn try_acquire(&mut self, now: Instant) -> Admission {
        let admission = self.check(now);
        if admission.is_admitted() {
            self.admitted.push_back(now);
        }
        admission
    }

    /// Time until the window next has room. Zero if it has room now.
    pub fn retry_after(&self, now: Instant) -> Duration {
        if self.admitted.len() < self.config.messages {
            return Duration::ZERO;
        }
        match self.admitted.front() {
            Some(&oldest) => self
                .config
                .window
                .saturating_sub(now.saturating_duration_since(oldest)),
            // messages == 0: nothing ever leaves, so retry after a full window
            None => self.config.window,
        }
    }

    /// Number of admissions still inside the window at `now`.
    pub fn in_window(&self, now: Instant) -> usize {
        self.admitted
            .iter()
            .filter(|&&at| now.saturating_duration_since(at) < self.config.window)
            .count()
    }

    /// Timestamps currently retained, oldest first.
    pub fn timestamps(&self) -> impl Iterator<Item = Instant> + '_ {
        self.admitted.iter().copied()
    }

    /// Forgets every admission.
    pub fn reset(&mut self) {
        self.admitted.clear();
    }
}
