use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Probe bookkeeping for one connection.
///
/// Records when the last probe went out and when the last response came back, and
/// keeps a bounded ring of round-trip latencies. It holds no timers: scheduling the
/// next probe and the response deadline is the owner's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthMonitor {
    last_probe: Option<Instant>,
    last_response: Option<Instant>,
    awaiting_response: bool,
    samples: VecDeque<Duration>,
    capacity: usize,
}

impl HealthMonitor {
    /// Creates a monitor that keeps up to `capacity` latency samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            last_probe: None,
            last_response: None,
            awaiting_response: false,
            samples: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    /// Records that a probe was sent at `now`.
    pub fn record_probe(&mut self, now: Instant) {
        self.last_probe = Some(now);
        self.awaiting_response = true;
    }

    /// Records a response with a measured round-trip latency.
    pub fn record_response(&mut self, now: Instant, latency: Duration) {
        self.last_response = Some(now);
        self.awaiting_response = false;
        if self.capacity == 0 {
            return;
        }
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(latency);
    }

    /// Time elapsed since the outstanding probe. `None` when no probe awaits a
    /// response, so late or duplicate responses measure nothing.
    pub fn latency_since_probe(&self, now: Instant) -> Option<Duration> {
        self.last_probe
            .filter(|_| self.awaiting_response)
            .map(|sent| now.saturating_duration_since(sent))
    }

    /// When the last probe was sent.
    pub fn last_probe(&self) -> Option<Instant> {
        self.last_probe
    }

    /// When the last response arrived.
    pub fn last_response(&self) -> Option<Instant> {
        self.last_response
    }

    /// Returns `true` if a probe is outstanding.
    pub fn is_awaiting_response(&self) -> bool {
        self.awaiting_response
    }

    /// Retained latency samples, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = Duration> + '_ {
        self.samples.iter().copied()
    }

    /// Number of retained samples.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Most recent latency.
    pub fn last_latency(&self) -> Option<Duration> {
        self.samples.back().copied()
    }

    /// Mean latency over the ring.
    pub fn average_latency(&self) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        let total: Duration = self.samples.iter().sum();
        Some(total / self.samples.len() as u32)
    }

    /// Fastest retained latency.
    pub fn min_latency(&self) -> Option<Duration> {
        self.samples.iter().min().copied()
    }

    /// Slowest retained latency.
    pub fn max_latency(&self) -> Option<Duration> {
        self.samples.iter().max().copied()
    }

    /// Forgets probe times and samples.
    pub fn reset(&mut self) {
        self.last_probe = None;
        self.last_response = None;
        self.awaiting_response = false;
        self.samples.clear();
    }
}
