//! Configuration for liveness probing.

use bytes::Bytes;
use std::time::Duration;

/// Configuration for the ping/pong cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthConfig {
    /// Interval between probes. Zero disables probing.
    pub(crate) ping_interval: Duration,

    /// How long to wait for a response before declaring the link dead
    pub(crate) pong_timeout: Duration,

    /// Capacity of the latency ring buffer
    pub(crate) samples: usize,

    /// Bytes sent with every probe
    pub(crate) probe_payload: Bytes,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
            samples: 20,
            probe_payload: Bytes::from_static(b"ping"),
        }
    }
}

impl HealthConfig {
    /// Create a new builder.
    pub fn builder() -> HealthConfigBuilder {
        HealthConfigBuilder::default()
    }

    /// Get the probe interval.
    pub fn ping_interval(&self) -> Duration {
        self.ping_interval
    }

    /// Get the pong timeout.
    pub fn pong_timeout(&self) -> Duration {
        self.pong_timeout
    }

    /// Get the latency sample capacity.
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Get the probe payload.
    pub fn probe_payload(&self) -> &Bytes {
        &self.probe_payload
    }

    /// Returns `true` if periodic probing is enabled.
    pub fn is_enabled(&self) -> bool {
        !self.ping_interval.is_zero()
    }
}

/// Builder for `HealthConfig`.
#[derive(Debug, Default)]
pub struct HealthConfigBuilder {
    ping_interval: Option<Duration>,
    pong_timeout: Option<Duration>,
    samples: Option<usize>,
    probe_payload: Option<Bytes>,
}

impl HealthConfigBuilder {
    /// Set the interval between probes. Zero disables probing.
    ///
    /// Default: 30 seconds
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = Some(interval);
        self
    }

    /// Set how long to wait for a pong.
    ///
    /// Default: 10 seconds
    pub fn pong_timeout(mut self, timeout: Duration) -> Self {
        self.pong_timeout = Some(timeout);
        self
    }

    /// Set how many latency samples to keep.
    ///
    /// Default: 20
    pub fn samples(mut self, samples: usize) -> Self {
        self.samples = Some(samples);
        self
    }

    /// Set the bytes sent with every probe.
    ///
    /// Default: `b"ping"`
    pub fn probe_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.probe_payload = Some(payload.into());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> HealthConfig {
        let default = HealthConfig::default();
        HealthConfig {
            ping_interval: self.ping_interval.unwrap_or(default.ping_interval),
            pong_timeout: self.pong_timeout.unwrap_or(default.pong_timeout),
            samples: self.samples.unwrap_or(default.samples),
            probe_payload: self.probe_payload.unwrap_or(default.probe_payload),
        }
    }
}
