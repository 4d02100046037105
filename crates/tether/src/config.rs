//! Configuration for a connection.

use crate::context::{Context, ErrorRecord};
use crate::events::ConnectionEvent;
use crate::status::ConnectionStatus;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tether_core::{EventListeners, FnListener, LinkError};
use tether_healthcheck::HealthConfig;
use tether_queue::OverflowPolicy;
use tether_ratelimiter::RateLimitConfig;
use tether_reconnect::ReconnectPredicate;

/// Invalid configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// The backoff rate would shrink delays.
    #[error("reconnect backoff rate must be at least 1.0, got {0}")]
    BackoffRate(f64),
    /// The queue could never hold a message.
    #[error("message queue size must be greater than zero")]
    QueueSize,
    /// The rate limit could never admit a send.
    #[error("rate limit must allow at least one message per non-empty window")]
    RateLimit,
    /// Probing is enabled but could never succeed.
    #[error("pong timeout must be greater than zero when pinging is enabled")]
    PongTimeout,
    /// The jitter factor is outside `0.0..=1.0`.
    #[error("reconnect jitter must be between 0.0 and 1.0, got {0}")]
    Jitter(f64),
    /// No URL could ever be valid.
    #[error("at least one accepted URL scheme is required")]
    NoSchemes,
}

/// Validated configuration for one connection.
#[derive(Clone)]
pub struct LinkConfig {
    pub(crate) name: String,
    pub(crate) reconnect: bool,
    pub(crate) max_reconnect_attempts: u32,
    pub(crate) reconnect_interval: Duration,
    pub(crate) reconnect_backoff_rate: f64,
    pub(crate) max_reconnect_delay: Duration,
    pub(crate) reconnect_jitter: f64,
    pub(crate) health: HealthConfig,
    pub(crate) message_queue_size: usize,
    pub(crate) overflow_policy: OverflowPolicy,
    pub(crate) rate_limit: RateLimitConfig,
    pub(crate) accepted_schemes: Vec<String>,
    pub(crate) error_history_size: usize,
    pub(crate) close_timeout: Duration,
    pub(crate) reconnect_predicate: Option<ReconnectPredicate>,
    pub(crate) event_listeners: EventListeners<ConnectionEvent>,
}

impl LinkConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> LinkConfigBuilder {
        LinkConfigBuilder::new()
    }

    /// Connection name used in events, logs and metric labels.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether transient failures trigger reconnection.
    pub fn reconnect(&self) -> bool {
        self.reconnect
    }

    /// Reconnection attempts before giving up.
    pub fn max_reconnect_attempts(&self) -> u32 {
        self.max_reconnect_attempts
    }

    /// Delay before the first reconnection attempt.
    pub fn reconnect_interval(&self) -> Duration {
        self.reconnect_interval
    }

    /// Growth factor between reconnection delays.
    pub fn reconnect_backoff_rate(&self) -> f64 {
        self.reconnect_backoff_rate
    }

    /// Upper bound on any reconnection delay.
    pub fn max_reconnect_delay(&self) -> Duration {
        self.max_reconnect_delay
    }

    /// Jitter factor applied to reconnection delays.
    pub fn reconnect_jitter(&self) -> f64 {
        self.reconnect_jitter
    }

    /// Liveness probing settings.
    pub fn health(&self) -> &HealthConfig {
        &self.health
    }

    /// Outbound queue capacity.
    pub fn message_queue_size(&self) -> usize {
        self.message_queue_size
    }

    /// What happens when the queue is full.
    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.overflow_policy
    }

    /// Outbound rate limit.
    pub fn rate_limit(&self) -> RateLimitConfig {
        self.rate_limit
    }

    /// URL schemes accepted by CONNECT.
    pub fn accepted_schemes(&self) -> &[String] {
        &self.accepted_schemes
    }

    /// Number of errors kept for diagnostics.
    pub fn error_history_size(&self) -> usize {
        self.error_history_size
    }

    /// How long to wait for the peer to acknowledge a close.
    pub fn close_timeout(&self) -> Duration {
        self.close_timeout
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        // The default builder always validates.
        LinkConfigBuilder::new().assemble()
    }
}

impl std::fmt::Debug for LinkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkConfig")
            .field("name", &self.name)
            .field("reconnect", &self.reconnect)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("reconnect_interval", &self.reconnect_interval)
            .field("reconnect_backoff_rate", &self.reconnect_backoff_rate)
            .field("max_reconnect_delay", &self.max_reconnect_delay)
            .field("reconnect_jitter", &self.reconnect_jitter)
            .field("health", &self.health)
            .field("message_queue_size", &self.message_queue_size)
            .field("overflow_policy", &self.overflow_policy)
            .field("rate_limit", &self.rate_limit)
            .field("accepted_schemes", &self.accepted_schemes)
            .field("error_history_size", &self.error_history_size)
            .field("close_timeout", &self.close_timeout)
            .field("has_predicate", &self.reconnect_predicate.is_some())
            .field("event_listeners", &self.event_listeners)
            .finish()
    }
}

/// Builder for [`LinkConfig`].
pub struct LinkConfigBuilder {
    name: String,
    reconnect: bool,
    max_reconnect_attempts: u32,
    reconnect_interval: Duration,
    reconnect_backoff_rate: f64,
    max_reconnect_delay: Duration,
    reconnect_jitter: f64,
    ping_interval: Duration,
    pong_timeout: Duration,
    latency_samples: usize,
    probe_payload: Bytes,
    message_queue_size: usize,
    overflow_policy: OverflowPolicy,
    rate_limit: RateLimitConfig,
    accepted_schemes: Vec<String>,
    error_history_size: usize,
    close_timeout: Duration,
    reconnect_predicate: Option<ReconnectPredicate>,
    event_listeners: EventListeners<ConnectionEvent>,
}

impl Default for LinkConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        let health = HealthConfig::default();
        Self {
            name: String::from("<unnamed>"),
            reconnect: true,
            max_reconnect_attempts: 5,
            reconnect_interval: Duration::from_secs(1),
            reconnect_backoff_rate: 1.5,
            max_reconnect_delay: Duration::from_secs(30),
            reconnect_jitter: 0.0,
            ping_interval: health.ping_interval(),
            pong_timeout: health.pong_timeout(),
            latency_samples: health.samples(),
            probe_payload: health.probe_payload().clone(),
            message_queue_size: 100,
            overflow_policy: OverflowPolicy::default(),
            rate_limit: RateLimitConfig::default(),
            accepted_schemes: vec!["ws".to_string(), "wss".to_string()],
            error_history_size: 50,
            close_timeout: Duration::from_secs(5),
            reconnect_predicate: None,
            event_listeners: EventListeners::new(),
        }
    }

    /// Gives the connection a name for events, logs and metrics.
    ///
    /// Default: `<unnamed>`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Enables or disables automatic reconnection.
    ///
    /// Default: true
    pub fn reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Sets how many reconnection attempts are made before giving up.
    ///
    /// Default: 5
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Sets the delay before the first reconnection attempt.
    ///
    /// Default: 1 second
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Sets the growth factor between reconnection delays.
    ///
    /// Default: 1.5
    pub fn reconnect_backoff_rate(mut self, rate: f64) -> Self {
        self.reconnect_backoff_rate = rate;
        self
    }

    /// Caps every reconnection delay.
    ///
    /// Default: 30 seconds
    pub fn max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.max_reconnect_delay = delay;
        self
    }

    /// Spreads reconnection delays by up to `±factor` of their nominal value.
    ///
    /// Default: 0.0 (disabled)
    pub fn reconnect_jitter(mut self, factor: f64) -> Self {
        self.reconnect_jitter = factor;
        self
    }

    /// Sets the probe interval. Zero disables probing.
    ///
    /// Default: 30 seconds
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Sets how long to wait for a probe response.
    ///
    /// Default: 10 seconds
    pub fn pong_timeout(mut self, timeout: Duration) -> Self {
        self.pong_timeout = timeout;
        self
    }

    /// Sets how many latency samples to keep.
    ///
    /// Default: 20
    pub fn latency_samples(mut self, samples: usize) -> Self {
        self.latency_samples = samples;
        self
    }

    /// Sets the bytes sent with every probe.
    ///
    /// Default: `b"ping"`
    pub fn probe_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.probe_payload = payload.into();
        self
    }

    /// Sets the outbound queue capacity.
    ///
    /// Default: 100
    pub fn message_queue_size(mut self, size: usize) -> Self {
        self.message_queue_size = size;
        self
    }

    /// Sets what happens when the queue is full.
    ///
    /// Default: [`OverflowPolicy::EvictOldestNormal`]
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Limits outbound sends to `messages` per `window`.
    ///
    /// Default: 100 messages per second
    pub fn rate_limit(mut self, messages: usize, window: Duration) -> Self {
        self.rate_limit = RateLimitConfig::new(messages, window);
        self
    }

    /// Replaces the accepted URL schemes.
    ///
    /// Default: `ws`, `wss`
    pub fn accepted_schemes<I, S>(mut self, schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted_schemes = schemes
            .into_iter()
            .map(|s| s.into().to_ascii_lowercase())
            .collect();
        self
    }

    /// Sets how many errors are kept for diagnostics.
    ///
    /// Default: 50
    pub fn error_history_size(mut self, size: usize) -> Self {
        self.error_history_size = size;
        self
    }

    /// Sets how long to wait for the peer to acknowledge a close.
    ///
    /// Default: 5 seconds
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Vetoes reconnection for specific transient failures.
    ///
    /// The predicate returns `true` if the failure should trigger reconnection.
    pub fn reconnect_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&LinkError) -> bool + Send + Sync + 'static,
    {
        self.reconnect_predicate = Some(Arc::new(predicate));
        self
    }

    /// Registers a callback for every connection event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }

    /// Registers a callback for status changes.
    ///
    /// The callback receives the old status, the new status and the context as it
    /// was right after the transition.
    pub fn on_state_change<F>(mut self, f: F) -> Self
    where
        F: Fn(ConnectionStatus, ConnectionStatus, &Context) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &ConnectionEvent| {
                if let ConnectionEvent::StateChanged {
                    from, to, snapshot, ..
                } = event
                {
                    f(*from, *to, snapshot);
                }
            }));
        self
    }

    /// Registers a callback for reconnection exhaustion.
    ///
    /// The callback receives the number of attempts made and the last recorded
    /// error.
    pub fn on_max_retries<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, Option<&ErrorRecord>) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &ConnectionEvent| {
                if let ConnectionEvent::MaxRetries {
                    attempts,
                    last_error,
                    ..
                } = event
                {
                    f(*attempts, last_error.as_ref());
                }
            }));
        self
    }

    /// Registers a callback for unrecoverable failures.
    pub fn on_fatal_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&LinkError) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &ConnectionEvent| {
                if let ConnectionEvent::FatalError { error, .. } = event {
                    f(error);
                }
            }));
        self
    }

    /// Registers a callback for inbound messages.
    pub fn on_message<F>(mut self, f: F) -> Self
    where
        F: Fn(&Bytes) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &ConnectionEvent| {
                if let ConnectionEvent::Message { payload, .. } = event {
                    f(payload);
                }
            }));
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.reconnect_backoff_rate.is_nan() || self.reconnect_backoff_rate < 1.0 {
            return Err(ConfigError::BackoffRate(self.reconnect_backoff_rate));
        }
        if self.message_queue_size == 0 {
            return Err(ConfigError::QueueSize);
        }
        if !self.rate_limit.is_usable() {
            return Err(ConfigError::RateLimit);
        }
        if !self.ping_interval.is_zero() && self.pong_timeout.is_zero() {
            return Err(ConfigError::PongTimeout);
        }
        if !(0.0..=1.0).contains(&self.reconnect_jitter) {
            return Err(ConfigError::Jitter(self.reconnect_jitter));
        }
        if self.accepted_schemes.is_empty() {
            return Err(ConfigError::NoSchemes);
        }
        Ok(())
    }

    fn assemble(self) -> LinkConfig {
        LinkConfig {
            name: self.name,
            reconnect: self.reconnect,
            max_reconnect_attempts: self.max_reconnect_attempts,
            reconnect_interval: self.reconnect_interval,
            reconnect_backoff_rate: self.reconnect_backoff_rate,
            max_reconnect_delay: self.max_reconnect_delay,
            reconnect_jitter: self.reconnect_jitter,
            health: HealthConfig::builder()
                .ping_interval(self.ping_interval)
                .pong_timeout(self.pong_timeout)
                .samples(self.latency_samples)
                .probe_payload(self.probe_payload)
                .build(),
            message_queue_size: self.message_queue_size,
            overflow_policy: self.overflow_policy,
            rate_limit: self.rate_limit,
            accepted_schemes: self.accepted_schemes,
            error_history_size: self.error_history_size,
            close_timeout: self.close_timeout,
            reconnect_predicate: self.reconnect_predicate,
            event_listeners: self.event_listeners,
        }
    }

    /// Validates and builds the configuration.
    pub fn build(self) -> Result<LinkConfig, ConfigError> {
        self.validate()?;
        Ok(self.assemble())
    }
}
