use std::time::Duration;

/// Rate limit settings: at most `messages` sends per trailing `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub(crate) messages: usize,
    pub(crate) window: Duration,
}

impl RateLimitConfig {
    /// Creates a limit of `messages` sends per `window`.
    pub fn new(messages: usize, window: Duration) -> Self {
        Self { messages, window }
    }

    /// Maximum number of sends admitted within one window.
    pub fn messages(&self) -> usize {
        self.messages
    }

    /// Length of the trailing window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns `true` if the limit can ever admit a send.
    pub fn is_usable(&self) -> bool {
        self.messages > 0 && !self.window.is_zero()
    }
}

impl Default for RateLimitConfig {
    /// 100 messages per second.
    fn default() -> Self {
        Self::new(100, Duration::from_secs(1))
    }
}
