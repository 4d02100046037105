use bytes::Bytes;
use std::fmt;
use std::time::Instant;

/// Identifier assigned to a message when it is enqueued.
///
/// Ids are unique per queue and strictly increasing in enqueue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MessageId(pub(crate) u64);

impl MessageId {
    /// Returns the raw id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Drain lane of a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Priority {
    /// Drained before any normal message. Never evicted.
    High,
    /// Drained in FIFO order after the high lane is empty.
    #[default]
    Normal,
}

impl Priority {
    /// Stable lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Normal => "normal",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message waiting to be transmitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    /// Queue-assigned id.
    pub id: MessageId,
    /// Bytes to transmit.
    pub payload: Bytes,
    /// When the message entered the queue.
    pub enqueued_at: Instant,
    /// Number of failed transmit attempts so far.
    pub attempts: u32,
    /// Drain lane.
    pub priority: Priority,
}

impl QueuedMessage {
    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns `true` if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
