use crate::error::QueueFullError;
use crate::message::{MessageId, Priority, QueuedMessage};
use bytes::Bytes;
use std::collections::VecDeque;
use std::time::Instant;

/// What to do with a message that arrives while the queue is at capacity.
///
/// Under both policies a queue holding only high-priority messages rejects with
/// [`QueueFullError`], and the in-flight message is never evicted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OverflowPolicy {
    /// Evict the oldest normal-priority message to admit the new one.
    #[default]
    EvictOldestNormal,
    /// Reject new normal-priority messages. High-priority messages still
    /// evict the oldest normal-priority entry.
    RejectNewNormal,
}

/// Result of a successful [`MessageQueue::enqueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enqueued {
    /// Id assigned to the new message.
    pub id: MessageId,
    /// Message dropped to make room, if any.
    pub evicted: Option<QueuedMessage>,
}

/// Bounded two-lane outbound queue.
///
/// Messages drain high lane first, FIFO within each lane. Draining is one message at
/// a time: [`begin_send`](Self::begin_send) marks the head in flight, and
/// [`complete`](Self::complete) or [`fail`](Self::fail) settles it. A failed message
/// keeps its position, so it is retried before anything queued after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageQueue {
    high: VecDeque<QueuedMessage>,
    normal: VecDeque<QueuedMessage>,
    capacity: usize,
    policy: OverflowPolicy,
    in_flight: Option<MessageId>,
    next_id: u64,
}

impl MessageQueue {
    /// Creates an empty queue.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            high: VecDeque::new(),
            normal: VecDeque::new(),
            capacity,
            policy,
            in_flight: None,
            next_id: 1,
        }
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Configured overflow policy.
    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Number of queued messages, including the in-flight one.
    pub fn len(&self) -> usize {
        self.high.len() + self.normal.len()
    }

    /// Returns `true` if no message is queued.
    pub fn is_empty(&self) -> bool {
        self.high.is_empty() && self.normal.is_empty()
    }

    /// Total payload bytes queued.
    pub fn bytes(&self) -> usize {
        self.iter().map(QueuedMessage::len).sum()
    }

    /// Id of the message currently being transmitted.
    pub fn in_flight(&self) -> Option<MessageId> {
        self.in_flight
    }

    /// Returns `true` if a message is being transmitted.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Index of the oldest normal message that may be evicted.
    fn evictable(&self) -> Option<usize> {
        self.normal
            .iter()
            .position(|message| Some(message.id) != self.in_flight)
    }

    /// Returns `true` if a message of `priority` would be admitted.
    pub fn has_space(&self, priority: Priority) -> bool {
        if self.len() < self.capacity {
            return true;
        }
        match (self.policy, priority) {
            (OverflowPolicy::RejectNewNormal, Priority::Normal) => false,
            _ => self.evictable().is_some(),
        }
    }

    /// Admits a message, evicting the oldest normal message if the queue is full
    /// and the policy allows it.
    pub fn enqueue(
        &mut self,
        payload: impl Into<Bytes>,
        priority: Priority,
        now: Instant,
    ) -> Result<Enqueued, QueueFullError> {
        let mut evicted = None;
        if self.len() >= self.capacity {
            let full = QueueFullError {
                capacity: self.capacity,
                priority,
            };
            if self.policy == OverflowPolicy::RejectNewNormal && priority == Priority::Normal {
                return Err(full);
            }
            let index = self.evictable().ok_or(full)?;
            evicted = self.normal.remove(index);
        }

        let id = MessageId(self.next_id);
        self.next_id += 1;
        let message = QueuedMessage {
            id,
            payload: payload.into(),
            enqueued_at: now,
            attempts: 0,
            priority,
        };
        match priority {
            Priority::High => self.high.push_back(message),
            Priority::Normal => self.normal.push_back(message),
        }
        Ok(Enqueued { id, evicted })
    }

    /// The message that would be transmitted next.
    pub fn peek_next(&self) -> Option<&QueuedMessage> {
        self.high.front().or_else(|| self.normal.front())
    }

    /// Marks the next message in flight and returns a copy of it.
    ///
    /// Returns `None` if the queue is empty or a message is already in flight.
    pub fn begin_send(&mut self) -> Option<QueuedMessage> {
        if self.in_flight.is_some() {
            return None;
        }
        let next = self.peek_next()?.clone();
        self.in_flight = Some(next.id);
        Some(next)
    }

    fn position(&self, id: MessageId) -> Option<(Priority, usize)> {
        if let Some(index) = self.high.iter().position(|m| m.id == id) {
            return Some((Priority::High, index));
        }
        self.normal
            .iter()
            .position(|m| m.id == id)
            .map(|index| (Priority::Normal, index))
    }

    /// Removes a transmitted message and clears the in-flight flag.
    pub fn complete(&mut self, id: MessageId) -> Option<QueuedMessage> {
        if self.in_flight == Some(id) {
            self.in_flight = None;
        }
        match self.position(id)? {
            (Priority::High, index) => self.high.remove(index),
            (Priority::Normal, index) => self.normal.remove(index),
        }
    }

    /// Records a failed transmit. The message stays in place.
    ///
    /// Returns the message's attempt count after the failure.
    pub fn fail(&mut self, id: MessageId) -> Option<u32> {
        if self.in_flight == Some(id) {
            self.in_flight = None;
        }
        let message = match self.position(id)? {
            (Priority::High, index) => self.high.get_mut(index),
            (Priority::Normal, index) => self.normal.get_mut(index),
        }?;
        message.attempts += 1;
        Some(message.attempts)
    }

    /// Clears the in-flight flag without touching any message.
    pub fn abandon_in_flight(&mut self) {
        self.in_flight = None;
    }

    /// Iterates messages in drain order.
    pub fn iter(&self) -> impl Iterator<Item = &QueuedMessage> + '_ {
        self.high.iter().chain(self.normal.iter())
    }

    /// Drops every message. Ids keep increasing afterwards.
    pub fn clear(&mut self) {
        self.high.clear();
        self.normal.clear();
        self.in_flight = None;
    }
}
