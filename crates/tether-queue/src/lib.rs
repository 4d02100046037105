//! Bounded, priority-aware outbound queue.
//!
//! Messages wait here while the connection is not ready to transmit them, or while
//! the rate limiter defers them. The queue has two lanes: high-priority messages
//! always drain before normal ones, and each lane is FIFO.
//!
//! Capacity is a hard bound. When the queue is full, an [`OverflowPolicy`] decides
//! whether the oldest normal message makes room or the new message is refused. A
//! queue that holds only high-priority messages refuses everything with
//! [`QueueFullError`].
//!
//! # Examples
//!
//! ```
//! use std::time::Instant;
//! use tether_queue::{MessageQueue, OverflowPolicy, Priority};
//!
//! let now = Instant::now();
//! let mut queue = MessageQueue::new(2, OverflowPolicy::EvictOldestNormal);
//!
//! queue.enqueue("status", Priority::Normal, now)?;
//! queue.enqueue("auth", Priority::High, now)?;
//!
//! let next = queue.begin_send().unwrap();
//! assert_eq!(next.payload, "auth");
//! queue.complete(next.id);
//!
//! assert_eq!(queue.len(), 1);
//! # Ok::<(), tether_queue::QueueFullError>(())
//! ```

mod error;
mod message;
mod queue;

pub use error::QueueFullError;
pub use message::{MessageId, Priority, QueuedMessage};
pub use queue::{Enqueued, MessageQueue, OverflowPolicy};
