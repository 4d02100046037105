//! Error types for the outbound queue.

use crate::Priority;
use tether_core::LinkError;

/// The queue could not admit a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("message queue full: capacity {capacity} reached, {priority} message rejected")]
pub struct QueueFullError {
    /// Configured queue capacity.
    pub capacity: usize,
    /// Priority of the rejected message.
    pub priority: Priority,
}

// Conversion to LinkError for zero-boilerplate error handling
impl From<QueueFullError> for LinkError {
    fn from(err: QueueFullError) -> Self {
        LinkError::QueueFull {
            capacity: err.capacity,
        }
    }
}
