//! Core infrastructure for tether.
//!
//! This crate holds the pieces shared by every tether component:
//! - Lifecycle event system for observability ([`LifecycleEvent`], [`EventListeners`])
//! - The error taxonomy for connection failures ([`ErrorKind`], [`LinkError`])

pub mod error;
pub mod events;

pub use error::{ErrorKind, LinkError};
pub use events::{EventListener, EventListeners, FnListener, LifecycleEvent};
