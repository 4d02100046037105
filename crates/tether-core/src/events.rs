//! Event system for connection lifecycle observability.
//!
//! Components emit events through an [`EventListeners`] collection. Listeners are
//! registered up front (usually through a config builder) and are invoked
//! synchronously, in registration order, from the task that owns the component.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Trait for events emitted by a connection or one of its components.
pub trait LifecycleEvent: Send + Sync + fmt::Debug {
    /// Returns the type of event (e.g., "state_changed", "max_retries").
    fn event_type(&self) -> &'static str;

    /// Returns when this event occurred.
    fn timestamp(&self) -> Instant;

    /// Returns the name of the connection that emitted this event.
    fn connection_name(&self) -> &str;
}

/// Trait for listening to lifecycle events.
pub trait EventListener<E: LifecycleEvent>: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &E);
}

/// Type alias for shared event listeners.
pub type SharedEventListener<E> = Arc<dyn EventListener<E>>;

/// An ordered collection of event listeners.
pub struct EventListeners<E: LifecycleEvent> {
    listeners: Vec<SharedEventListener<E>>,
}

impl<E: LifecycleEvent> Clone for EventListeners<E> {
    fn clone(&self) -> Self {
        Self {
            listeners: self.listeners.clone(),
        }
    }
}

impl<E: LifecycleEvent> EventListeners<E> {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Registers a listener.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Registers a closure as a listener.
    pub fn add_fn<F>(&mut self, f: F)
    where
        E: 'static,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.add(FnListener::new(f));
    }

    /// Delivers an event to every listener.
    ///
    /// A panicking listener is isolated: the panic is caught and the remaining
    /// listeners still receive the event. Returns the number of listeners that
    /// panicked.
    pub fn emit(&self, event: &E) -> usize {
        let mut panicked = 0;
        for listener in &self.listeners {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));
            if outcome.is_err() {
                panicked += 1;
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    connection = event.connection_name(),
                    event = event.event_type(),
                    "event listener panicked"
                );
            }
        }
        panicked
    }

    /// Returns true if there are no listeners.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Returns the number of listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: LifecycleEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: LifecycleEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// A listener backed by a closure.
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _phantom: std::marker::PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    /// Wraps a closure.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: LifecycleEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}
