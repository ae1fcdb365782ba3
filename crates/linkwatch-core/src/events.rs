//! Typed publish/subscribe for linkwatch events.
//!
//! Every component reports what it does through an [`EventBus`]. Subscribers
//! are called in registration order, and [`EventBus::subscribe`] hands back a
//! [`Subscription`] that detaches the listener again.

use parking_lot::RwLock;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::Instant;

/// Trait for events emitted by linkwatch components.
pub trait LinkEvent: Send + Sync + fmt::Debug {
    /// Returns the type of event (e.g., "ReconnectionStart").
    fn event_type(&self) -> &'static str;

    /// Returns when this event occurred.
    fn timestamp(&self) -> Instant;

    /// Returns the name of the component instance that emitted this event.
    fn source(&self) -> &str;
}

/// Trait for listening to events.
pub trait EventListener<E: LinkEvent>: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &E);
}

type SharedListener<E> = Arc<dyn EventListener<E>>;

struct Registry<E: LinkEvent> {
    next_id: u64,
    listeners: Vec<(u64, SharedListener<E>)>,
}

impl<E: LinkEvent> Registry<E> {
    fn remove(&mut self, id: u64) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }
}

/// A registry of listeners for one event type.
///
/// Cloning the bus yields another handle to the same registry.
pub struct EventBus<E: LinkEvent> {
    registry: Arc<RwLock<Registry<E>>>,
}

impl<E: LinkEvent + 'static> EventBus<E> {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Registers a listener and returns the handle that removes it.
    pub fn subscribe<L>(&self, listener: L) -> Subscription
    where
        L: EventListener<E> + 'static,
    {
        let id = {
            let mut registry = self.registry.write();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.listeners.push((id, Arc::new(listener)));
            id
        };

        let registry: Weak<RwLock<Registry<E>>> = Arc::downgrade(&self.registry);
        Subscription {
            id,
            detach: Box::new(move |id| {
                let Some(registry) = registry.upgrade() else {
                    return false;
                };
                let removed = registry.write().remove(id);
                removed
            }),
        }
    }

    /// Registers a closure as a listener.
    pub fn on<F>(&self, f: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.subscribe(FnListener::new(f))
    }

    /// Delivers an event to every listener in registration order.
    ///
    /// A panicking listener is caught and logged; the remaining listeners
    /// still receive the event. Listeners may subscribe or unsubscribe from
    /// inside their callback: the set of listeners is fixed when `emit` starts.
    pub fn emit(&self, event: &E) {
        let listeners: Vec<SharedListener<E>> = self
            .registry
            .read()
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.on_event(event)));
            if outcome.is_err() {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    source = event.source(),
                    event = event.event_type(),
                    "event listener panicked"
                );
            }
        }
    }

    /// Removes every listener.
    pub fn clear(&self) {
        self.registry.write().listeners.clear();
    }

    /// Returns true if there are no listeners.
    pub fn is_empty(&self) -> bool {
        self.registry.read().listeners.is_empty()
    }

    /// Returns the number of listeners.
    pub fn len(&self) -> usize {
        self.registry.read().listeners.len()
    }
}

impl<E: LinkEvent + 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: LinkEvent> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<E: LinkEvent> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.registry.read().listeners.len())
            .finish()
    }
}

/// Handle returned by [`EventBus::subscribe`].
///
/// Dropping the handle leaves the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
pub struct Subscription {
    id: u64,
    detach: Box<dyn Fn(u64) -> bool + Send + Sync>,
}

impl Subscription {
    /// Identifier of the listener within its bus.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Removes the listener. Returns false if it was already gone (for
    /// example after [`EventBus::clear`]) or the bus no longer exists.
    pub fn unsubscribe(self) -> bool {
        (self.detach)(self.id)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// A simple function-based event listener.
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
    /// Creates a new function-based listener.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: LinkEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}
