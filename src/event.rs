//! Typed publish/subscribe primitive used by every subject (feed, broker) to advertise
//! its events to ordered subscribers, without an implicit global bus.

/// A single subject's event channel.
///
/// Subscribers are boxed closures invoked in registration order on [`EventBus::emit`]. The
/// bus guarantees ordering *within* one subject's events; cross-subject ordering is the
/// dispatcher's job (see [`crate::dispatcher`]).
pub struct EventBus<E> {
    subscribers: Vec<Box<dyn FnMut(&E)>>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber. Subscribers are notified in the order they subscribed.
    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: FnMut(&E) + 'static,
    {
        self.subscribers.push(Box::new(callback));
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Notifies every subscriber, in registration order, of `event`.
    pub fn emit(&mut self, event: &E) {
        for subscriber in &mut self.subscribers {
            subscriber(event);
        }
    }
}
