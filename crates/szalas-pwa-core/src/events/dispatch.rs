use std::fmt;

type Listener<E> = Box<dyn Fn(&E) + Send + Sync>;

/// Ordered set of synchronous listeners for one event type.
///
/// Listeners run to completion; anything asynchronous must be attached to the
/// event (`wait_until` / `respond_with`) before the listener returns.
pub struct EventTarget<E> {
    listeners: Vec<Listener<E>>,
}

impl<E> EventTarget<E> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn add_listener<F>(&mut self, listener: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Invoke every listener in registration order. Returns how many ran.
    pub fn dispatch(&self, event: &E) -> usize {
        for listener in &self.listeners {
            listener(event);
        }
        self.listeners.len()
    }
}

impl<E> Default for EventTarget<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventTarget<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTarget")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
