//! Listener registry for cursor lifecycle events.
//!
//! Listeners run synchronously, in registration order, on the task that
//! caused the event. Dispatch iterates over a snapshot, so a listener may
//! register or unregister listeners without affecting the dispatch in
//! progress.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::fetch::FetchType;
use crate::window::FetchStatus;

/// Lifecycle event emitted by a [`Cursor`](crate::Cursor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorEvent {
    /// A cursor was opened.
    Opened {
        /// Server handle.
        handle: i32,
        /// Rows in the result.
        row_count: i32,
    },
    /// A fetch completed.
    Fetched {
        /// Server handle.
        handle: i32,
        /// Fetch type sent.
        fetch_type: FetchType,
        /// Rows returned.
        rows: usize,
        /// First row of the current window.
        current_row: i32,
        /// Reported status.
        status: FetchStatus,
    },
    /// The cursor was closed.
    Closed {
        /// Server handle that was released.
        handle: i32,
    },
    /// A fatal error made the session unusable.
    Poisoned {
        /// Error description.
        reason: String,
    },
}

/// Identifies a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Registry<E> {
    next_id: u64,
    listeners: Vec<(ListenerId, Listener<E>)>,
}

/// Shared registry of event listeners.
///
/// Clones share the same registry.
pub struct EventListeners<E> {
    inner: Arc<Mutex<Registry<E>>>,
}

impl<E> EventListeners<E> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Registry {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Add a listener; it runs after all listeners registered before it.
    pub fn register<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut registry = self.inner.lock();
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        registry.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut registry = self.inner.lock();
        let before = registry.listeners.len();
        registry.listeners.retain(|(existing, _)| *existing != id);
        registry.listeners.len() != before
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    /// Check if no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call every listener registered at the time of the call.
    pub fn dispatch(&self, event: &E) {
        let snapshot: Vec<Listener<E>> = self
            .inner
            .lock()
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            listener(event);
        }
    }
}

impl<E> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for EventListeners<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> std::fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventListeners")
            .field("listeners", &self.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_order() {
        let listeners = EventListeners::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let seen = Arc::clone(&seen);
            listeners.register(move |event: &u32| seen.lock().push((tag, *event)));
        }
        listeners.dispatch(&7);

        assert_eq!(*seen.lock(), vec![("a", 7), ("b", 7), ("c", 7)]);
    }

    #[test]
    fn test_unregister() {
        let listeners = EventListeners::<()>::new();
        let id = listeners.register(|_| {});
        assert_eq!(listeners.len(), 1);
        assert!(listeners.unregister(id));
        assert!(!listeners.unregister(id));
        assert!(listeners.is_empty());
    }

    #[test]
    fn test_mutation_during_dispatch_uses_snapshot() {
        let listeners = EventListeners::<()>::new();
        let calls = Arc::new(Mutex::new(0u32));

        let registry = listeners.clone();
        let counter = Arc::clone(&calls);
        listeners.register(move |_| {
            let counter = Arc::clone(&counter);
            registry.register(move |_| *counter.lock() += 1);
        });

        listeners.dispatch(&());
        assert_eq!(*calls.lock(), 0);
        assert_eq!(listeners.len(), 2);

        listeners.dispatch(&());
        assert_eq!(*calls.lock(), 1);
        assert_eq!(listeners.len(), 3);
    }
}
