use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct ListenersInner<E> {
    next_id: AtomicUsize,
    listeners: RwLock<Vec<(usize, Listener<E>)>>,
}

/// A typed list of callbacks for one kind of event.
///
/// Cloning yields another handle to the same list. Listeners run in
/// registration order, synchronously, on the emitting thread.
pub struct Listeners<E> {
    inner: Arc<ListenersInner<E>>,
}

impl<E: 'static> Listeners<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ListenersInner {
                next_id: AtomicUsize::new(0),
                listeners: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Register `listener`; it stays registered until the guard drops.
    pub fn subscribe<F>(&self, listener: F) -> ListenerGuard<E>
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));

        ListenerGuard {
            id,
            listeners: Arc::downgrade(&self.inner),
        }
    }

    /// Call every listener with `event`, returning how many ran.
    ///
    /// The list is copied before calling out, so listeners may subscribe,
    /// unsubscribe or emit again without deadlocking.
    pub fn emit(&self, event: &E) -> usize {
        let listeners: Vec<Listener<E>> = self
            .inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: 'static> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for Listeners<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// RAII guard for a registered listener.
#[must_use = "dropping the guard unsubscribes the listener"]
pub struct ListenerGuard<E> {
    id: usize,
    listeners: Weak<ListenersInner<E>>,
}

impl<E> Drop for ListenerGuard<E> {
    fn drop(&mut self) {
        if let Some(inner) = self.listeners.upgrade() {
            inner
                .listeners
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| *id != self.id);
        }
    }
}
