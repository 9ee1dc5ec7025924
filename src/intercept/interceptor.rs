use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use crate::event::{ChangeNotification, ListenerGuard, Listeners};

/// Page-wide interception of writes to persistent storage.
///
/// Interception is active while at least one [`InterceptGuard`] is alive.
/// Installs are counted, so releasing one guard never switches off
/// interception that another holder still relies on.
pub struct Interceptor {
    mounts: AtomicUsize,
    notifications: Listeners<ChangeNotification>,
}

impl Interceptor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            mounts: AtomicUsize::new(0),
            notifications: Listeners::new(),
        })
    }

    /// Install interception, or add one more holder if already installed.
    pub fn install(self: &Arc<Self>) -> InterceptGuard {
        if self.mounts.fetch_add(1, Ordering::SeqCst) == 0 {
            tracing::debug!("storage interception installed");
        }

        InterceptGuard {
            interceptor: Arc::downgrade(self),
        }
    }

    /// Whether writes are currently intercepted.
    pub fn is_active(&self) -> bool {
        self.mount_count() > 0
    }

    /// Number of live [`InterceptGuard`]s.
    pub fn mount_count(&self) -> usize {
        self.mounts.load(Ordering::SeqCst)
    }

    /// Listen for same-page change notifications.
    pub fn subscribe<F>(&self, listener: F) -> ListenerGuard<ChangeNotification>
    where
        F: Fn(&ChangeNotification) + Send + Sync + 'static,
    {
        self.notifications.subscribe(listener)
    }

    /// Raise `notification` if interception is active.
    ///
    /// Returns whether it was raised.
    pub(crate) fn notify(&self, notification: ChangeNotification) -> bool {
        if !self.is_active() {
            return false;
        }
        tracing::trace!(key = %notification.key, "same-page storage notification");
        self.notifications.emit(&notification);
        true
    }

    fn release(&self) {
        // Every guard adds one mount before it can release one.
        if self.mounts.fetch_sub(1, Ordering::SeqCst) == 1 {
            tracing::debug!("storage interception restored");
        }
    }
}

/// RAII guard holding interception installed.
#[must_use = "dropping the guard releases interception"]
pub struct InterceptGuard {
    interceptor: Weak<Interceptor>,
}

impl Drop for InterceptGuard {
    fn drop(&mut self) {
        if let Some(interceptor) = self.interceptor.upgrade() {
            interceptor.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(key: &str) -> ChangeNotification {
        ChangeNotification {
            key: key.to_string(),
            old_value: None,
            new_value: Some("v".to_string()),
        }
    }

    #[test]
    fn inactive_until_installed() {
        let interceptor = Interceptor::new();
        let count = Arc::new(AtomicUsize::new(0));
        let _sub = {
            let count = count.clone();
            interceptor.subscribe(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };

        assert!(!interceptor.notify(change("a")));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        let guard = interceptor.install();
        assert!(interceptor.notify(change("a")));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        drop(guard);
        assert!(!interceptor.notify(change("a")));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn installs_are_counted() {
        let interceptor = Interceptor::new();
        let first = interceptor.install();
        let second = interceptor.install();
        assert_eq!(interceptor.mount_count(), 2);

        drop(first);
        assert!(interceptor.is_active());

        drop(second);
        assert!(!interceptor.is_active());
    }

    #[test]
    fn counter_balances_across_threads() {
        let interceptor = Interceptor::new();
        let outer = interceptor.install();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let interceptor = Arc::clone(&interceptor);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let _guard = interceptor.install();
                        assert!(interceptor.is_active());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(interceptor.mount_count(), 1);
        drop(outer);
        assert_eq!(interceptor.mount_count(), 0);
    }

    #[test]
    fn released_on_unwind() {
        let interceptor = Interceptor::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = interceptor.install();
            panic!("teardown");
        }));

        assert!(result.is_err());
        assert_eq!(interceptor.mount_count(), 0);
    }
}
