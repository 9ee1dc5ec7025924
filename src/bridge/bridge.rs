use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::bridge::action::{Action, BulkSnapshot, Dispatcher};
use crate::event::{ChangeNotification, ListenerGuard, StorageChange, StorageEvent};
use crate::intercept::InterceptGuard;
use crate::runtime::Page;
use crate::storage::StorageArea;

/// Holds updates back until the bulk snapshot has been dispatched.
struct Gate {
    dispatcher: Arc<dyn Dispatcher>,
    open: AtomicBool,
    pending: Mutex<Vec<Action>>,
}

impl Gate {
    fn new(dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            dispatcher,
            open: AtomicBool::new(false),
            pending: Mutex::new(Vec::new()),
        }
    }

    fn forward(&self, action: Action) {
        if !self.open.load(Ordering::Acquire) {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if !self.open.load(Ordering::Acquire) {
                pending.push(action);
                return;
            }
        }
        self.dispatcher.dispatch(action);
    }

    /// Dispatch everything held back, then let updates straight through.
    ///
    /// No lock is held while dispatching, so a dispatcher that writes to
    /// storage just queues behind the current batch.
    fn open(&self) {
        loop {
            let batch = {
                let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
                if pending.is_empty() {
                    self.open.store(true, Ordering::Release);
                    return;
                }
                std::mem::take(&mut *pending)
            };
            for action in batch {
                self.dispatcher.dispatch(action);
            }
        }
    }

    fn forward_change<E: StorageChange>(&self, change: &E) {
        let Some(key) = change.changed_key() else {
            tracing::trace!("ignoring storage change without a key");
            return;
        };
        self.forward(Action::update(key, change.new_value()));
    }
}

/// Read every entry of `area`, in enumeration order.
///
/// A key whose value vanished mid-read maps to the empty string.
pub fn export_snapshot(area: &StorageArea) -> BulkSnapshot {
    (0..area.len())
        .filter_map(|index| area.key(index))
        .map(|key| {
            let value = area.get_item(&key).unwrap_or_default();
            (key, value)
        })
        .collect()
}

/// Mirrors a page's local storage into a [`Dispatcher`].
///
/// While mounted, the bridge:
/// - sends one [`Action::LocalStorageBulk`] with every stored entry,
///   before anything else
/// - sends an [`Action::LocalStorageUpdate`] for every set or remove made
///   on the page's local storage, whether by this page or another page of
///   the origin
///
/// Changes without a key (a clear of the whole storage) are ignored.
///
/// # Examples
///
/// ```
/// use pantry::{Action, LocalStorageEventBridge, Page};
/// use std::sync::{Arc, Mutex};
///
/// Page::scope(|| {
///     let page = Page::current();
///     page.local_storage().set_item("a", "1").unwrap();
///
///     let actions = Arc::new(Mutex::new(Vec::new()));
///     let bridge = {
///         let actions = actions.clone();
///         LocalStorageEventBridge::mount(move |action: Action| actions.lock().unwrap().push(action))
///     };
///
///     page.local_storage().set_item("b", "2").unwrap();
///     drop(bridge);
///     page.local_storage().set_item("c", "3").unwrap();
///
///     let actions = actions.lock().unwrap();
///     assert_eq!(actions.len(), 2);
///     assert_eq!(actions[1], Action::update("b", Some("2")));
/// });
/// ```
pub struct LocalStorageEventBridge;

impl LocalStorageEventBridge {
    /// Mount on the current page.
    pub fn mount<D>(dispatcher: D) -> BridgeGuard
    where
        D: Dispatcher + 'static,
    {
        Self::mount_on(&Page::current(), dispatcher)
    }

    /// Mount on `page`. The bridge stays active until the guard drops.
    pub fn mount_on<D>(page: &Arc<Page>, dispatcher: D) -> BridgeGuard
    where
        D: Dispatcher + 'static,
    {
        let gate = Arc::new(Gate::new(Arc::new(dispatcher)));

        let intercept = page.interceptor().install();

        let native = {
            let gate = Arc::clone(&gate);
            page.on_storage(move |event: &StorageEvent| gate.forward_change(event))
        };
        let local = {
            let gate = Arc::clone(&gate);
            page.interceptor()
                .subscribe(move |change: &ChangeNotification| gate.forward_change(change))
        };

        let snapshot = export_snapshot(page.local_storage());
        tracing::debug!(page = page.id(), entries = snapshot.len(), "storage bridge mounted");
        gate.dispatcher.dispatch(Action::bulk(snapshot));
        gate.open();

        BridgeGuard {
            _native: native,
            _local: local,
            _intercept: intercept,
            page: Arc::clone(page),
        }
    }
}

/// Keeps a [`LocalStorageEventBridge`] mounted.
///
/// Dropping it, including during unwinding, detaches the listeners and
/// releases this bridge's hold on interception.
#[must_use = "dropping the guard unmounts the bridge"]
pub struct BridgeGuard {
    _native: ListenerGuard<StorageEvent>,
    _local: ListenerGuard<ChangeNotification>,
    _intercept: InterceptGuard,
    page: Arc<Page>,
}

impl BridgeGuard {
    /// The page this bridge is mounted on.
    pub fn page(&self) -> &Arc<Page> {
        &self.page
    }

    /// Unmount now.
    pub fn unmount(self) {}
}

impl Drop for BridgeGuard {
    fn drop(&mut self) {
        tracing::debug!(page = self.page.id(), "storage bridge unmounted");
    }
}
