use std::cell::RefCell;
use std::sync::{Arc, OnceLock};

use crate::event::{ChangeNotification, ListenerGuard, Listeners, StorageEvent};
use crate::intercept::Interceptor;
use crate::runtime::origin::{Origin, OriginShared};
use crate::storage::{AreaHooks, AreaKind, MemoryBackend, StorageArea};

/// Routes successful mutations of a page's areas.
struct PageHooks {
    page_id: OnceLock<usize>,
    local_area: OnceLock<usize>,
    url: String,
    interceptor: Arc<Interceptor>,
    origin: Arc<OriginShared>,
}

impl PageHooks {
    fn is_local(&self, area: &StorageArea) -> bool {
        self.local_area.get() == Some(&area.id())
    }

    fn source(&self) -> usize {
        self.page_id.get().copied().unwrap_or(usize::MAX)
    }
}

impl AreaHooks for PageHooks {
    fn changed(&self, area: &StorageArea, change: ChangeNotification) {
        // Only the page's persistent storage is intercepted or shared.
        if !self.is_local(area) {
            return;
        }

        let event = (change.old_value != change.new_value).then(|| StorageEvent {
            key: Some(change.key.clone()),
            old_value: change.old_value.clone(),
            new_value: change.new_value.clone(),
            url: self.url.clone(),
        });

        self.interceptor.notify(change);
        if let Some(event) = event {
            self.origin.broadcast(self.source(), &event);
        }
    }

    fn cleared(&self, area: &StorageArea) {
        if self.is_local(area) {
            self.origin
                .broadcast(self.source(), &StorageEvent::cleared(&self.url));
        }
    }
}

/// One page (tab) of an [`Origin`].
///
/// A page exposes the origin's persistent storage as its local storage,
/// owns a private session storage, and receives [`StorageEvent`]s for
/// changes other pages make.
///
/// Like a browser window, there is an ambient page: [`Page::current`]
/// returns the page installed by [`Page::with_page`] or [`Page::scope`]
/// on this thread, or a process-global page otherwise.
///
/// # Examples
///
/// ```
/// use pantry::runtime::Page;
///
/// Page::scope(|| {
///     let page = Page::current();
///     page.local_storage().set_item("theme", "dark").unwrap();
///     assert_eq!(page.local_storage().len(), 1);
/// });
/// // The scoped page and its storage are dropped here
/// ```
pub struct Page {
    id: usize,
    url: String,
    origin: Arc<OriginShared>,
    local: StorageArea,
    session: StorageArea,
    interceptor: Arc<Interceptor>,
    storage_events: Listeners<StorageEvent>,
}

// Thread-local stack for scoped pages
thread_local! {
    static PAGE_STACK: RefCell<Vec<Arc<Page>>> = const { RefCell::new(Vec::new()) };
}

impl Page {
    pub(crate) fn open(origin: Arc<OriginShared>, url: String) -> Self {
        let interceptor = Interceptor::new();
        let hooks = Arc::new(PageHooks {
            page_id: OnceLock::new(),
            local_area: OnceLock::new(),
            url: url.clone(),
            interceptor: Arc::clone(&interceptor),
            origin: Arc::clone(&origin),
        });

        let local = StorageArea::with_hooks(
            AreaKind::Local,
            Arc::clone(&origin.backend),
            hooks.clone(),
        );
        let session = StorageArea::with_hooks(
            AreaKind::Session,
            Arc::new(MemoryBackend::new()),
            hooks.clone(),
        );
        let _ = hooks.local_area.set(local.id());

        let storage_events = Listeners::new();
        let id = origin.attach(storage_events.clone());
        let _ = hooks.page_id.set(id);

        tracing::debug!(origin = %origin.name(), page = id, %url, "page opened");

        Self {
            id,
            url,
            origin,
            local,
            session,
            interceptor,
            storage_events,
        }
    }

    /// Run a function with a fresh page on a fresh in-memory origin.
    ///
    /// Useful for tests: nothing written inside leaks into other scopes.
    pub fn scope<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let page = Origin::in_memory("scoped").open_page("about:blank");
        Self::with_page(page, f)
    }

    /// The process-global page, used when no page is installed.
    pub fn global() -> Arc<Self> {
        static PAGE: OnceLock<Arc<Page>> = OnceLock::new();
        Arc::clone(PAGE.get_or_init(|| Origin::in_memory("global").open_page("about:blank")))
    }

    /// The page at the top of this thread's stack, or the global page.
    pub fn current() -> Arc<Self> {
        PAGE_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .cloned()
                .unwrap_or_else(Self::global)
        })
    }

    /// Run a function with `page` as the current page.
    ///
    /// The page is removed from the stack again even if `f` panics.
    pub fn with_page<F, R>(page: Arc<Self>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        PAGE_STACK.with(|stack| {
            stack.borrow_mut().push(page);
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        PAGE_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn origin_name(&self) -> &str {
        self.origin.name()
    }

    /// Persistent storage shared with every page of the origin.
    pub fn local_storage(&self) -> &StorageArea {
        &self.local
    }

    /// Storage private to this page. Never intercepted.
    pub fn session_storage(&self) -> &StorageArea {
        &self.session
    }

    /// Interception layer over this page's local storage.
    pub fn interceptor(&self) -> &Arc<Interceptor> {
        &self.interceptor
    }

    /// Listen for changes other pages make to shared storage.
    pub fn on_storage<F>(&self, listener: F) -> ListenerGuard<StorageEvent>
    where
        F: Fn(&StorageEvent) + Send + Sync + 'static,
    {
        self.storage_events.subscribe(listener)
    }

    /// Deliver a storage event to this page's listeners.
    ///
    /// Hosts embedding a real browser forward its native events here.
    pub fn dispatch_storage_event(&self, event: &StorageEvent) -> usize {
        self.storage_events.emit(event)
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        self.origin.detach(self.id);
        tracing::debug!(origin = %self.origin_name(), page = self.id, "page closed");
    }
}
