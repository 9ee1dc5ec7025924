use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::Result;
use crate::event::{Listeners, StorageEvent};
use crate::runtime::Page;
use crate::storage::{MemoryBackend, StorageBackend, StorageConfig};

/// Shared state behind an [`Origin`], kept alive by its pages.
pub(crate) struct OriginShared {
    name: String,
    pub(crate) backend: Arc<dyn StorageBackend>,
    next_page: AtomicUsize,
    pages: RwLock<Vec<(usize, Listeners<StorageEvent>)>>,
}

impl OriginShared {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn attach(&self, events: Listeners<StorageEvent>) -> usize {
        let id = self.next_page.fetch_add(1, Ordering::SeqCst);
        self.pages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, events));
        id
    }

    pub(crate) fn detach(&self, page_id: usize) {
        self.pages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(id, _)| *id != page_id);
    }

    /// Deliver `event` to every page except `source`.
    pub(crate) fn broadcast(&self, source: usize, event: &StorageEvent) {
        let targets: Vec<(usize, Listeners<StorageEvent>)> = self
            .pages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(id, _)| *id != source)
            .map(|(id, events)| (*id, events.clone()))
            .collect();

        for (page, events) in targets {
            tracing::trace!(origin = %self.name, from = source, to = page, key = ?event.key, "storage event");
            events.emit(event);
        }
    }

    fn page_count(&self) -> usize {
        self.pages.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// A set of pages sharing one persistent storage.
///
/// A successful change made through one page's local storage reaches the
/// other pages as a [`StorageEvent`]; the page that made it is skipped.
///
/// ```
/// use pantry::runtime::Origin;
/// use std::sync::{Arc, Mutex};
///
/// let origin = Origin::in_memory("app://demo");
/// let writer = origin.open_page("app://demo/editor");
/// let reader = origin.open_page("app://demo/preview");
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let _guard = {
///     let seen = seen.clone();
///     reader.on_storage(move |event| seen.lock().unwrap().push(event.key.clone()))
/// };
///
/// writer.local_storage().set_item("draft", "hello").unwrap();
/// assert_eq!(*seen.lock().unwrap(), vec![Some("draft".to_string())]);
/// assert_eq!(reader.local_storage().get_item("draft").as_deref(), Some("hello"));
/// ```
#[derive(Clone)]
pub struct Origin {
    shared: Arc<OriginShared>,
}

impl Origin {
    pub fn new(name: impl Into<String>, backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            shared: Arc::new(OriginShared {
                name: name.into(),
                backend,
                next_page: AtomicUsize::new(0),
                pages: RwLock::new(Vec::new()),
            }),
        }
    }

    /// An origin backed by fresh in-memory storage.
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self::new(name, Arc::new(MemoryBackend::new()))
    }

    /// An origin whose storage is built from `config`.
    pub fn from_config(name: impl Into<String>, config: &StorageConfig) -> Result<Self> {
        Ok(Self::new(name, config.open_backend()?))
    }

    pub fn name(&self) -> &str {
        self.shared.name()
    }

    /// Open a new page (tab) on this origin.
    pub fn open_page(&self, url: impl Into<String>) -> Arc<Page> {
        Arc::new(Page::open(Arc::clone(&self.shared), url.into()))
    }

    /// Number of pages currently open.
    pub fn page_count(&self) -> usize {
        self.shared.page_count()
    }
}
