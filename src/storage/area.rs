use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::Result;
use crate::event::ChangeNotification;
use crate::storage::backend::{StorageBackend, StorageEntry};

static NEXT_AREA_ID: AtomicUsize = AtomicUsize::new(0);

/// Which storage a page exposes an area as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AreaKind {
    /// Persistent storage shared by every page of an origin.
    Local,
    /// Storage private to one page.
    Session,
}

/// Observes successful mutations on the areas it is attached to.
///
/// A page attaches the same hooks to all of its areas; implementations
/// decide per area whether a mutation concerns them.
pub(crate) trait AreaHooks: Send + Sync {
    fn changed(&self, area: &StorageArea, change: ChangeNotification);
    fn cleared(&self, area: &StorageArea);
}

struct AreaInner {
    id: usize,
    kind: AreaKind,
    backend: Arc<dyn StorageBackend>,
    hooks: Option<Arc<dyn AreaHooks>>,
}

/// A handle to one storage instance.
///
/// Clones refer to the same instance; [`StorageArea::id`] identifies it.
#[derive(Clone)]
pub struct StorageArea {
    inner: Arc<AreaInner>,
}

impl StorageArea {
    /// An area with no page attached: writes are never observed.
    pub fn detached(kind: AreaKind, backend: Arc<dyn StorageBackend>) -> Self {
        Self::build(kind, backend, None)
    }

    pub(crate) fn with_hooks(
        kind: AreaKind,
        backend: Arc<dyn StorageBackend>,
        hooks: Arc<dyn AreaHooks>,
    ) -> Self {
        Self::build(kind, backend, Some(hooks))
    }

    fn build(
        kind: AreaKind,
        backend: Arc<dyn StorageBackend>,
        hooks: Option<Arc<dyn AreaHooks>>,
    ) -> Self {
        Self {
            inner: Arc::new(AreaInner {
                id: NEXT_AREA_ID.fetch_add(1, Ordering::SeqCst),
                kind,
                backend,
                hooks,
            }),
        }
    }

    /// Identity of the underlying instance.
    pub fn id(&self) -> usize {
        self.inner.id
    }

    pub fn kind(&self) -> AreaKind {
        self.inner.kind
    }

    pub fn len(&self) -> usize {
        self.inner.backend.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Key at `index` in enumeration order.
    pub fn key(&self, index: usize) -> Option<String> {
        self.inner.backend.key(index)
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        self.inner.backend.get_item(key)
    }

    pub fn entries(&self) -> Vec<StorageEntry> {
        self.inner.backend.entries()
    }

    /// Store `value` under `key`.
    ///
    /// Observers run after the write and before this returns.
    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let old_value = self.inner.backend.replace(key, value)?;
        self.changed(ChangeNotification {
            key: key.to_string(),
            old_value,
            new_value: Some(value.to_string()),
        });
        Ok(())
    }

    /// Remove `key`. Removing an absent key still notifies observers.
    pub fn remove_item(&self, key: &str) -> Result<()> {
        let old_value = self.inner.backend.take(key)?;
        self.changed(ChangeNotification {
            key: key.to_string(),
            old_value,
            new_value: None,
        });
        Ok(())
    }

    /// Remove every entry.
    pub fn clear(&self) -> Result<()> {
        self.inner.backend.clear()?;
        if let Some(hooks) = &self.inner.hooks {
            hooks.cleared(self);
        }
        Ok(())
    }

    fn changed(&self, change: ChangeNotification) {
        if let Some(hooks) = &self.inner.hooks {
            hooks.changed(self, change);
        }
    }
}

impl PartialEq for StorageArea {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for StorageArea {}

impl fmt::Debug for StorageArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageArea")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        changes: Mutex<Vec<(usize, ChangeNotification)>>,
        clears: Mutex<Vec<usize>>,
    }

    impl AreaHooks for Recorder {
        fn changed(&self, area: &StorageArea, change: ChangeNotification) {
            self.changes.lock().unwrap().push((area.id(), change));
        }

        fn cleared(&self, area: &StorageArea) {
            self.clears.lock().unwrap().push(area.id());
        }
    }

    #[test]
    fn hooks_see_old_and_new_values() {
        let recorder = Arc::new(Recorder::default());
        let area = StorageArea::with_hooks(
            AreaKind::Local,
            Arc::new(MemoryBackend::new()),
            recorder.clone(),
        );

        area.set_item("k", "1").unwrap();
        area.set_item("k", "2").unwrap();
        area.remove_item("k").unwrap();
        area.clear().unwrap();

        let changes: Vec<_> = recorder
            .changes
            .lock()
            .unwrap()
            .iter()
            .map(|(_, c)| (c.old_value.clone(), c.new_value.clone()))
            .collect();
        assert_eq!(
            changes,
            vec![
                (None, Some("1".to_string())),
                (Some("1".to_string()), Some("2".to_string())),
                (Some("2".to_string()), None),
            ]
        );
        assert_eq!(*recorder.clears.lock().unwrap(), vec![area.id()]);
    }

    #[test]
    fn failed_write_is_not_observed() {
        let recorder = Arc::new(Recorder::default());
        let area = StorageArea::with_hooks(
            AreaKind::Local,
            Arc::new(MemoryBackend::with_quota(Some(2))),
            recorder.clone(),
        );

        assert!(area.set_item("key", "value").is_err());
        assert!(recorder.changes.lock().unwrap().is_empty());
    }

    #[test]
    fn clones_share_identity() {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let area = StorageArea::detached(AreaKind::Session, backend.clone());
        let other = StorageArea::detached(AreaKind::Session, backend);

        assert_eq!(area, area.clone());
        assert_ne!(area, other);
        assert_ne!(area.id(), other.id());
    }
}
