use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StorageError};

/// Default quota, in UTF-16 code units of keys plus values.
pub const DEFAULT_QUOTA: usize = 5 * 1024 * 1024;

/// A key/value store with browser storage semantics.
///
/// Keys are unique and enumerate in insertion order; overwriting a key
/// keeps its position. Reads are infallible, writes may be refused.
pub trait StorageBackend: Send + Sync {
    /// Number of stored entries.
    fn len(&self) -> usize;

    /// Key at `index` in enumeration order.
    fn key(&self, index: usize) -> Option<String>;

    /// Current value of `key`.
    fn get_item(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, returning the value it replaced.
    fn replace(&self, key: &str, value: &str) -> Result<Option<String>>;

    /// Remove `key`, returning the value it held.
    fn take(&self, key: &str) -> Result<Option<String>>;

    /// Remove every entry.
    fn clear(&self) -> Result<()>;

    /// All entries in enumeration order.
    fn entries(&self) -> Vec<StorageEntry> {
        (0..self.len())
            .filter_map(|i| self.key(i))
            .map(|key| {
                let value = self.get_item(&key);
                StorageEntry { key, value }
            })
            .collect()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One slot of storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEntry {
    pub key: String,
    pub value: Option<String>,
}

/// Insertion-ordered entry table shared by the bundled backends.
#[derive(Debug, Clone, Default)]
pub(crate) struct Entries {
    order: Vec<String>,
    values: HashMap<String, String>,
    used: usize,
}

fn units(s: &str) -> usize {
    s.encode_utf16().count()
}

impl Entries {
    pub(crate) fn from_entries(entries: impl IntoIterator<Item = StorageEntry>) -> Self {
        let mut table = Self::default();
        for entry in entries {
            if let Some(value) = entry.value {
                // Loading is never refused; a file may predate a smaller quota.
                let _ = table.insert(&entry.key, &value, None);
            }
        }
        table
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn key(&self, index: usize) -> Option<String> {
        self.order.get(index).cloned()
    }

    pub(crate) fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    pub(crate) fn insert(
        &mut self,
        key: &str,
        value: &str,
        quota: Option<usize>,
    ) -> Result<Option<String>> {
        let freed = self
            .values
            .get(key)
            .map(|old| units(key) + units(old))
            .unwrap_or(0);
        let used = self.used - freed + units(key) + units(value);
        if let Some(quota) = quota {
            if used > quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    quota,
                });
            }
        }

        self.used = used;
        let old = self.values.insert(key.to_string(), value.to_string());
        if old.is_none() {
            self.order.push(key.to_string());
        }
        Ok(old)
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<String> {
        let old = self.values.remove(key)?;
        self.used -= units(key) + units(&old);
        self.order.retain(|k| k != key);
        Some(old)
    }

    pub(crate) fn clear(&mut self) {
        self.order.clear();
        self.values.clear();
        self.used = 0;
    }

    pub(crate) fn to_entries(&self) -> Vec<StorageEntry> {
        self.order
            .iter()
            .map(|key| StorageEntry {
                key: key.clone(),
                value: self.values.get(key).cloned(),
            })
            .collect()
    }
}

/// Process-local storage, lost when the backend is dropped.
#[derive(Debug)]
pub struct MemoryBackend {
    entries: RwLock<Entries>,
    quota: Option<usize>,
}

impl MemoryBackend {
    /// Create an empty backend with the default quota.
    pub fn new() -> Self {
        Self::with_quota(Some(DEFAULT_QUOTA))
    }

    /// Create an empty backend; `None` disables the quota.
    pub fn with_quota(quota: Option<usize>) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            quota,
        }
    }

    /// Create an unlimited backend pre-filled with `pairs`, in order.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let backend = Self::with_quota(None);
        {
            let mut entries = backend.write();
            for (key, value) in pairs {
                let _ = entries.insert(&key.into(), &value.into(), None);
            }
        }
        backend
    }

    /// Units currently used by keys and values.
    pub fn used(&self) -> usize {
        self.read().used
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryBackend {
    fn len(&self) -> usize {
        self.read().len()
    }

    fn key(&self, index: usize) -> Option<String> {
        self.read().key(index)
    }

    fn get_item(&self, key: &str) -> Option<String> {
        self.read().get(key)
    }

    fn replace(&self, key: &str, value: &str) -> Result<Option<String>> {
        self.write().insert(key, value, self.quota)
    }

    fn take(&self, key: &str) -> Result<Option<String>> {
        Ok(self.write().remove(key))
    }

    fn clear(&self) -> Result<()> {
        self.write().clear();
        Ok(())
    }

    fn entries(&self) -> Vec<StorageEntry> {
        self.read().to_entries()
    }
}
