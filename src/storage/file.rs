use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use crate::error::{Result, StorageError};
use crate::storage::backend::{Entries, StorageBackend, StorageEntry};

/// Storage persisted to a JSON file, surviving process restarts.
///
/// The file holds an ordered array of `{"key": .., "value": ..}` objects.
/// Every mutation rewrites it through a temporary file and a rename, so a
/// crash never leaves a half-written store behind. A mutation whose write
/// fails leaves the in-memory state untouched.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    entries: RwLock<Entries>,
    quota: Option<usize>,
}

impl FileBackend {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>, quota: Option<usize>) -> Result<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(json) => {
                let list: Vec<StorageEntry> =
                    serde_json::from_str(&json).map_err(|source| StorageError::Corrupt {
                        path: path.clone(),
                        source,
                    })?;
                Entries::from_entries(list)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Entries::default(),
            Err(source) => return Err(StorageError::Io { path, source }),
        };

        tracing::debug!(path = %path.display(), entries = entries.len(), "opened storage file");

        Ok(Self {
            path,
            entries: RwLock::new(entries),
            quota,
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file written before the rename. The suffix is appended, so
    /// stores that only differ by extension never share it.
    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Apply `f` to a copy of the entries, persist it, then commit.
    fn mutate<R>(&self, f: impl FnOnce(&mut Entries) -> Result<R>) -> Result<R> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = entries.clone();
        let out = f(&mut next)?;
        self.persist(&next)?;
        *entries = next;
        Ok(out)
    }

    fn persist(&self, entries: &Entries) -> Result<()> {
        let json = serde_json::to_string_pretty(&entries.to_entries())?;
        let io_err = |source| StorageError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp_path = self.temp_path();
        fs::write(&tmp_path, json).map_err(io_err)?;
        fs::rename(&tmp_path, &self.path).map_err(io_err)?;
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StorageBackend for FileBackend {
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
        let quota = self.quota;
        self.mutate(|entries| entries.insert(key, value, quota))
    }

    fn take(&self, key: &str) -> Result<Option<String>> {
        if self.read().get(key).is_none() {
            return Ok(None);
        }
        self.mutate(|entries| Ok(entries.remove(key)))
    }

    fn clear(&self) -> Result<()> {
        self.mutate(|entries| {
            entries.clear();
            Ok(())
        })
    }

    fn entries(&self) -> Vec<StorageEntry> {
        self.read().to_entries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_opens_empty() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::open(dir.path().join("local.json"), None).unwrap();
        assert!(backend.is_empty());
        assert!(!backend.path().exists());
    }

    #[test]
    fn writes_survive_reopen_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("local.json");

        {
            let backend = FileBackend::open(&path, None).unwrap();
            backend.replace("z", "26").unwrap();
            backend.replace("a", "1").unwrap();
            backend.replace("m", "13").unwrap();
            backend.take("a").unwrap();
        }

        let reopened = FileBackend::open(&path, None).unwrap();
        assert_eq!(reopened.key(0).as_deref(), Some("z"));
        assert_eq!(reopened.key(1).as_deref(), Some("m"));
        assert_eq!(reopened.get_item("a"), None);
        assert!(!dir.path().join("nested").join("local.json.tmp").exists());
    }

    #[test]
    fn same_stem_stores_keep_separate_temp_files() {
        let dir = TempDir::new().unwrap();
        let json = FileBackend::open(dir.path().join("store.json"), None).unwrap();
        let db = FileBackend::open(dir.path().join("store.db"), None).unwrap();

        assert_eq!(json.temp_path(), dir.path().join("store.json.tmp"));
        assert_eq!(db.temp_path(), dir.path().join("store.db.tmp"));

        json.replace("k", "json").unwrap();
        db.replace("k", "db").unwrap();
        let json = FileBackend::open(dir.path().join("store.json"), None).unwrap();
        let db = FileBackend::open(dir.path().join("store.db"), None).unwrap();
        assert_eq!(json.get_item("k").as_deref(), Some("json"));
        assert_eq!(db.get_item("k").as_deref(), Some("db"));
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("local.json");
        fs::write(&path, "{not json").unwrap();

        let err = FileBackend::open(&path, None).unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }

    #[test]
    fn refused_write_is_not_persisted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("local.json");
        let backend = FileBackend::open(&path, Some(4)).unwrap();
        backend.replace("ab", "cd").unwrap();

        assert!(backend.replace("ef", "gh").is_err());

        let reopened = FileBackend::open(&path, Some(4)).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.get_item("ab").as_deref(), Some("cd"));
    }

    #[test]
    fn failed_persist_leaves_memory_unchanged() {
        let dir = TempDir::new().unwrap();
        // The target path is a directory, so the final rename fails.
        let path = dir.path().join("occupied");
        fs::create_dir(&path).unwrap();
        let backend = FileBackend::open(&path, None);
        assert!(backend.is_err());

        let path = dir.path().join("local.json");
        let backend = FileBackend::open(&path, None).unwrap();
        backend.replace("k", "v").unwrap();
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        let err = backend.replace("k", "w").unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
        assert_eq!(backend.get_item("k").as_deref(), Some("v"));
    }
}
