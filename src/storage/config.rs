use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StorageError};
use crate::storage::backend::{MemoryBackend, StorageBackend, DEFAULT_QUOTA};
use crate::storage::file::FileBackend;

/// How an origin's persistent storage is set up.
///
/// ```
/// use pantry::storage::StorageConfig;
///
/// let config = StorageConfig::from_json_str(r#"{ "quota": 1024 }"#).unwrap();
/// assert_eq!(config.quota, Some(1024));
/// assert!(config.path.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Quota in UTF-16 code units; `null` disables it.
    pub quota: Option<usize>,
    /// JSON file to persist to; in-memory when absent.
    pub path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            quota: Some(DEFAULT_QUOTA),
            path: None,
        }
    }
}

impl StorageConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a config document from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| StorageError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build the backend this config describes.
    pub fn open_backend(&self) -> Result<Arc<dyn StorageBackend>> {
        Ok(match &self.path {
            Some(path) => Arc::new(FileBackend::open(path, self.quota)?),
            None => Arc::new(MemoryBackend::with_quota(self.quota)),
        })
    }
}
