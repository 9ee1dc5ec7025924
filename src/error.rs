//! Error types for storage operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by storage backends.
///
/// Reading storage never fails; only mutations and opening a file-backed
/// store can.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The write would push the storage past its quota.
    #[error("storage quota of {quota} units exceeded while writing key {key:?}")]
    QuotaExceeded { key: String, quota: usize },

    /// Reading or writing the backing file failed.
    #[error("storage file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing file exists but does not hold a valid entry list.
    #[error("storage file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Encoding entries or a config document failed.
    #[error("encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T, E = StorageError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_message_names_the_key() {
        let err = StorageError::QuotaExceeded {
            key: "theme".to_string(),
            quota: 10,
        };
        assert_eq!(
            err.to_string(),
            "storage quota of 10 units exceeded while writing key \"theme\""
        );
    }
}
