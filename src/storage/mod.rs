//! Key/value storage with browser storage semantics.
//!
//! Backends hold the data; a [`StorageArea`] is the handle a page hands
//! out, and the point where writes become observable.

mod area;
mod backend;
mod config;
mod file;

pub(crate) use area::AreaHooks;
pub use area::{AreaKind, StorageArea};
pub use backend::{MemoryBackend, StorageBackend, StorageEntry, DEFAULT_QUOTA};
pub use config::StorageConfig;
pub use file::FileBackend;
