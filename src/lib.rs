//! # Pantry
//!
//! Mirror a page's persistent key/value storage into an application's
//! state-update pipeline.
//!
//! A [`LocalStorageEventBridge`] mounted on a [`Page`] sends its
//! [`Dispatcher`]:
//! - one [`Action::LocalStorageBulk`] with every stored entry, on mount
//! - one [`Action::LocalStorageUpdate`] per set or remove, whether made by
//!   this page (through interception) or by another page of the same
//!   [`Origin`] (through native storage events)
//!
//! ## Host model
//!
//! Pages, origins and storage areas model the browser platform the bridge
//! would otherwise run against:
//! - `Origin` - shared persistent storage and the pages open on it
//! - `Page` - one tab, with local and session storage
//! - `StorageBackend` - in-memory or JSON-file storage
//!
//! Interception is reference counted: any number of bridges can be
//! mounted on one page, and unmounting one leaves the others working.

pub mod bridge;
pub mod error;
pub mod event;
pub mod intercept;
pub mod runtime;
pub mod storage;

// Re-export main types for convenience
pub use bridge::{Action, BridgeGuard, Dispatcher, LocalStorageEventBridge};
pub use error::{Result, StorageError};
pub use runtime::{Origin, Page};
pub use storage::{StorageArea, StorageConfig};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_works() {
        // Basic smoke test
        Page::scope(|| {
            let page = Page::current();
            page.local_storage().set_item("k", "v").unwrap();
            assert_eq!(page.local_storage().get_item("k").as_deref(), Some("v"));
        });
    }
}
