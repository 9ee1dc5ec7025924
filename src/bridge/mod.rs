//! The local storage event bridge.
//!
//! A mounted bridge turns storage activity into [`Action`]s for a
//! [`Dispatcher`]: one bulk snapshot on mount, then one update per change.

mod action;
mod bridge;

pub use action::{Action, BulkSnapshot, Dispatcher};
pub use bridge::{export_snapshot, BridgeGuard, LocalStorageEventBridge};
