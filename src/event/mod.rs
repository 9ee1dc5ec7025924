//! Storage notifications and typed listener lists.
//!
//! Two kinds of notification reach a page:
//! - [`StorageEvent`]: delivered by the origin when *another* page changed
//!   shared storage
//! - [`ChangeNotification`]: raised on the writing page itself while
//!   interception is installed
//!
//! Both implement [`StorageChange`], the shape the bridge consumes.

mod event;
mod listeners;

pub use event::{ChangeNotification, StorageChange, StorageEvent};
pub use listeners::{ListenerGuard, Listeners};
