//! Pages, origins and the ambient page context.
//!
//! This module models the host the bridge runs in: an [`Origin`] owns the
//! shared persistent storage, and each [`Page`] is one tab on it.

mod context;
mod origin;

pub use context::Page;
pub use origin::Origin;
