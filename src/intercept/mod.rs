//! Reference-counted interception of persistent storage writes.

mod interceptor;

pub use interceptor::{InterceptGuard, Interceptor};
