//! Closeable-resource lifecycle.
//!
//! A closeable resource flips from open to closed exactly once, detaches its
//! registered close handlers atomically with the flip, and notifies each of
//! them asynchronously on an injected [`TaskExecutor`]. Handlers registered
//! after the close are notified immediately instead of stored.
//!
//! [`TaskExecutor`]: crate::executor::TaskExecutor

mod lifecycle;
mod registry;

pub use lifecycle::{Closeable, HandlerKey, LeakTracking, Lifecycle, LifecycleOptions};
pub use registry::CloseHandler;
