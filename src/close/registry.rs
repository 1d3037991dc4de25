//! Close-handler registry.
//!
//! A keyed collection of notification callbacks attached to one closeable
//! resource. Each registration mints a fresh token, so two structurally
//! equal handlers registered separately remain independently removable;
//! lookups never compare handler values. Removing an unknown or
//! already-removed token is a no-op, never an error — removal routinely
//! races against the drain performed by `close`.

use std::collections::HashMap;

/// An observer notified exactly once when its resource transitions to
/// closed.
///
/// Notification consumes the handler. Any closure works:
///
/// ```
/// use remoting_core::close::CloseHandler;
///
/// fn register(h: impl CloseHandler) {}
/// register(|| println!("closed"));
/// ```
pub trait CloseHandler: Send + 'static {
    /// Called when the associated resource has closed.
    fn handle_close(self: Box<Self>);
}

impl<F> CloseHandler for F
where
    F: FnOnce() + Send + 'static,
{
    fn handle_close(self: Box<Self>) {
        (*self)()
    }
}

/// Token-keyed handler set, exclusively owned by one resource.
///
/// Tokens are issued monotonically and never reused within a resource
/// instance.
pub(crate) struct HandlerSet {
    entries: HashMap<u64, Box<dyn CloseHandler>>,
    next_token: u64,
}

impl HandlerSet {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_token: 1,
        }
    }

    /// Store a handler and return its token.
    pub(crate) fn register(&mut self, handler: Box<dyn CloseHandler>) -> u64 {
        let token = self.next_token;
        self.next_token += 1;
        self.entries.insert(token, handler);
        token
    }

    /// Remove a handler by token. Unknown tokens are ignored.
    pub(crate) fn unregister(&mut self, token: u64) {
        self.entries.remove(&token);
    }

    /// Detach every stored handler. Relative order is unspecified.
    pub(crate) fn drain(self) -> Vec<Box<dyn CloseHandler>> {
        self.entries.into_values().collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_register_issues_distinct_tokens() {
        let mut set = HandlerSet::new();
        let a = set.register(Box::new(|| {}));
        let b = set.register(Box::new(|| {}));

        assert_ne!(a, b);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_equal_handlers_are_independently_removable() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut set = HandlerSet::new();

        // Two handlers with identical bodies; removing one must not touch
        // the other.
        let c1 = counter.clone();
        let first = set.register(Box::new(move || {
            c1.fetch_add(1, Ordering::SeqCst);
        }));
        let c2 = counter.clone();
        let _second = set.register(Box::new(move || {
            c2.fetch_add(1, Ordering::SeqCst);
        }));

        set.unregister(first);
        for handler in set.drain() {
            handler.handle_close();
        }

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregister_unknown_token_is_noop() {
        let mut set = HandlerSet::new();
        let token = set.register(Box::new(|| {}));

        set.unregister(9999);
        assert_eq!(set.len(), 1);

        set.unregister(token);
        set.unregister(token);
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn test_drain_yields_every_handler_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut set = HandlerSet::new();

        for _ in 0..4 {
            let c = counter.clone();
            set.register(Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let drained = set.drain();
        assert_eq!(drained.len(), 4);
        for handler in drained {
            handler.handle_close();
        }

        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }
}
