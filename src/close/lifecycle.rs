//! Lifecycle core for closeable resources.
//!
//! [`Lifecycle`] is the close machinery a resource embeds: an open/closed
//! flag and the handler registry behind one mutex, plus the injected
//! task-execution service used to deliver notifications. A resource type
//! implements [`Closeable`] by exposing its `Lifecycle` and (optionally) a
//! `close_action` teardown hook; the provided `close` is idempotent no
//! matter how many threads race it.
//!
//! The lock is held only for the state flip and registry mutation. Handler
//! notification and teardown always run outside it, so a slow handler cannot
//! stall close or register calls on the same resource.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use remoting_core::close::{Closeable, Lifecycle};
//! use remoting_core::executor::InlineExecutor;
//!
//! struct Connection {
//!     lifecycle: Lifecycle,
//! }
//!
//! impl Closeable for Connection {
//!     fn lifecycle(&self) -> &Lifecycle {
//!         &self.lifecycle
//!     }
//! }
//!
//! let conn = Connection {
//!     lifecycle: Lifecycle::new(Arc::new(InlineExecutor)),
//! };
//! let key = conn.add_close_handler(|| println!("connection closed"));
//! conn.close().unwrap();
//! conn.close().unwrap(); // no effect
//! ```

use std::backtrace::Backtrace;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};

use crate::close::registry::{CloseHandler, HandlerSet};
use crate::error::{RemotingError, Result};
use crate::executor::{run_or_inline, Task, TaskExecutor};

/// Whether a lifecycle captures its creation backtrace for leak reports.
///
/// Diagnostic only; has no effect on correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeakTracking {
    /// Leaked resources are reported without a creation backtrace.
    Disabled,
    /// The creation backtrace is captured and included in leak reports.
    Enabled,
}

impl LeakTracking {
    /// Read the `REMOTING_LEAK_DEBUG` environment variable, once per
    /// process, for owners that want an ambient toggle.
    pub fn from_env() -> Self {
        static FROM_ENV: OnceLock<LeakTracking> = OnceLock::new();
        *FROM_ENV.get_or_init(|| {
            match std::env::var("REMOTING_LEAK_DEBUG") {
                Ok(v) if v == "1" || v.eq_ignore_ascii_case("true") => LeakTracking::Enabled,
                _ => LeakTracking::Disabled,
            }
        })
    }

    fn is_enabled(self) -> bool {
        self == LeakTracking::Enabled
    }
}

/// Configuration for a [`Lifecycle`].
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Resource name used in log messages and `NotOpen` errors.
    pub name: String,
    /// Leak-report verbosity.
    pub leak_tracking: LeakTracking,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            name: "resource".to_string(),
            leak_tracking: LeakTracking::Disabled,
        }
    }
}

struct State {
    closed: bool,
    // Allocated lazily on first registration; permanently detached at close.
    handlers: Option<HandlerSet>,
}

struct Shared {
    name: String,
    state: Mutex<State>,
    executor: Arc<dyn TaskExecutor>,
    backtrace: Option<Backtrace>,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// The close core of a resource: open/closed state, handler registry, and
/// asynchronous notification dispatch.
///
/// Owned by exactly one resource struct. Dropping a `Lifecycle` that is
/// still open logs a leak warning and force-closes it (handlers are still
/// notified); this is a diagnostic backstop, not a substitute for calling
/// `close`.
pub struct Lifecycle {
    shared: Arc<Shared>,
}

impl Lifecycle {
    /// Create an open lifecycle with default options.
    pub fn new(executor: Arc<dyn TaskExecutor>) -> Self {
        Self::with_options(executor, LifecycleOptions::default())
    }

    /// Create an open lifecycle.
    ///
    /// The executor delivers close notifications; it is shared and must
    /// tolerate concurrent submission.
    pub fn with_options(executor: Arc<dyn TaskExecutor>, options: LifecycleOptions) -> Self {
        let backtrace = options
            .leak_tracking
            .is_enabled()
            .then(Backtrace::force_capture);
        Self {
            shared: Arc::new(Shared {
                name: options.name,
                state: Mutex::new(State {
                    closed: false,
                    handlers: None,
                }),
                executor,
                backtrace,
            }),
        }
    }

    /// The resource name used in diagnostics.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Snapshot of the open/closed state.
    ///
    /// Advisory only: the resource may close immediately after this returns
    /// `true`.
    pub fn is_open(&self) -> bool {
        !self.shared.lock_state().closed
    }

    /// Fail with `NotOpen` if the resource has closed.
    ///
    /// Used by operations that require an open resource as a precondition.
    pub fn check_open(&self) -> Result<()> {
        if self.shared.lock_state().closed {
            Err(RemotingError::NotOpen(format!(
                "{} is not open",
                self.shared.name
            )))
        } else {
            Ok(())
        }
    }

    /// Register a close handler.
    ///
    /// If the resource is open the handler is stored under a fresh key and
    /// notified when the resource closes. If it has already closed, the
    /// handler is notified immediately (scheduled on the executor, inline on
    /// rejection) and the returned key is a permanent no-op.
    pub fn add_close_handler<H: CloseHandler>(&self, handler: H) -> HandlerKey {
        let handler: Box<dyn CloseHandler> = Box::new(handler);
        {
            let mut state = self.shared.lock_state();
            if !state.closed {
                let set = state.handlers.get_or_insert_with(HandlerSet::new);
                let token = set.register(handler);
                return HandlerKey {
                    shared: Arc::downgrade(&self.shared),
                    token,
                };
            }
        }
        tracing::debug!(
            "Close handler registered on closed {}, notifying immediately",
            self.shared.name
        );
        run_or_inline(
            &*self.shared.executor,
            notification_task(self.shared.name.clone(), handler),
        );
        HandlerKey::inert()
    }

    /// Perform the close transition if it has not happened yet.
    ///
    /// The winning caller flips the state, detaches the registry, and
    /// schedules one notification per handler; it gets `true` and is
    /// expected to run its teardown next. Every other caller gets `false`
    /// and must do nothing. [`Closeable::close`] wraps this; call it
    /// directly only when composing a custom close path.
    pub fn begin_close(&self) -> bool {
        let handlers = {
            let mut state = self.shared.lock_state();
            if state.closed {
                return false;
            }
            state.closed = true;
            state.handlers.take()
        };
        tracing::trace!("Closed {}", self.shared.name);
        if let Some(set) = handlers {
            for handler in set.drain() {
                run_or_inline(
                    &*self.shared.executor,
                    notification_task(self.shared.name.clone(), handler),
                );
            }
        }
        true
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        let handlers = {
            let mut state = self.shared.lock_state();
            if state.closed {
                return;
            }
            state.closed = true;
            state.handlers.take()
        };
        match &self.shared.backtrace {
            Some(backtrace) => tracing::warn!(
                "Leaked {}, force-closing; created at:\n{}",
                self.shared.name,
                backtrace
            ),
            None => tracing::warn!("Leaked {}, force-closing", self.shared.name),
        }
        if let Some(set) = handlers {
            // The executor may be mid-shutdown at this point; deliver in the
            // dropping thread.
            for handler in set.drain() {
                notification_task(self.shared.name.clone(), handler)();
            }
        }
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("name", &self.shared.name)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Wrap a handler so a panic during notification is contained and logged
/// rather than propagated to the closer or allowed to suppress other
/// handlers.
fn notification_task(name: String, handler: Box<dyn CloseHandler>) -> Task {
    Box::new(move || {
        if catch_unwind(AssertUnwindSafe(move || handler.handle_close())).is_err() {
            tracing::error!("Close handler for {} panicked during notification", name);
        }
    })
}

/// Capability returned by handler registration; removes exactly the handler
/// it was minted for.
///
/// Keys use token identity, never handler equality, so two keys are never
/// interchangeable even when their handlers are equal. `remove` after the
/// handler has been removed, drained, or notified is a no-op.
pub struct HandlerKey {
    shared: Weak<Shared>,
    token: u64,
}

impl HandlerKey {
    fn inert() -> Self {
        Self {
            shared: Weak::new(),
            token: 0,
        }
    }

    /// Remove the associated handler if it is still registered.
    pub fn remove(&self) {
        if let Some(shared) = self.shared.upgrade() {
            let mut state = shared.lock_state();
            if let Some(set) = state.handlers.as_mut() {
                set.unregister(self.token);
            }
        }
    }
}

impl std::fmt::Debug for HandlerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerKey").field("token", &self.token).finish()
    }
}

/// A resource with a single idempotent shutdown operation and a registrable
/// set of shutdown observers.
///
/// Implementors embed a [`Lifecycle`] and override [`close_action`] for
/// type-specific teardown. `close_action` runs exactly once, after the state
/// transition and handler detachment are visible to other threads; its error
/// propagates to the caller of the winning `close` (notifications are
/// already scheduled and are not rolled back).
///
/// [`close_action`]: Closeable::close_action
pub trait Closeable {
    /// The embedded lifecycle core.
    fn lifecycle(&self) -> &Lifecycle;

    /// Type-specific teardown, invoked exactly once by the winning `close`.
    fn close_action(&self) -> Result<()> {
        Ok(())
    }

    /// Close the resource. Safe to call any number of times from any number
    /// of threads; only the first call has any effect.
    fn close(&self) -> Result<()> {
        if !self.lifecycle().begin_close() {
            return Ok(());
        }
        self.close_action()
    }

    /// Advisory open/closed snapshot.
    fn is_open(&self) -> bool {
        self.lifecycle().is_open()
    }

    /// Fail with `NotOpen` if the resource has closed.
    fn check_open(&self) -> Result<()> {
        self.lifecycle().check_open()
    }

    /// Register a close handler; see [`Lifecycle::add_close_handler`].
    fn add_close_handler<H: CloseHandler>(&self, handler: H) -> HandlerKey
    where
        Self: Sized,
    {
        self.lifecycle().add_close_handler(handler)
    }
}
