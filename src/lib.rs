//! # remoting-core
//!
//! Resource-lifecycle and reply-correlation core for an RPC transport: the
//! machinery that makes every closeable resource (connection, channel,
//! request) close exactly once, notify interested parties asynchronously,
//! detect leaks, and correlate asynchronous replies with the request that
//! produced them.
//!
//! ## Architecture
//!
//! - **[`ident`]**: packs an origin flag and a non-negative id into one
//!   wire-transmissible 32-bit integer and back.
//! - **[`close`]**: the closeable-resource base — idempotent close, keyed
//!   close-handler registry, asynchronous notification, leak diagnostics.
//! - **[`executor`]**: the injected task-execution service close
//!   notifications run on, with a synchronous fallback when submission is
//!   rejected.
//! - **[`reply`]**: the three-way terminal sink an outstanding request
//!   implements, with first-call-wins enforcement, and the composition of a
//!   request with a lifecycle.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use remoting_core::close::{Closeable, Lifecycle};
//! use remoting_core::executor::InlineExecutor;
//!
//! struct Channel {
//!     lifecycle: Lifecycle,
//! }
//!
//! impl Closeable for Channel {
//!     fn lifecycle(&self) -> &Lifecycle {
//!         &self.lifecycle
//!     }
//! }
//!
//! let channel = Channel {
//!     lifecycle: Lifecycle::new(Arc::new(InlineExecutor)),
//! };
//! let key = channel.add_close_handler(|| println!("channel closed"));
//! channel.close().unwrap();
//! ```

pub mod close;
pub mod error;
pub mod executor;
pub mod ident;
pub mod reply;

pub use close::{Closeable, CloseHandler, HandlerKey, LeakTracking, Lifecycle, LifecycleOptions};
pub use error::{RemotingError, Result};
pub use executor::{InlineExecutor, TaskExecutor};
pub use ident::{IdOrigin, NumericId};
pub use reply::{outcome_channel, OutstandingRequest, ReplyHandler, ReplyOutcome, ReplySlot};
