//! An in-flight request as a closeable unit of work.
//!
//! Composes the lifecycle core with a reply slot: the transport delivers
//! terminal outcomes through the request, and closing the request while it
//! is still undecided resolves the caller's wait with an
//! indeterminate-outcome report instead of leaving it hanging.

use std::sync::Arc;

use bytes::Bytes;

use crate::close::{Closeable, Lifecycle, LifecycleOptions};
use crate::error::{RemotingError, Result};
use crate::executor::TaskExecutor;
use crate::ident::NumericId;
use crate::reply::{ReplyHandler, ReplySlot};

/// One outstanding remote call.
///
/// Close handlers registered on the request fire when it terminates for any
/// reason; the reply handler receives exactly one terminal outcome. Dropping
/// the request closes it, so an abandoned request still resolves its caller.
pub struct OutstandingRequest {
    id: NumericId,
    slot: Arc<ReplySlot>,
    lifecycle: Lifecycle,
}

impl OutstandingRequest {
    /// Dispatch a new request.
    ///
    /// `handler` receives the terminal outcome; `executor` delivers close
    /// notifications.
    pub fn new<H: ReplyHandler>(
        id: NumericId,
        handler: H,
        executor: Arc<dyn TaskExecutor>,
    ) -> Self {
        Self::with_slot(id, ReplySlot::new(handler), executor)
    }

    /// Dispatch a new request around an existing slot (e.g. one half of
    /// [`outcome_channel`]).
    ///
    /// [`outcome_channel`]: crate::reply::outcome_channel
    pub fn with_slot(id: NumericId, slot: ReplySlot, executor: Arc<dyn TaskExecutor>) -> Self {
        let options = LifecycleOptions {
            name: format!("request {}", id),
            ..LifecycleOptions::default()
        };
        Self {
            id,
            slot: Arc::new(slot),
            lifecycle: Lifecycle::with_options(executor, options),
        }
    }

    /// The wire identifier correlating replies to this request.
    pub fn id(&self) -> NumericId {
        self.id
    }

    /// Whether a terminal outcome has been delivered.
    pub fn is_terminated(&self) -> bool {
        self.slot.is_terminated()
    }

    /// Deliver the successful reply, then close the request.
    ///
    /// # Errors
    ///
    /// Propagates a delivery failure or a teardown failure to the deliverer.
    pub fn handle_reply(&self, payload: Bytes) -> Result<()> {
        let delivered = self.slot.deliver_reply(payload);
        self.close().and(delivered)
    }

    /// Deliver a failure outcome, then close the request.
    ///
    /// # Errors
    ///
    /// Propagates a delivery failure or a teardown failure to the deliverer.
    pub fn handle_exception(&self, error: RemotingError) -> Result<()> {
        let delivered = self.slot.deliver_exception(error);
        self.close().and(delivered)
    }

    /// Deliver a cancellation acknowledgement, then close the request.
    ///
    /// # Errors
    ///
    /// Propagates a delivery failure or a teardown failure to the deliverer.
    pub fn handle_cancellation(&self) -> Result<()> {
        let delivered = self.slot.deliver_cancellation();
        self.close().and(delivered)
    }
}

impl Closeable for OutstandingRequest {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn close_action(&self) -> Result<()> {
        // Closed before any outcome arrived: the true result is unknown.
        if !self.slot.is_terminated() {
            tracing::debug!("Request {} closed mid-flight", self.id);
            self.slot.deliver_indeterminate("closed before any outcome was determined")?;
        }
        Ok(())
    }
}

impl Drop for OutstandingRequest {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::debug!("Error closing abandoned request {}: {}", self.id, e);
        }
    }
}

impl std::fmt::Debug for OutstandingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutstandingRequest")
            .field("id", &self.id)
            .field("open", &self.is_open())
            .field("terminated", &self.is_terminated())
            .finish()
    }
}
