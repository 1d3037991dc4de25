//! Reply correlation.
//!
//! An outstanding remote call receives exactly one terminal outcome: a
//! successful reply, a failure, or a cancellation acknowledgement. The
//! transport promises to deliver at most one of the three; [`ReplySlot`]
//! additionally enforces first-call-wins on the receiving side, so a buggy
//! or racing deliverer cannot re-signal the caller. The contract is "at most
//! one effective call".
//!
//! A delivery method's own failure (the original caller disappeared, the
//! channel is gone) surfaces to whoever attempted delivery, distinct from a
//! failure being delivered as the reply's *content*.

mod request;

pub use request::OutstandingRequest;

use std::sync::Mutex;

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::error::{RemotingError, Result};

/// The terminal sink for one outstanding request.
///
/// Each method consumes the handler, so a direct holder cannot deliver two
/// outcomes. Handlers that may be raced by multiple deliverers live behind a
/// [`ReplySlot`].
pub trait ReplyHandler: Send + 'static {
    /// A successful reply arrived with the given payload.
    ///
    /// # Errors
    ///
    /// Fails if the outcome could not be passed on to the caller.
    fn handle_reply(self: Box<Self>, payload: Bytes) -> Result<()>;

    /// The request failed; the error is the reply's content.
    ///
    /// # Errors
    ///
    /// Fails if the outcome could not be passed on to the caller.
    fn handle_exception(self: Box<Self>, error: RemotingError) -> Result<()>;

    /// The request was cancelled before completion.
    ///
    /// # Errors
    ///
    /// Fails if the outcome could not be passed on to the caller.
    fn handle_cancellation(self: Box<Self>) -> Result<()>;
}

/// First-call-wins wrapper around a [`ReplyHandler`].
///
/// The first terminal delivery takes the handler; every later delivery
/// returns `Ok(())` with no effect. Once delivered the slot is inert.
pub struct ReplySlot {
    handler: Mutex<Option<Box<dyn ReplyHandler>>>,
}

impl ReplySlot {
    /// Wrap a handler for delivery.
    pub fn new<H: ReplyHandler>(handler: H) -> Self {
        Self {
            handler: Mutex::new(Some(Box::new(handler))),
        }
    }

    fn take(&self) -> Option<Box<dyn ReplyHandler>> {
        match self.handler.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    /// Whether a terminal outcome has already been delivered.
    ///
    /// Advisory snapshot; a concurrent delivery may land immediately after.
    pub fn is_terminated(&self) -> bool {
        match self.handler.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }

    /// Deliver a successful reply.
    ///
    /// # Errors
    ///
    /// Propagates the handler's own delivery failure to the deliverer.
    pub fn deliver_reply(&self, payload: Bytes) -> Result<()> {
        match self.take() {
            Some(handler) => handler.handle_reply(payload),
            None => Ok(()),
        }
    }

    /// Deliver a failure outcome.
    ///
    /// # Errors
    ///
    /// Propagates the handler's own delivery failure to the deliverer.
    pub fn deliver_exception(&self, error: RemotingError) -> Result<()> {
        match self.take() {
            Some(handler) => handler.handle_exception(error),
            None => Ok(()),
        }
    }

    /// Deliver a cancellation acknowledgement.
    ///
    /// # Errors
    ///
    /// Propagates the handler's own delivery failure to the deliverer.
    pub fn deliver_cancellation(&self) -> Result<()> {
        match self.take() {
            Some(handler) => handler.handle_cancellation(),
            None => Ok(()),
        }
    }

    /// Report that the true outcome cannot be determined (resource closed
    /// mid-flight). Delivered as an [`IndeterminateOutcome`] exception so
    /// the caller can tell "it failed" from "we don't know what happened".
    ///
    /// [`IndeterminateOutcome`]: RemotingError::IndeterminateOutcome
    ///
    /// # Errors
    ///
    /// Propagates the handler's own delivery failure to the deliverer.
    pub fn deliver_indeterminate(&self, reason: &str) -> Result<()> {
        self.deliver_exception(RemotingError::IndeterminateOutcome(reason.to_string()))
    }
}

impl std::fmt::Debug for ReplySlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplySlot")
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

/// The terminal outcome of a request, as observed by an awaiting caller.
#[derive(Debug)]
pub enum ReplyOutcome {
    /// The request succeeded with this payload.
    Reply(Bytes),
    /// The request failed. An `IndeterminateOutcome` error here means the
    /// true result is unknown, not that the request is known to have failed.
    Failure(RemotingError),
    /// The request was cancelled before completion.
    Cancelled,
}

struct OutcomeSender {
    tx: oneshot::Sender<ReplyOutcome>,
}

impl OutcomeSender {
    fn send(self, outcome: ReplyOutcome) -> Result<()> {
        self.tx.send(outcome).map_err(|_| {
            RemotingError::Transport("reply receiver dropped before delivery".to_string())
        })
    }
}

impl ReplyHandler for OutcomeSender {
    fn handle_reply(self: Box<Self>, payload: Bytes) -> Result<()> {
        self.send(ReplyOutcome::Reply(payload))
    }

    fn handle_exception(self: Box<Self>, error: RemotingError) -> Result<()> {
        self.send(ReplyOutcome::Failure(error))
    }

    fn handle_cancellation(self: Box<Self>) -> Result<()> {
        self.send(ReplyOutcome::Cancelled)
    }
}

/// Create a slot whose outcome can be awaited.
///
/// The transport side delivers into the returned [`ReplySlot`]; the caller
/// awaits the receiver. Dropping the receiver makes later delivery fail with
/// a `Transport` error, surfaced to the deliverer.
pub fn outcome_channel() -> (ReplySlot, oneshot::Receiver<ReplyOutcome>) {
    let (tx, rx) = oneshot::channel();
    (ReplySlot::new(OutcomeSender { tx }), rx)
}
