use std::fmt;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::channel::oneshot;
use tokio::sync::OwnedSemaphorePermit;
use tokio::task::AbortHandle;
use tracing::trace;

use crate::protocol::{ResponseDescriptor, SendError};

/// Lifecycle of a [`Call`] inside the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// created, not submitted yet
    Queued,
    /// in the pending queue, waiting for the handler's response
    AwaitingResponse,
    /// the body is being written
    Writing,
    /// the body is written, the terminal message is being written
    Finalizing,
    Completed,
    Failed,
}

enum Slot {
    Pending(oneshot::Receiver<ResponseDescriptor>),
    Ready(ResponseDescriptor),
    Abandoned,
    Taken,
}

/// One request/response exchange on a connection.
///
/// A call is created once its request has been fully read. The matching [`Responder`]
/// goes to whoever computes the response; the call itself is submitted to the
/// pipeline, which owns it until the response is written or the call fails.
///
/// Dropping a call disposes it: the handler task attached with [`Call::with_task`]
/// is aborted and the response body, if one was delivered, is released.
pub struct Call {
    sequence: Option<u64>,
    keep_alive: bool,
    slot: Slot,
    task: Option<AbortHandle>,
    // a slot of the pipeline's bound, given back when the call is dropped
    _permit: Option<OwnedSemaphorePermit>,
    state: CallState,
}

impl Call {
    pub fn new(keep_alive: bool) -> (Call, Responder) {
        let (sender, receiver) = oneshot::channel();
        let call =
            Call { sequence: None, keep_alive, slot: Slot::Pending(receiver), task: None, _permit: None, state: CallState::Queued };
        (call, Responder { sender })
    }

    /// Ties the task producing the response to this call, so disposing the call aborts it.
    #[must_use]
    pub fn with_task(mut self, task: AbortHandle) -> Self {
        self.task = Some(task);
        self
    }

    pub(crate) fn with_permit(mut self, permit: OwnedSemaphorePermit) -> Self {
        self._permit = Some(permit);
        self
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    /// Arrival position on the connection, assigned on submission.
    pub fn sequence(&self) -> Option<u64> {
        self.sequence
    }

    pub(crate) fn enqueued(&mut self, sequence: u64) {
        self.sequence = Some(sequence);
        self.transition(CallState::AwaitingResponse);
    }

    pub(crate) fn transition(&mut self, state: CallState) {
        trace!(sequence = ?self.sequence, from = ?self.state, to = ?state, "call state changed");
        self.state = state;
    }

    /// Returns true once the response arrived or the responder went away.
    pub(crate) fn is_settled(&self) -> bool {
        !matches!(self.slot, Slot::Pending(_))
    }

    /// Checks for the response without waiting.
    pub(crate) fn try_settle(&mut self) -> bool {
        if let Slot::Pending(receiver) = &mut self.slot {
            match receiver.try_recv() {
                Ok(Some(response)) => self.slot = Slot::Ready(response),
                Ok(None) => return false,
                Err(oneshot::Canceled) => self.slot = Slot::Abandoned,
            }
        }
        true
    }

    pub(crate) fn poll_settled(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        if let Slot::Pending(receiver) = &mut self.slot {
            self.slot = match receiver.poll_unpin(cx) {
                Poll::Ready(Ok(response)) => Slot::Ready(response),
                Poll::Ready(Err(oneshot::Canceled)) => Slot::Abandoned,
                Poll::Pending => return Poll::Pending,
            };
        }
        Poll::Ready(())
    }

    /// Moves the delivered response out of the call.
    pub(crate) fn take_response(&mut self) -> Result<ResponseDescriptor, SendError> {
        match std::mem::replace(&mut self.slot, Slot::Taken) {
            Slot::Ready(response) => Ok(response),
            Slot::Abandoned => Err(SendError::ResponseAbandoned),
            slot @ Slot::Pending(_) => {
                self.slot = slot;
                Err(SendError::invalid_body("response is not ready yet"))
            }
            Slot::Taken => Err(SendError::invalid_body("response was already taken")),
        }
    }
}

impl Drop for Call {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if !matches!(self.state, CallState::Completed) {
            trace!(sequence = ?self.sequence, state = ?self.state, "dispose unfinished call");
        }
    }
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("sequence", &self.sequence)
            .field("keep_alive", &self.keep_alive)
            .field("state", &self.state)
            .field("settled", &self.is_settled())
            .finish_non_exhaustive()
    }
}

/// The producing side of a [`Call`]: delivers the response exactly once.
#[derive(Debug)]
pub struct Responder {
    sender: oneshot::Sender<ResponseDescriptor>,
}

impl Responder {
    /// Attaches the response to the call.
    ///
    /// Gives the response back when the call has already been disposed.
    pub fn respond(self, response: ResponseDescriptor) -> Result<(), ResponseDescriptor> {
        self.sender.send(response)
    }

    /// Returns true when the call was disposed and nobody waits for a response anymore.
    pub fn is_disposed(&self) -> bool {
        self.sender.is_canceled()
    }

    /// Resolves once the call is disposed.
    pub async fn disposed(&mut self) {
        self.sender.cancellation().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::task::noop_waker_ref;
    use http::StatusCode;

    #[test]
    fn settle_synchronously_when_already_responded() {
        let (mut call, responder) = Call::new(true);
        assert!(!call.try_settle());

        responder.respond(ResponseDescriptor::empty(StatusCode::OK)).unwrap();
        assert!(call.try_settle());
        assert_eq!(call.take_response().unwrap().status(), StatusCode::OK);
        assert!(call.take_response().is_err());
    }

    #[test]
    fn dropped_responder_abandons_call() {
        let (mut call, responder) = Call::new(true);
        drop(responder);

        let mut cx = Context::from_waker(noop_waker_ref());
        assert!(call.poll_settled(&mut cx).is_ready());
        assert!(matches!(call.take_response(), Err(SendError::ResponseAbandoned)));
    }

    #[test]
    fn respond_after_dispose_gives_response_back() {
        let (call, responder) = Call::new(false);
        assert!(!responder.is_disposed());
        drop(call);

        assert!(responder.is_disposed());
        let rejected = responder.respond(ResponseDescriptor::empty(StatusCode::ACCEPTED)).unwrap_err();
        assert_eq!(rejected.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn dispose_aborts_attached_task() {
        let task = tokio::spawn(futures::future::pending::<()>());
        let (call, _responder) = Call::new(true);
        let call = call.with_task(task.abort_handle());

        drop(call);
        let join = task.await;
        assert!(join.unwrap_err().is_cancelled());
    }

    #[test]
    fn state_follows_queue() {
        let (mut call, _responder) = Call::new(true);
        assert_eq!(call.state(), CallState::Queued);
        assert_eq!(call.sequence(), None);

        call.enqueued(7);
        assert_eq!(call.state(), CallState::AwaitingResponse);
        assert_eq!(call.sequence(), Some(7));
    }
}
