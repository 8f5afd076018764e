use std::collections::VecDeque;
use std::future::poll_fn;
use std::task::Poll;

use crate::pipeline::call::Call;

/// Calls that arrived on a connection and did not finish writing yet, in arrival order.
///
/// Only the head is ever handed out for writing. A call further back may already hold
/// its response, it still waits until every call in front of it is finished and removed,
/// so the bytes of call `n + 1` can never reach the wire before those of call `n`.
#[derive(Debug, Default)]
pub(crate) struct PendingCalls {
    calls: VecDeque<Call>,
    next_sequence: u64,
}

impl PendingCalls {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends a fully read call and returns its arrival sequence.
    pub(crate) fn enqueue(&mut self, mut call: Call) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        call.enqueued(sequence);
        self.calls.push_back(call);
        sequence
    }

    pub(crate) fn len(&self) -> usize {
        self.calls.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Returns the head if its response can be written right now.
    pub(crate) fn ready_head(&mut self) -> Option<&mut Call> {
        let head = self.calls.front_mut()?;
        if head.try_settle() { Some(head) } else { None }
    }

    /// Waits until the head's response arrives or its responder goes away.
    ///
    /// Never resolves while the queue is empty. Cancel safe.
    pub(crate) async fn head_settled(&mut self) {
        poll_fn(|cx| match self.calls.front_mut() {
            Some(head) => head.poll_settled(cx),
            None => Poll::Pending,
        })
        .await;
    }

    /// Removes the finished head.
    pub(crate) fn advance(&mut self) -> Option<Call> {
        self.calls.pop_front()
    }

    /// Drops every call, returning how many were disposed.
    pub(crate) fn dispose_all(&mut self) -> usize {
        let disposed = self.calls.len();
        self.calls.clear();
        disposed
    }
}
