use std::pin::Pin;
use std::task::{self, Poll};

use futures::FutureExt;
use futures::channel::oneshot;

use crate::Outcome;

/// Resolves to the outcome of a latch use. Returned by
/// [`Latch::go_async()`][crate::Latch::go_async].
///
/// Resolves to `None` if the completion callback behind this future never got registered,
/// because an earlier registration won or the latch use had already completed.
///
/// Dropping the future does not affect the latch.
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct Completion {
    receiver: oneshot::Receiver<Outcome>,
}

impl Completion {
    pub(crate) fn new(receiver: oneshot::Receiver<Outcome>) -> Self {
        Self { receiver }
    }
}

impl Future for Completion {
    type Output = Option<Outcome>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> Poll<Self::Output> {
        self.receiver.poll_unpin(cx).map(Result::ok)
    }
}
