//! Asynchronous read requests backed by a synchronous read.
//!
//! [`PreadRequest::submit`] runs the read to completion before it returns.
//! Only the completion notification is deferred: the first poll posts it
//! (wakes the task and returns `Pending`), and the result becomes
//! receivable from the next poll on. Callers therefore never observe
//! completion before the submission call has returned, the same ordering a
//! genuinely asynchronous backend gives them.
//!
//! ```text
//!   submit() ──► [complete, not notified] ──poll──► [notified] ──poll──► Ready(result)
//!                 try_receive() = NotReady           try_receive() = result
//! ```

use crate::error::{Error, Result};

use once_cell::sync::OnceCell;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Handle to a submitted read.
#[derive(Debug)]
pub struct PreadRequest {
    /// Outcome of the read, set exactly once during submission.
    outcome: OnceCell<Result<usize>>,
    /// Whether the completion notification has been delivered.
    notified: bool,
    /// Whether the outcome has been handed to the caller.
    received: bool,
}

impl PreadRequest {
    /// Run `read` now and wrap its outcome in a request.
    pub fn submit<F>(read: F) -> Self
    where
        F: FnOnce() -> Result<usize>,
    {
        Self {
            outcome: OnceCell::with_value(read()),
            notified: false,
            received: false,
        }
    }

    /// Whether the read has finished. Always true once `submit` returned.
    pub fn is_complete(&self) -> bool {
        self.outcome.get().is_some()
    }

    /// Whether the completion notification has been delivered.
    pub fn is_notified(&self) -> bool {
        self.notified
    }

    /// Request cancellation.
    ///
    /// Always returns `false`: the read has already happened by the time a
    /// cancellation could be requested.
    pub fn cancel(&self) -> bool {
        false
    }

    /// Take the result without waiting.
    ///
    /// Returns [`Error::NotReady`] until the completion notification has
    /// been delivered, and [`Error::AlreadyReceived`] after the result was
    /// taken once.
    pub fn try_receive(&mut self) -> Result<usize> {
        if !self.notified {
            return Err(Error::NotReady);
        }
        self.take()
    }

    /// Poll for the result, posting the completion notification on first use.
    pub fn poll_receive(&mut self, cx: &mut Context<'_>) -> Poll<Result<usize>> {
        if !self.notified {
            self.notified = true;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }
        Poll::Ready(self.take())
    }

    /// Block the current thread until the result is available.
    pub fn wait(self) -> Result<usize> {
        futures::executor::block_on(self)
    }

    fn take(&mut self) -> Result<usize> {
        if self.received {
            return Err(Error::AlreadyReceived);
        }
        self.received = true;
        self.outcome.take().unwrap_or(Err(Error::AlreadyReceived))
    }
}

impl Future for PreadRequest {
    type Output = Result<usize>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().poll_receive(cx)
    }
}
