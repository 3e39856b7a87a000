//! Inflight guard for streamed responses.
//!
//! A streamed response outlives the handler that started it, so the guard
//! travels with the stream. At end-of-stream the guard's `release()` is
//! driven to completion before `None` is yielded, the same awaited exit the
//! immediate path takes. A stream dropped mid-flight (client disconnect)
//! falls back to the guard's `Drop`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;

use crate::admission::guard::{AdmissionGuard, AdmissionState};

type Release = Pin<Box<dyn Future<Output = AdmissionState> + Send>>;

enum Exit {
    Holding(AdmissionGuard),
    Releasing(AdmissionState, Release),
    Done(AdmissionState),
}

/// A stream that holds an [`AdmissionGuard`] until it is exhausted or dropped.
pub struct GuardedStream<S> {
    inner: S,
    exit: Exit,
}

impl<S> fmt::Debug for GuardedStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedStream")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<S> GuardedStream<S> {
    pub fn new(inner: S, guard: AdmissionGuard) -> Self {
        Self {
            inner,
            exit: Exit::Holding(guard),
        }
    }

    /// State of the held guard, or how it ended once the stream finished.
    ///
    /// Stays at the held state until the release has completed.
    pub fn state(&self) -> Option<AdmissionState> {
        Some(match &self.exit {
            Exit::Holding(guard) => guard.state(),
            Exit::Releasing(held, _) => *held,
            Exit::Done(state) => *state,
        })
    }

    fn poll_release(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        loop {
            match &mut self.exit {
                Exit::Holding(_) => {
                    let placeholder = Exit::Done(AdmissionState::Skipped);
                    if let Exit::Holding(guard) = std::mem::replace(&mut self.exit, placeholder) {
                        let held = guard.state();
                        self.exit = Exit::Releasing(held, Box::pin(guard.release()));
                    }
                }
                Exit::Releasing(_, release) => {
                    let state = std::task::ready!(release.as_mut().poll(cx));
                    self.exit = Exit::Done(state);
                }
                Exit::Done(_) => return Poll::Ready(()),
            }
        }
    }
}

impl<S> Stream for GuardedStream<S>
where
    S: Stream + Unpin,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if !matches!(this.exit, Exit::Holding(_)) {
            std::task::ready!(this.poll_release(cx));
            return Poll::Ready(None);
        }
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(None) => {
                std::task::ready!(this.poll_release(cx));
                Poll::Ready(None)
            }
            other => other,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
