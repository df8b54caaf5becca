//! Rate limiting for display view streams

use futures::Stream;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior, interval};

/// Adds [`throttle`](ThrottleExt::throttle) to every stream.
pub trait ThrottleExt: Stream {
    /// Yield at most one item per `duration`, always the newest one seen.
    ///
    /// A quiet source keeps the throttled stream open; it ends only when the
    /// source ends, after flushing any held item.
    fn throttle(self, duration: Duration) -> Throttle<Self>
    where
        Self: Sized,
    {
        Throttle::new(self, duration)
    }
}

impl<T: Stream> ThrottleExt for T {}

pin_project! {
    /// Latest-wins rate limiter over a source stream
    pub struct Throttle<S: Stream> {
        #[pin]
        stream: S,
        interval: Interval,
        pending: Option<S::Item>,
        ended: bool,
    }
}

impl<S: Stream> Throttle<S> {
    /// Wrap `stream`; the first item passes straight through.
    pub fn new(stream: S, duration: Duration) -> Self {
        let mut interval = interval(duration);
        // Delay rather than burst after an idle spell
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self { stream, interval, pending: None, ended: false }
    }
}

impl<S: Stream> Stream for Throttle<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        // Keep only the newest ready item
        while !*this.ended {
            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => *this.pending = Some(item),
                Poll::Ready(None) => *this.ended = true,
                Poll::Pending => break,
            }
        }

        if this.pending.is_none() {
            return if *this.ended { Poll::Ready(None) } else { Poll::Pending };
        }

        match this.interval.poll_tick(cx) {
            Poll::Ready(_) => Poll::Ready(this.pending.take()),
            Poll::Pending => Poll::Pending,
        }
    }
}
