use futures::Stream;
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Instant, Sleep};

pin_project! {
    /// Stream returned by [`debounce`].
    #[must_use = "streams do nothing unless polled"]
    pub struct Debounce<S: Stream> {
        #[pin]
        stream: S,
        #[pin]
        sleep: Sleep,
        duration: Duration,
        pending: Option<S::Item>,
        exhausted: bool,
    }
}

/// Emit an item only once `stream` has been quiet for `duration`.
///
/// Each new item replaces the held one and restarts the timer. When the
/// underlying stream ends, a held item is flushed immediately.
pub fn debounce<S: Stream>(stream: S, duration: Duration) -> Debounce<S> {
    Debounce { stream, sleep: tokio::time::sleep(duration), duration, pending: None, exhausted: false }
}

impl<S: Stream> Stream for Debounce<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        while !*this.exhausted {
            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => {
                    *this.pending = Some(item);
                    this.sleep.as_mut().reset(Instant::now() + *this.duration);
                },
                Poll::Ready(None) => *this.exhausted = true,
                Poll::Pending => break,
            }
        }
        if this.pending.is_none() {
            return if *this.exhausted { Poll::Ready(None) } else { Poll::Pending };
        }
        if *this.exhausted {
            return Poll::Ready(this.pending.take());
        }
        match this.sleep.poll(cx) {
            Poll::Ready(()) => Poll::Ready(this.pending.take()),
            Poll::Pending => Poll::Pending,
        }
    }
}
