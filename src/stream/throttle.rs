//! Rate limiting for snapshot streams

use futures::{Stream, ready};
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior, interval};

/// Adds [`throttle`](ThrottleExt::throttle) to any stream
pub trait ThrottleExt: Stream {
    /// Emit at most one item per `period`, keeping only the newest
    fn throttle(self, period: Duration) -> Throttle<Self>
    where
        Self: Sized,
    {
        Throttle::new(self, period)
    }
}

impl<T: Stream> ThrottleExt for T {}

pin_project! {
    /// Latest-wins rate limiter.
    ///
    /// The first poll emits the newest item ready at that moment, or the
    /// next one to arrive. After each emission the stream waits out one
    /// period and repeats, so a burst collapses to its last item.
    pub struct Throttle<S: Stream> {
        #[pin]
        stream: S,
        period: Duration,
        // Created on first poll so construction needs no runtime
        interval: Option<Interval>,
        // Period elapsed, waiting for an item
        open: bool,
        latest: Option<S::Item>,
        done: bool,
    }
}

impl<S: Stream> Throttle<S> {
    pub fn new(stream: S, period: Duration) -> Self {
        Self { stream, period, interval: None, open: false, latest: None, done: false }
    }
}

impl<S: Stream> Stream for Throttle<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if *this.done {
            return Poll::Ready(this.latest.take());
        }

        if !*this.open {
            let period = *this.period;
            let ticker = this.interval.get_or_insert_with(|| {
                let mut ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker
            });
            ready!(ticker.poll_tick(cx));
            *this.open = true;
        }

        loop {
            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => *this.latest = Some(item),
                Poll::Ready(None) => {
                    *this.done = true;
                    return Poll::Ready(this.latest.take());
                }
                Poll::Pending => {
                    return match this.latest.take() {
                        Some(item) => {
                            *this.open = false;
                            Poll::Ready(Some(item))
                        }
                        None => Poll::Pending,
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use futures::stream;

    #[tokio::test(start_paused = true)]
    async fn ready_burst_collapses_to_latest() {
        let items: Vec<u32> = stream::iter(0..10).throttle(Duration::from_millis(100)).collect().await;
        // iter is always ready: first poll drains everything
        assert_eq!(items, vec![9]);
    }

    #[tokio::test(start_paused = true)]
    async fn spaced_items_all_pass() {
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        let mut throttled = tokio_stream::wrappers::ReceiverStream::new(rx)
            .throttle(Duration::from_millis(10));

        tx.send(1).await.expect("open");
        assert_eq!(throttled.next().await, Some(1));

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(2).await.expect("open");
        assert_eq!(throttled.next().await, Some(2));

        drop(tx);
        assert_eq!(throttled.next().await, None);
    }
}
