//! Async snapshot streams for consumers that await instead of polling

mod throttle;

pub use throttle::{Throttle, ThrottleExt};

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::types::{OutputRecord, UpdateRate};

/// Stream the snapshots held by `snapshots`, paced to at most `rate`.
///
/// Yields the current snapshot first. Intermediate snapshots published
/// between two deliveries are skipped; the newest one wins.
pub fn snapshot_stream(
    snapshots: watch::Receiver<Arc<OutputRecord>>,
    rate: UpdateRate,
    published_hz: f64,
) -> BoxStream<'static, Arc<OutputRecord>> {
    let stream = WatchStream::new(snapshots);
    match rate.throttle_interval(published_hz) {
        None => stream.boxed(),
        Some(period) => stream.throttle(period).boxed(),
    }
}
