//! Frame ingest: change detection, decimation and snapshot publication
//!
//! Frames travel from the transport's delivery thread through a bounded
//! channel ([`FrameSink`]) to the driver thread, which runs [`FrameIngest`].
//! The ingest never refetches descriptors itself; it raises the shared
//! `assets_changed` flag and the polling side drains it on its next tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::SessionOptions;
use crate::descriptors::DescriptorCache;
use crate::extract::Extractor;
use crate::status::StatusLog;
use crate::types::{FrameSample, OutputRecord};

/// Frame counters, zeroed on reset.
#[derive(Debug, Default)]
pub struct IngestStats {
    received: AtomicU64,
    extracted: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestCounts {
    /// Frames handled by the ingest
    pub received: u64,
    /// Frames that produced a published record
    pub extracted: u64,
    /// Frames discarded because the queue was full
    pub dropped: u64,
}

impl IngestStats {
    pub fn snapshot(&self) -> IngestCounts {
        IngestCounts {
            received: self.received.load(Ordering::Acquire),
            extracted: self.extracted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.received.store(0, Ordering::Relaxed);
        self.extracted.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
    }
}

/// State shared between the polling side and the ingest worker.
#[derive(Debug)]
pub(crate) struct IngestShared {
    /// Current descriptor cache, replaced whole
    pub(crate) descriptors: watch::Sender<Arc<DescriptorCache>>,
    /// Latest published record, replaced whole
    pub(crate) output: watch::Sender<Arc<OutputRecord>>,
    /// Level-triggered refetch request
    pub(crate) assets_changed: AtomicBool,
    pub(crate) log: StatusLog,
    pub(crate) stats: IngestStats,
}

impl IngestShared {
    pub(crate) fn new(options: &SessionOptions) -> Self {
        let (descriptors, _) = watch::channel(Arc::new(DescriptorCache::empty(0)));
        let (output, _) = watch::channel(Arc::new(OutputRecord::empty()));
        Self {
            descriptors,
            output,
            assets_changed: AtomicBool::new(false),
            log: StatusLog::new(options.max_log_lines),
            stats: IngestStats::default(),
        }
    }

    pub(crate) fn cache(&self) -> Arc<DescriptorCache> {
        Arc::clone(&self.descriptors.borrow())
    }
}

/// Outcome of handing a frame to a [`FrameSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Accepted,
    /// Queue full; the frame was discarded
    Dropped,
    /// The session stopped listening
    Closed,
}

/// Non-blocking entry point for the transport's delivery thread.
#[derive(Debug, Clone)]
pub struct FrameSink {
    tx: mpsc::Sender<FrameSample>,
    shared: Arc<IngestShared>,
}

impl FrameSink {
    pub(crate) fn new(tx: mpsc::Sender<FrameSample>, shared: Arc<IngestShared>) -> Self {
        Self { tx, shared }
    }

    /// Queue a frame without blocking
    pub fn deliver(&self, frame: FrameSample) -> Delivery {
        match self.tx.try_send(frame) {
            Ok(()) => Delivery::Accepted,
            Err(mpsc::error::TrySendError::Full(frame)) => {
                self.shared.stats.dropped.fetch_add(1, Ordering::Relaxed);
                trace!(frame = frame.frame_index, "Frame queue full, dropping frame");
                Delivery::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Keeps every `factor`th frame by frame index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decimator {
    factor: u64,
}

impl Decimator {
    pub fn new(factor: u64) -> Self {
        Self { factor: factor.max(1) }
    }

    pub fn factor(&self) -> u64 {
        self.factor
    }

    pub fn keeps(&self, frame_index: u64) -> bool {
        frame_index % self.factor == 0
    }
}

/// Per-frame handler run on the driver thread.
#[derive(Debug)]
pub struct FrameIngest {
    shared: Arc<IngestShared>,
    decimator: Decimator,
    extractor: Extractor,
    epoch: u64,
    cancel: CancellationToken,
}

impl FrameIngest {
    pub(crate) fn new(
        shared: Arc<IngestShared>,
        options: &SessionOptions,
        epoch: u64,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            shared,
            decimator: Decimator::new(options.decimation),
            extractor: Extractor::new(options),
            epoch,
            cancel,
        }
    }

    /// Token that stops this ingest from publishing
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Process one raw frame. Returns whether a record was published.
    ///
    /// The received counter is bumped after processing, so a reader that
    /// observes it also observes the frame's effects.
    pub fn handle(&self, frame: FrameSample) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        let published = self.process(frame);
        self.shared.stats.received.fetch_add(1, Ordering::Release);
        published
    }

    fn process(&self, frame: FrameSample) -> bool {
        // One cache per frame: detection and extraction see the same epoch
        let cache = self.shared.cache();
        if cache.epoch() != self.epoch {
            trace!(
                frame = frame.frame_index,
                cache_epoch = cache.epoch(),
                ingest_epoch = self.epoch,
                "Skipping frame from another connection epoch"
            );
            return false;
        }

        if cache.diverges_from(&frame)
            && !self.shared.assets_changed.swap(true, Ordering::AcqRel)
        {
            debug!(
                frame = frame.frame_index,
                frame_rigid_bodies = frame.rigid_body_count(),
                cached_rigid_bodies = cache.rigid_bodies().len(),
                models_changed = frame.tracking_models_changed,
                "Asset list changed, requesting refetch"
            );
        }

        if !self.decimator.keeps(frame.frame_index) {
            return false;
        }

        let extraction = self.extractor.extract(&cache, &frame);
        let cancel = &self.cancel;
        let log = &self.shared.log;
        // Cancellation is re-checked under the channel lock; a stop that
        // clears the output takes the same lock after cancelling.
        let published = self.shared.output.send_if_modified(move |current| {
            if cancel.is_cancelled() {
                return false;
            }
            log.extend(extraction.notes);
            *current = Arc::new(extraction.record);
            true
        });

        if published {
            self.shared.stats.extracted.fetch_add(1, Ordering::Relaxed);
        }
        published
    }
}
