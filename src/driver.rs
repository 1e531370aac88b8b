//! Driver spawns and manages the frame ingest worker

use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ingest::FrameIngest;
use crate::types::FrameSample;
use crate::{Result, TrackerError};

/// Handle to a running ingest worker
#[derive(Debug)]
pub struct DriverHandle {
    cancel: CancellationToken,
    worker: Option<JoinHandle<u64>>,
}

/// Driver spawns the worker that drains the frame queue
///
/// The worker is a plain thread: the transport delivers from its own thread
/// and the host ticks synchronously, so there is no runtime to borrow.
pub struct Driver;

impl Driver {
    /// Spawn a worker feeding `frames` into `ingest`
    ///
    /// The worker exits once the ingest's token is cancelled or every sender
    /// for `frames` has been dropped.
    pub fn spawn(ingest: FrameIngest, frames: mpsc::Receiver<FrameSample>) -> Result<DriverHandle> {
        let cancel = ingest.cancel_token().clone();
        let worker = thread::Builder::new()
            .name("mocap-ingest".to_string())
            .spawn(move || Self::ingest_task(ingest, frames))
            .map_err(|e| {
                TrackerError::connection_failed_with_source("failed to spawn ingest worker", Box::new(e))
            })?;

        Ok(DriverHandle { cancel, worker: Some(worker) })
    }

    fn ingest_task(ingest: FrameIngest, mut frames: mpsc::Receiver<FrameSample>) -> u64 {
        info!("Frame ingest worker started");
        let mut frame_count = 0u64;

        while let Some(frame) = frames.blocking_recv() {
            if ingest.cancel_token().is_cancelled() {
                debug!("Frame ingest cancelled");
                break;
            }
            frame_count += 1;
            ingest.handle(frame);
        }

        info!("Frame ingest worker ended (processed {} frames)", frame_count);
        frame_count
    }
}

impl DriverHandle {
    /// Stop the worker from publishing; it exits on its next wake-up
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel, and reap the worker if it has already exited.
    ///
    /// Never waits: a worker parked on a queue that a transport still holds
    /// open is left to exit when that queue closes.
    pub fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            if worker.is_finished() {
                match worker.join() {
                    Ok(frames) => debug!(frames, "Ingest worker joined"),
                    Err(_) => warn!("Ingest worker panicked"),
                }
            } else {
                debug!("Ingest worker detached until its queue closes");
            }
        }
    }
}

impl Drop for DriverHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
