//! Replay transport for recorded sessions
//!
//! Plays a [`Recording`] back as if a capture server were streaming it: the
//! client answers description requests from the recording and a playback
//! thread delivers its frames at the recorded frame rate.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::ingest::{Delivery, FrameSink};
use crate::transport::{RawDescriptor, ServerInfo, Transport, TransportClient};
use crate::types::{ConnectionConfig, FrameSample};
use crate::{Result, TrackerError};

/// A captured session: server identity, asset list and frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub server: ServerInfo,

    /// Only this server address accepts connections, if set
    #[serde(default)]
    pub server_address: Option<String>,

    #[serde(default)]
    pub descriptors: Vec<RawDescriptor>,

    #[serde(default)]
    pub frames: Vec<FrameSample>,

    /// Start over after the last frame
    #[serde(default)]
    pub looping: bool,
}

impl Recording {
    /// Parse a recording from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let recording: Recording =
            serde_yaml_ng::from_str(yaml).map_err(|e| TrackerError::Parse {
                context: "Recording".to_string(),
                details: e.to_string(),
            })?;
        recording.validate()?;
        Ok(recording)
    }

    /// Load a recording from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| TrackerError::file_error(path.to_path_buf(), e))?;
        let recording = Self::from_yaml(&yaml)?;
        info!(
            path = %path.display(),
            frames = recording.frames.len(),
            frame_rate = recording.server.frame_rate,
            "Opened recording"
        );
        Ok(recording)
    }

    fn validate(&self) -> Result<()> {
        let rate = self.server.frame_rate;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(TrackerError::invalid_config(format!(
                "recording frame rate must be positive, got {}",
                rate
            )));
        }
        Ok(())
    }
}

/// [`Transport`] that plays back a [`Recording`].
#[derive(Debug, Clone)]
pub struct ReplayTransport {
    recording: Arc<Recording>,
    speed: f64,
}

impl ReplayTransport {
    pub fn new(recording: Recording) -> Self {
        Self { recording: Arc::new(recording), speed: 1.0 }
    }

    /// Load a recording file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Recording::load(path)?))
    }

    /// Set playback speed multiplier
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed.clamp(0.1, 1000.0);
        debug!("Playback speed set to {}x", self.speed);
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn recording(&self) -> &Recording {
        &self.recording
    }
}

impl Transport for ReplayTransport {
    type Client = ReplayClient;

    fn connect(&mut self, config: &ConnectionConfig) -> Result<ReplayClient> {
        if let Some(address) = &self.recording.server_address {
            if *address != config.server_address {
                return Err(TrackerError::connection_failed(format!(
                    "no capture server at {}",
                    config.server_address
                )));
            }
        }

        let period = playback_period(self.recording.server.frame_rate, self.speed)?;
        debug!(
            local = %config.local_address,
            server = %config.server_address,
            mode = ?config.mode,
            ?period,
            "Replay connection opened"
        );
        Ok(ReplayClient {
            recording: Arc::clone(&self.recording),
            period,
            cursor: Arc::new(AtomicUsize::new(0)),
            playback: None,
            connected: true,
        })
    }
}

/// Time between delivered frames; must be non-zero and representable
fn playback_period(frame_rate: f64, speed: f64) -> Result<Duration> {
    match Duration::try_from_secs_f64(1.0 / (frame_rate * speed)) {
        Ok(period) if !period.is_zero() => Ok(period),
        _ => Err(TrackerError::invalid_config(format!(
            "cannot replay at {} fps x{}",
            frame_rate, speed
        ))),
    }
}

#[derive(Debug)]
struct Playback {
    cancel: CancellationToken,
    thread: JoinHandle<()>,
}

/// Connected replay client.
#[derive(Debug)]
pub struct ReplayClient {
    recording: Arc<Recording>,
    period: Duration,
    /// Next frame to deliver; survives re-registration
    cursor: Arc<AtomicUsize>,
    playback: Option<Playback>,
    connected: bool,
}

impl ReplayClient {
    /// Index of the next frame the playback will deliver
    pub fn position(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    fn stop_playback(&mut self) {
        if let Some(playback) = self.playback.take() {
            playback.cancel.cancel();
            if playback.thread.join().is_err() {
                warn!("Replay playback thread panicked");
            }
        }
    }

    /// Playback thread body: a single-threaded runtime paces delivery so a
    /// cancel wakes the thread at once instead of after a full period.
    fn play(
        recording: Arc<Recording>,
        sink: FrameSink,
        period: Duration,
        cursor: Arc<AtomicUsize>,
        cancel: CancellationToken,
    ) {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_time().build() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("Failed to build replay runtime: {}", e);
                return;
            }
        };
        runtime.block_on(Self::deliver_frames(recording, sink, period, cursor, cancel));
    }

    async fn deliver_frames(
        recording: Arc<Recording>,
        sink: FrameSink,
        period: Duration,
        cursor: Arc<AtomicUsize>,
        cancel: CancellationToken,
    ) {
        let total = recording.frames.len();
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Replay playback cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let mut index = cursor.load(Ordering::Acquire);
            if index >= total {
                if !recording.looping || total == 0 {
                    debug!("Reached end of replay");
                    return;
                }
                index = 0;
            }

            let frame = recording.frames[index].clone();
            trace!(index, frame = frame.frame_index, "Replaying frame");
            if sink.deliver(frame) == Delivery::Closed {
                debug!("Frame sink closed, ending replay");
                return;
            }
            cursor.store(index + 1, Ordering::Release);
        }
    }
}

impl TransportClient for ReplayClient {
    fn server_description(&mut self) -> Result<ServerInfo> {
        if !self.connected {
            return Err(TrackerError::connection_failed("replay client disconnected"));
        }
        Ok(self.recording.server.clone())
    }

    fn data_descriptions(&mut self) -> Result<Vec<RawDescriptor>> {
        if !self.connected {
            return Err(TrackerError::descriptor_fetch_failed("replay client disconnected"));
        }
        Ok(self.recording.descriptors.clone())
    }

    fn register_frame_callback(&mut self, sink: FrameSink) {
        self.stop_playback();
        if !self.connected {
            warn!("Ignoring frame callback on a disconnected replay client");
            return;
        }

        let cancel = CancellationToken::new();
        let recording = Arc::clone(&self.recording);
        let cursor = Arc::clone(&self.cursor);
        let period = self.period;
        let token = cancel.clone();
        match thread::Builder::new()
            .name("mocap-replay".to_string())
            .spawn(move || Self::play(recording, sink, period, cursor, token))
        {
            Ok(thread) => self.playback = Some(Playback { cancel, thread }),
            Err(e) => warn!("Failed to start replay playback: {}", e),
        }
    }

    fn unregister_frame_callback(&mut self) {
        self.stop_playback();
    }

    fn disconnect(&mut self) {
        self.stop_playback();
        self.connected = false;
    }
}

impl Drop for ReplayClient {
    fn drop(&mut self) {
        self.stop_playback();
    }
}
