//! Session lifecycle and the per-tick facade
//!
//! A [`Session`] owns the transport, the connected client and the ingest
//! worker. The host calls [`Session::tick`] once per update with its four
//! inputs; the session advances its state machine
//!
//! ```text
//! Idle -> Connecting -> Describing -> Streaming -> Stopping -> Idle
//! ```
//!
//! and returns the status log plus the latest published snapshot. Nothing
//! in a tick returns an error: failures are logged and the session falls
//! back to `Idle`, waiting for the host to raise `activate` again.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use futures::stream::BoxStream;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SessionOptions;
use crate::descriptors::DescriptorCache;
use crate::driver::{Driver, DriverHandle};
use crate::ingest::{FrameIngest, FrameSink, IngestCounts, IngestShared};
use crate::stream::snapshot_stream;
use crate::transport::{DEFAULT_FRAME_RATE, Transport, TransportClient};
use crate::types::{ConnectionConfig, OutputRecord, TickInput, UpdateRate};
use crate::Result;

#[cfg(test)]
mod tests;

/// Status line shown whenever the session is deactivated
pub const STOPPED_MESSAGE: &str = "Service stopped. Activate module to begin streaming.";

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Describing,
    Streaming,
    Stopping,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Describing => "describing",
            SessionState::Streaming => "streaming",
            SessionState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// The six lists handed to the host: log, points, labels, names, positions, quaternions
pub type HostLists = (Vec<String>, Vec<[f64; 3]>, Vec<String>, Vec<String>, Vec<f64>, Vec<f64>);

/// What the host receives from every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutput {
    /// Status lines, oldest first
    pub log: Vec<String>,
    /// Latest published snapshot
    pub record: Arc<OutputRecord>,
}

impl TickOutput {
    /// Flatten into the host's six output lists
    pub fn into_lists(self) -> HostLists {
        let record = Arc::unwrap_or_clone(self.record);
        (
            self.log,
            record.points,
            record.labels,
            record.rigid_body_names,
            record.rigid_body_positions,
            record.rigid_body_quaternions,
        )
    }
}

/// Frame delivery plumbing that lives while streaming
#[derive(Debug)]
struct Streaming {
    /// Kept so the queue outlives the refetch bracket
    sink: FrameSink,
    driver: DriverHandle,
}

/// A motion-capture streaming session.
///
/// One value of this type is one tracked session; the host keeps exactly one.
pub struct Session<T: Transport> {
    transport: T,
    options: SessionOptions,
    state: SessionState,
    config: Option<ConnectionConfig>,
    client: Option<T::Client>,
    streaming: Option<Streaming>,
    shared: Arc<IngestShared>,
    /// Bumped whenever the descriptor cache is discarded
    epoch: u64,
    /// Set once activation was attempted; cleared by deactivate or reset
    activation_latched: bool,
    published_hz: f64,
}

impl<T: Transport> Session<T> {
    /// Create an idle session over `transport`
    pub fn new(transport: T, options: SessionOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self::idle(transport, options))
    }

    /// Create an idle session with default options
    pub fn with_defaults(transport: T) -> Self {
        Self::idle(transport, SessionOptions::default())
    }

    fn idle(transport: T, options: SessionOptions) -> Self {
        let shared = Arc::new(IngestShared::new(&options));
        Self {
            transport,
            published_hz: DEFAULT_FRAME_RATE / options.decimation as f64,
            options,
            state: SessionState::Idle,
            config: None,
            client: None,
            streaming: None,
            shared,
            epoch: 0,
            activation_latched: false,
        }
    }

    /// Advance the session by one host update.
    pub fn tick(&mut self, input: &TickInput) -> TickOutput {
        if input.reset {
            self.reset();
        }

        match (self.state, input.activate) {
            (SessionState::Streaming, true) => self.refresh_assets(),
            (SessionState::Streaming, false) => self.stop(),
            (_, true) => {
                if !self.activation_latched {
                    let config = input.connection_config(self.options.connection_mode);
                    self.activate(config);
                }
            }
            (_, false) => {
                self.activation_latched = false;
                self.show_stopped();
            }
        }

        self.output()
    }

    /// Clear descriptors, log, counters and output.
    ///
    /// A streaming session is torn down first. Calling this repeatedly leaves
    /// the same empty state each time.
    pub fn reset(&mut self) {
        info!(state = %self.state, "Resetting session");
        self.teardown();
        self.discard_descriptors();
        let log = &self.shared.log;
        self.shared.output.send_modify(|output| {
            *output = Arc::new(OutputRecord::empty());
            log.clear();
        });
        self.shared.stats.reset();
        self.activation_latched = false;
        self.transition(SessionState::Idle);
    }

    fn activate(&mut self, config: ConnectionConfig) {
        self.activation_latched = true;
        let log = &self.shared.log;
        log.push("Motion capture client starting.");
        log.push(format!("Local IP set: {}", config.local_address));
        log.push(format!("Server IP set: {}", config.server_address));

        self.transition(SessionState::Connecting);
        self.shared.log.push("Attempting connection to server...");
        self.config = Some(config.clone());

        let mut client = match self.transport.connect(&config) {
            Ok(client) => client,
            Err(e) => {
                warn!(server = %config.server_address, "Connection failed: {}", e);
                self.shared.log.push("Error: Failed to connect. Check the connection settings.");
                self.shared.log.push(format!("Error: {}", e));
                self.transition(SessionState::Idle);
                return;
            }
        };

        self.shared.log.push("Fetching the Server Descriptor.");
        match client.server_description() {
            Ok(server) => {
                let log = &self.shared.log;
                log.push("Success: Connected to the server.");
                log.push("Server Info:");
                log.push(format!("Host: {}", server.host));
                log.push(format!("Application Name: {}", server.application));
                self.published_hz = server.frame_rate / self.options.decimation as f64;
                info!(
                    host = %server.host,
                    application = %server.application,
                    frame_rate = server.frame_rate,
                    "Connected to capture server"
                );
            }
            Err(e) => {
                warn!("Server description failed: {}", e);
                self.shared.log.push("Error: Failed to connect. Check the connection settings.");
                client.disconnect();
                self.transition(SessionState::Idle);
                return;
            }
        }

        self.transition(SessionState::Describing);
        self.discard_descriptors();
        if Self::fetch_descriptors(&self.shared, self.epoch, &mut client).is_err() {
            client.disconnect();
            self.transition(SessionState::Idle);
            return;
        }

        self.shared.log.push("Fetching the Frame Data.");
        let streaming = match self.start_ingest() {
            Ok(streaming) => streaming,
            Err(e) => {
                warn!("Could not start frame ingest: {}", e);
                self.shared.log.push(format!("Error: {}", e));
                client.disconnect();
                self.transition(SessionState::Idle);
                return;
            }
        };
        client.register_frame_callback(streaming.sink.clone());
        self.shared.log.push("Success: Data Port Connected.");

        self.client = Some(client);
        self.streaming = Some(streaming);
        self.transition(SessionState::Streaming);
    }

    fn start_ingest(&self) -> Result<Streaming> {
        let (tx, rx) = mpsc::channel(self.options.frame_queue_capacity);
        let ingest = FrameIngest::new(
            Arc::clone(&self.shared),
            &self.options,
            self.epoch,
            CancellationToken::new(),
        );
        let driver = Driver::spawn(ingest, rx)?;
        Ok(Streaming { sink: FrameSink::new(tx, Arc::clone(&self.shared)), driver })
    }

    /// Fetch and install a fresh descriptor cache; the old one stays on failure.
    fn fetch_descriptors(shared: &IngestShared, epoch: u64, client: &mut T::Client) -> Result<()> {
        match client.data_descriptions() {
            Ok(raw) => {
                let mut notes =
                    vec!["Success: Data Descriptions obtained from the server.".to_string()];
                let cache = DescriptorCache::build(epoch, raw, &mut notes);
                shared.log.extend(notes);
                shared.descriptors.send_replace(Arc::new(cache));
                Ok(())
            }
            Err(e) => {
                warn!("Data description fetch failed: {}", e);
                shared.log.push("Error: Could not get the Data Descriptions");
                Err(e)
            }
        }
    }

    /// Drain a pending refetch request raised by the ingest.
    fn refresh_assets(&mut self) {
        if !self.shared.assets_changed.load(Ordering::Acquire) {
            return;
        }
        let Some(client) = self.client.as_mut() else {
            return;
        };

        self.shared.log.push("Change in the list of the assets. Refetching the descriptions");
        debug!(epoch = self.epoch, "Refetching descriptors");

        client.unregister_frame_callback();
        let fetched = Self::fetch_descriptors(&self.shared, self.epoch, client);
        if let Some(streaming) = &self.streaming {
            client.register_frame_callback(streaming.sink.clone());
        }
        self.shared.assets_changed.store(false, Ordering::Release);

        if fetched.is_err() {
            debug!("Keeping previous descriptors after failed refetch");
        }
    }

    fn stop(&mut self) {
        self.transition(SessionState::Stopping);
        self.teardown();
        self.discard_descriptors();
        let log = &self.shared.log;
        self.shared.output.send_modify(|output| {
            *output = Arc::new(OutputRecord::empty());
            log.clear();
            log.push(STOPPED_MESSAGE);
        });
        self.activation_latched = false;
        self.transition(SessionState::Idle);
    }

    fn show_stopped(&self) {
        let log = &self.shared.log;
        if log.lines() != [STOPPED_MESSAGE] {
            log.clear();
            log.push(STOPPED_MESSAGE);
        }
    }

    /// Unregister, stop the worker, then disconnect.
    fn teardown(&mut self) {
        let streaming = self.streaming.take();
        let client = self.client.take();

        if let Some(mut client) = client {
            client.unregister_frame_callback();
            if let Some(streaming) = streaming {
                streaming.driver.shutdown();
                drop(streaming.sink);
            }
            client.disconnect();
            info!("Disconnected from capture server");
        } else if let Some(streaming) = streaming {
            streaming.driver.shutdown();
        }
    }

    fn discard_descriptors(&mut self) {
        self.epoch += 1;
        self.shared.descriptors.send_replace(Arc::new(DescriptorCache::empty(self.epoch)));
        self.shared.assets_changed.store(false, Ordering::Release);
    }

    fn transition(&mut self, to: SessionState) {
        if self.state != to {
            debug!(from = %self.state, to = %to, "Session transition");
            self.state = to;
        }
    }

    fn output(&self) -> TickOutput {
        // Holding the snapshot keeps the log consistent with it
        let record = self.shared.output.borrow();
        TickOutput { log: self.shared.log.lines(), record: Arc::clone(&record) }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Settings recorded by the most recent activation
    pub fn config(&self) -> Option<&ConnectionConfig> {
        self.config.as_ref()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Current descriptor cache
    pub fn descriptors(&self) -> Arc<DescriptorCache> {
        self.shared.cache()
    }

    pub fn log(&self) -> Vec<String> {
        self.shared.log.lines()
    }

    /// Latest published snapshot
    pub fn latest(&self) -> Arc<OutputRecord> {
        Arc::clone(&self.shared.output.borrow())
    }

    pub fn stats(&self) -> IngestCounts {
        self.shared.stats.snapshot()
    }

    /// Whether the ingest has requested a descriptor refetch
    pub fn assets_changed(&self) -> bool {
        self.shared.assets_changed.load(Ordering::Acquire)
    }

    /// Snapshots per second at the server's current rate
    pub fn published_hz(&self) -> f64 {
        self.published_hz
    }

    /// Receiver that always holds the latest snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<OutputRecord>> {
        self.shared.output.subscribe()
    }

    /// Stream of snapshots, paced to at most `rate`
    pub fn snapshots(&self, rate: UpdateRate) -> BoxStream<'static, Arc<OutputRecord>> {
        snapshot_stream(self.subscribe(), rate, self.published_hz)
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        if self.client.is_some() || self.streaming.is_some() {
            debug!("Dropping active session");
            self.teardown();
        }
    }
}
