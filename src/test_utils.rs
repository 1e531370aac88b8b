//! Test utilities: a scriptable transport and frame builders
//!
//! [`FakeTransport`] shares a [`FakeServer`] with the test, which scripts
//! failures, swaps the asset list, pushes frames through the registered sink
//! and inspects the calls the session made.

#![cfg(any(test, feature = "benchmark"))]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::ingest::{Delivery, FrameSink};
use crate::transport::{RawDescriptor, ServerInfo, Transport, TransportClient};
use crate::types::{ConnectionConfig, FrameSample, RigidBodySample};
use crate::{Result, TrackerError};

/// Calls a fake client received, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Connect,
    ServerDescription,
    DataDescriptions,
    Register,
    Unregister,
    Disconnect,
}

/// Shared script and call record for [`FakeTransport`].
#[derive(Debug, Default)]
pub struct FakeServer {
    pub fail_connect: AtomicBool,
    pub fail_server_description: AtomicBool,
    pub fail_descriptions: AtomicBool,
    descriptors: Mutex<Vec<RawDescriptor>>,
    sink: Mutex<Option<FrameSink>>,
    calls: Mutex<Vec<Call>>,
    configs: Mutex<Vec<ConnectionConfig>>,
    description_fetches: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FakeServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Server announcing one rigid body per name, ids from 1
    pub fn with_rigid_bodies(names: &[&str]) -> Arc<Self> {
        let server = Self::new();
        server.set_rigid_bodies(names);
        server
    }

    pub fn set_rigid_bodies(&self, names: &[&str]) {
        self.set_descriptors(rigid_body_descriptors(names));
    }

    pub fn set_descriptors(&self, descriptors: Vec<RawDescriptor>) {
        *lock(&self.descriptors) = descriptors;
    }

    /// Push a frame through the registered sink, as the delivery thread would
    pub fn deliver(&self, frame: FrameSample) -> Delivery {
        match lock(&self.sink).as_ref() {
            Some(sink) => sink.deliver(frame),
            None => Delivery::Closed,
        }
    }

    /// Clone of the registered sink, if any
    pub fn sink(&self) -> Option<FrameSink> {
        lock(&self.sink).clone()
    }

    pub fn has_callback(&self) -> bool {
        lock(&self.sink).is_some()
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    pub fn count(&self, call: Call) -> usize {
        lock(&self.calls).iter().filter(|&&c| c == call).count()
    }

    pub fn configs(&self) -> Vec<ConnectionConfig> {
        lock(&self.configs).clone()
    }

    pub fn description_fetches(&self) -> usize {
        self.description_fetches.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        lock(&self.calls).push(call);
    }
}

/// Transport backed by a [`FakeServer`].
#[derive(Debug, Clone)]
pub struct FakeTransport {
    server: Arc<FakeServer>,
}

impl FakeTransport {
    pub fn new(server: &Arc<FakeServer>) -> Self {
        Self { server: Arc::clone(server) }
    }
}

impl Transport for FakeTransport {
    type Client = FakeClient;

    fn connect(&mut self, config: &ConnectionConfig) -> Result<FakeClient> {
        self.server.record(Call::Connect);
        lock(&self.server.configs).push(config.clone());
        if self.server.fail_connect.load(Ordering::SeqCst) {
            return Err(TrackerError::connection_failed("connection refused"));
        }
        Ok(FakeClient { server: Arc::clone(&self.server) })
    }
}

/// Client half of [`FakeTransport`].
#[derive(Debug)]
pub struct FakeClient {
    server: Arc<FakeServer>,
}

impl TransportClient for FakeClient {
    fn server_description(&mut self) -> Result<ServerInfo> {
        self.server.record(Call::ServerDescription);
        if self.server.fail_server_description.load(Ordering::SeqCst) {
            return Err(TrackerError::connection_failed("no reply from server"));
        }
        Ok(ServerInfo {
            host: "fake-host".to_string(),
            application: "FakeCapture".to_string(),
            frame_rate: 120.0,
        })
    }

    fn data_descriptions(&mut self) -> Result<Vec<RawDescriptor>> {
        self.server.record(Call::DataDescriptions);
        self.server.description_fetches.fetch_add(1, Ordering::SeqCst);
        if self.server.fail_descriptions.load(Ordering::SeqCst) {
            return Err(TrackerError::descriptor_fetch_failed("asset list unavailable"));
        }
        Ok(lock(&self.server.descriptors).clone())
    }

    fn register_frame_callback(&mut self, sink: FrameSink) {
        self.server.record(Call::Register);
        *lock(&self.server.sink) = Some(sink);
    }

    fn unregister_frame_callback(&mut self) {
        self.server.record(Call::Unregister);
        lock(&self.server.sink).take();
    }

    fn disconnect(&mut self) {
        self.server.record(Call::Disconnect);
    }
}

/// Rigid-body descriptors named `names`, ids from 1
pub fn rigid_body_descriptors(names: &[&str]) -> Vec<RawDescriptor> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| RawDescriptor {
            type_tag: 1,
            id: i as i32 + 1,
            name: name.to_string(),
            ..RawDescriptor::default()
        })
        .collect()
}

/// Frame with `bodies` tracked rigid bodies at `(index, body, 0)`
pub fn tracked_frame(frame_index: u64, bodies: usize) -> FrameSample {
    let mut frame = FrameSample::new(frame_index);
    for i in 0..bodies {
        frame.rigid_bodies.push(RigidBodySample::tracked(
            i as i32 + 1,
            [frame_index as f64, i as f64, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ));
    }
    frame
}

/// Poll `condition` until it holds or five seconds pass
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}
