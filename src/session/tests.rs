//! Lifecycle tests for the session facade
//!
//! These drive a [`Session`] over the scriptable fake transport and check
//! state transitions, the status log, and what reaches the published snapshot.

use super::*;
use crate::ingest::Delivery;
use crate::test_utils::{Call, FakeServer, FakeTransport, tracked_frame, wait_until};
use crate::types::{FrameSample, RigidBodySample};
use futures::StreamExt;
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn session(server: &Arc<FakeServer>) -> Session<FakeTransport> {
    init_tracing();
    Session::with_defaults(FakeTransport::new(server))
}

fn on() -> TickInput {
    TickInput::activate("127.0.0.1", "127.0.0.1")
}

fn off() -> TickInput {
    on().deactivated()
}

/// Deliver `frame` and wait until the ingest has handled it
fn deliver_and_wait(session: &Session<FakeTransport>, server: &FakeServer, frame: FrameSample) {
    let before = session.stats().received;
    assert_eq!(server.deliver(frame), Delivery::Accepted);
    assert!(wait_until(|| session.stats().received > before), "frame was not ingested");
}

#[test]
fn activation_reaches_streaming_before_any_frame() {
    let server = FakeServer::with_rigid_bodies(&["Wand"]);
    let mut session = session(&server);

    let output = session.tick(&on());

    assert_eq!(session.state(), SessionState::Streaming);
    assert!(server.has_callback());
    assert_eq!(
        server.calls(),
        [Call::Connect, Call::ServerDescription, Call::DataDescriptions, Call::Register]
    );
    assert_eq!(session.stats().received, 0);
    assert_eq!(output.record.frame_index, None);
    assert!(output.log.iter().any(|l| l == "RigidBody (Wand)"));
    assert_eq!(output.log.last().map(String::as_str), Some("Success: Data Port Connected."));
    assert_eq!(session.descriptors().rigid_bodies().len(), 1);
    assert_eq!(session.config().map(|c| c.server_address.as_str()), Some("127.0.0.1"));
}

#[test]
fn deactivation_stops_with_a_single_status_line() {
    let server = FakeServer::with_rigid_bodies(&["Wand"]);
    let mut session = session(&server);
    session.tick(&on());
    deliver_and_wait(&session, &server, tracked_frame(4, 1));
    assert_eq!(session.latest().rigid_body_names, ["Wand"]);

    let output = session.tick(&off());

    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(output.log, [STOPPED_MESSAGE]);
    assert_eq!(output.record.tracked_count(), 0);
    assert!(output.record.rigid_body_positions.is_empty());
    assert!(session.descriptors().is_empty());
    assert!(!server.has_callback());

    let calls = server.calls();
    let unregister = calls.iter().rposition(|&c| c == Call::Unregister).expect("unregistered");
    let disconnect = calls.iter().rposition(|&c| c == Call::Disconnect).expect("disconnected");
    assert!(unregister < disconnect, "callback must go before the connection: {calls:?}");

    // Staying off keeps exactly one line
    let output = session.tick(&off());
    assert_eq!(output.log, [STOPPED_MESSAGE]);
}

#[test]
fn idle_tick_with_defaults_reports_stopped() {
    let server = FakeServer::new();
    let mut session = session(&server);

    let output = session.tick(&TickInput::default());

    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(output.log, [STOPPED_MESSAGE]);
    assert!(server.calls().is_empty());
}

#[test]
fn connection_failure_is_logged_and_not_retried_until_reissued() {
    let server = FakeServer::with_rigid_bodies(&["Wand"]);
    server.fail_connect.store(true, Ordering::SeqCst);
    let mut session = session(&server);

    let output = session.tick(&on());
    assert_eq!(session.state(), SessionState::Idle);
    assert!(output.log.iter().any(|l| l.contains("Failed to connect")));
    assert_eq!(server.count(Call::Register), 0);

    // Holding activate does not retry
    session.tick(&on());
    assert_eq!(server.count(Call::Connect), 1);

    // Re-issuing activate does
    server.fail_connect.store(false, Ordering::SeqCst);
    session.tick(&off());
    session.tick(&on());
    assert_eq!(server.count(Call::Connect), 2);
    assert_eq!(session.state(), SessionState::Streaming);
}

#[test]
fn server_description_failure_disconnects() {
    let server = FakeServer::with_rigid_bodies(&["Wand"]);
    server.fail_server_description.store(true, Ordering::SeqCst);
    let mut session = session(&server);

    let output = session.tick(&on());

    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(server.count(Call::Disconnect), 1);
    assert_eq!(server.count(Call::DataDescriptions), 0);
    assert!(output.log.iter().any(|l| l.contains("Failed to connect")));
}

#[test]
fn descriptor_fetch_failure_returns_to_idle_without_callback() {
    let server = FakeServer::with_rigid_bodies(&["Wand"]);
    server.fail_descriptions.store(true, Ordering::SeqCst);
    let mut session = session(&server);

    let output = session.tick(&on());

    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(server.count(Call::Register), 0);
    assert_eq!(server.count(Call::Disconnect), 1);
    assert!(output.log.iter().any(|l| l == "Error: Could not get the Data Descriptions"));
}

#[test]
fn decimated_frames_reach_the_snapshot() {
    let server = FakeServer::with_rigid_bodies(&["Wand", "Tool"]);
    let mut session = session(&server);
    session.tick(&on());

    for index in 1..=9 {
        deliver_and_wait(&session, &server, tracked_frame(index, 2));
    }

    let output = session.tick(&on());
    assert_eq!(output.record.frame_index, Some(8));
    assert_eq!(output.record.rigid_body_names, ["Wand", "Tool"]);
    assert_eq!(output.record.position(1), Some([8.0, 1.0, 0.0]));
    assert_eq!(output.record.quaternion(0), Some([1.0, 0.0, 0.0, 0.0]));
    assert!(output.record.is_consistent());
    assert_eq!(session.stats().extracted, 2);
    assert_eq!(server.count(Call::DataDescriptions), 1);
}

#[test]
fn untracked_body_is_logged_by_name() {
    let server = FakeServer::with_rigid_bodies(&["Wand", "Tool"]);
    let mut session = session(&server);
    session.tick(&on());

    let mut frame = tracked_frame(0, 1);
    frame.rigid_bodies.push(RigidBodySample::untracked(2));
    deliver_and_wait(&session, &server, frame);

    let output = session.tick(&on());
    assert_eq!(output.record.rigid_body_names, ["Wand"]);
    let notes: Vec<_> = output.log.iter().filter(|l| l.contains("Tool")).collect();
    assert_eq!(notes, ["Tool is not tracked in current frame."]);
}

#[test]
fn asset_change_triggers_exactly_one_refetch() {
    let server = FakeServer::with_rigid_bodies(&["Wand"]);
    let mut session = session(&server);
    session.tick(&on());
    assert_eq!(server.description_fetches(), 1);

    server.set_rigid_bodies(&["Wand", "Tool"]);
    deliver_and_wait(&session, &server, tracked_frame(1, 2));
    assert!(session.assets_changed());

    let output = session.tick(&on());
    assert_eq!(server.description_fetches(), 2);
    assert!(!session.assets_changed());
    assert_eq!(session.descriptors().rigid_bodies().len(), 2);
    assert!(output.log.iter().any(|l| l.starts_with("Change in the list of the assets")));
    assert!(server.has_callback());

    let calls = server.calls();
    assert_eq!(
        &calls[calls.len() - 3..],
        [Call::Unregister, Call::DataDescriptions, Call::Register]
    );

    // Matching frames keep the flag down; no further refetch
    deliver_and_wait(&session, &server, tracked_frame(4, 2));
    session.tick(&on());
    assert_eq!(server.description_fetches(), 2);
    assert_eq!(session.latest().rigid_body_names, ["Wand", "Tool"]);
}

#[test]
fn failed_refetch_keeps_previous_descriptors() {
    let server = FakeServer::with_rigid_bodies(&["Wand"]);
    let mut session = session(&server);
    session.tick(&on());

    let mut frame = tracked_frame(1, 1);
    frame.tracking_models_changed = true;
    deliver_and_wait(&session, &server, frame);
    server.fail_descriptions.store(true, Ordering::SeqCst);

    let output = session.tick(&on());

    assert_eq!(session.state(), SessionState::Streaming);
    assert!(!session.assets_changed());
    assert_eq!(session.descriptors().rigid_bodies()[0].name, "Wand");
    assert!(output.log.iter().any(|l| l == "Error: Could not get the Data Descriptions"));
    assert!(server.has_callback());
}

#[test]
fn reset_is_idempotent() {
    let server = FakeServer::with_rigid_bodies(&["Wand"]);
    let mut session = session(&server);
    session.tick(&on());
    deliver_and_wait(&session, &server, tracked_frame(0, 1));

    session.reset();
    let first = (session.state(), session.log(), session.stats(), session.latest());
    let first_epoch = session.descriptors().epoch();

    session.reset();
    let second = (session.state(), session.log(), session.stats(), session.latest());

    assert_eq!(first, second);
    assert_eq!(second.0, SessionState::Idle);
    assert!(second.1.is_empty());
    assert_eq!(second.2, IngestCounts::default());
    assert_eq!(*second.3, OutputRecord::empty());
    assert!(session.descriptors().is_empty());
    assert!(session.descriptors().epoch() > first_epoch);
}

#[test]
fn reset_while_streaming_reconnects_on_the_same_tick() {
    let server = FakeServer::with_rigid_bodies(&["Wand"]);
    let mut session = session(&server);
    session.tick(&on());

    let output = session.tick(&on().with_reset());

    assert_eq!(session.state(), SessionState::Streaming);
    assert_eq!(server.count(Call::Connect), 2);
    assert_eq!(server.count(Call::Disconnect), 1);
    assert_eq!(output.log.first().map(String::as_str), Some("Motion capture client starting."));
}

#[test]
fn nothing_is_published_after_stop() {
    let server = FakeServer::with_rigid_bodies(&["Wand"]);
    let mut session = session(&server);
    session.tick(&on());
    // A sink clone that outlives the unregister keeps the queue open
    let leaked = server.sink().expect("registered");

    session.tick(&off());
    assert_eq!(leaked.deliver(tracked_frame(8, 1)), Delivery::Accepted);
    std::thread::sleep(Duration::from_millis(50));

    assert_eq!(session.latest().frame_index, None);
    assert_eq!(session.log(), [STOPPED_MESSAGE]);
}

#[test]
fn config_changes_apply_on_next_activation() {
    let server = FakeServer::with_rigid_bodies(&["Wand"]);
    let mut session = session(&server);
    session.tick(&TickInput::activate("10.0.0.2", "10.0.0.1"));
    session.tick(&TickInput::activate("10.0.0.2", "10.0.0.9"));
    assert_eq!(server.count(Call::Connect), 1);

    session.tick(&off());
    session.tick(&TickInput::activate("10.0.0.2", "10.0.0.9"));

    let configs = server.configs();
    assert_eq!(configs.len(), 2);
    assert_eq!(configs[1].server_address, "10.0.0.9");
    assert_eq!(configs[1].mode, crate::types::ConnectionMode::Multicast);
}

#[test]
fn host_lists_have_matching_lengths() {
    let server = FakeServer::with_rigid_bodies(&["A", "B", "C"]);
    let mut session = session(&server);
    session.tick(&on());

    let mut frame = tracked_frame(4, 3);
    frame.rigid_bodies[1] = RigidBodySample::untracked(2);
    deliver_and_wait(&session, &server, frame);

    let (log, points, labels, names, positions, quaternions) = session.tick(&on()).into_lists();
    assert_eq!(names, ["A", "C"]);
    assert_eq!(positions.len(), 3 * names.len());
    assert_eq!(quaternions.len(), 4 * names.len());
    assert!(points.is_empty() && labels.is_empty());
    assert!(log.iter().any(|l| l == "B is not tracked in current frame."));
}

#[tokio::test]
async fn subscribers_see_published_frames() {
    let server = FakeServer::with_rigid_bodies(&["Wand"]);
    let mut session = session(&server);
    let mut rx = session.subscribe();
    session.tick(&on());

    server.deliver(tracked_frame(12, 1));

    let record = tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|record| record.frame_index == Some(12)),
    )
    .await
    .expect("frame published in time")
    .expect("session alive")
    .clone();
    assert_eq!(record.rigid_body_names, ["Wand"]);
}

#[tokio::test]
async fn snapshot_stream_starts_with_current_record() {
    let server = FakeServer::with_rigid_bodies(&["Wand"]);
    let mut session = session(&server);
    session.tick(&on());
    let mut snapshots = session.snapshots(UpdateRate::Native);

    let first = snapshots.next().await.expect("current record");
    assert_eq!(first.frame_index, None);

    server.deliver(tracked_frame(4, 1));
    let next = tokio::time::timeout(Duration::from_secs(5), snapshots.next())
        .await
        .expect("published in time")
        .expect("stream open");
    assert_eq!(next.frame_index, Some(4));
    assert_eq!(session.published_hz(), 30.0);
}
