//! End-to-end sessions over a recorded capture
//!
//! Drives the public tick facade against [`ReplayTransport`], with frames
//! delivered from the playback thread as a live server would.

use std::thread;
use std::time::{Duration, Instant};

use mocap_tracker::{
    FrameSample, OutputRecord, Recording, ReplayTransport, RigidBodySample, STOPPED_MESSAGE,
    Session, SessionOptions, SessionState, TickInput, TickOutput,
};

const HEADER: &str = r#"
server:
  host: capture-01
  application: Motive
  frame_rate: 1000
server_address: 10.0.0.1
descriptors:
  - { type_tag: 1, id: 1, name: Wand }
  - { type_tag: 0, id: 0, name: all }
"#;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Frames 0..=8, the wand drifting along x and turned 90 degrees about x
fn recording() -> Recording {
    let mut recording = Recording::from_yaml(HEADER).expect("valid recording header");
    let half = std::f64::consts::FRAC_1_SQRT_2;
    recording.frames = (0..=8u64)
        .map(|index| {
            let mut frame = FrameSample::new(index);
            frame.rigid_bodies.push(RigidBodySample::tracked(
                1,
                [0.123456789 + index as f64, -2.000049, 1.5],
                [half, 0.0, 0.0, half],
            ));
            frame
        })
        .collect();
    recording
}

fn input() -> TickInput {
    TickInput::activate("10.0.0.2", "10.0.0.1")
}

/// Tick until `done` holds for the output, or give up after five seconds
fn tick_until(
    session: &mut Session<ReplayTransport>,
    input: &TickInput,
    mut done: impl FnMut(&OutputRecord) -> bool,
) -> TickOutput {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let output = session.tick(input);
        if done(&output.record) || Instant::now() >= deadline {
            return output;
        }
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn replayed_capture_produces_rounded_snapshots() {
    init_tracing();
    let mut session = Session::with_defaults(ReplayTransport::new(recording()));

    let output = session.tick(&input());
    assert_eq!(session.state(), SessionState::Streaming);
    assert!(output.log.iter().any(|l| l == "Host: capture-01"));
    assert!(output.log.iter().any(|l| l == "Application Name: Motive"));
    assert!(output.log.iter().any(|l| l == "MarkerSet (all)"));
    assert_eq!(session.published_hz(), 250.0);

    let output = tick_until(&mut session, &input(), |r| r.frame_index == Some(8));
    let record = &output.record;
    assert_eq!(record.frame_index, Some(8));
    assert_eq!(record.rigid_body_names, ["Wand"]);
    assert_eq!(record.rigid_body_positions, [8.1235, -2.0, 1.5]);
    assert_eq!(record.rigid_body_quaternions, [0.707107, 0.707107, 0.0, 0.0]);
    assert!(record.is_consistent());
    assert!(!session.assets_changed());

    let output = session.tick(&TickInput::default());
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(output.log, [STOPPED_MESSAGE]);
    assert_eq!(output.record.frame_index, None);
}

#[test]
fn unknown_server_address_fails_to_connect() {
    init_tracing();
    let mut session = Session::with_defaults(ReplayTransport::new(recording()));

    let output = session.tick(&TickInput::activate("10.0.0.2", "10.0.0.77"));

    assert_eq!(session.state(), SessionState::Idle);
    assert!(output.log.iter().any(|l| l == "Server IP set: 10.0.0.77"));
    assert!(
        output.log.iter().any(|l| l == "Error: Failed to connect. Check the connection settings.")
    );
    assert!(session.descriptors().is_empty());
}

#[test]
fn configured_decimation_and_precision_apply() {
    init_tracing();
    let options = SessionOptions::from_yaml("decimation: 2\nposition_decimals: 1\n")
        .expect("valid options");
    let mut session =
        Session::new(ReplayTransport::new(recording()), options).expect("valid session");
    let mut rx = session.subscribe();

    let mut seen = Vec::new();
    let output = tick_until(&mut session, &input(), |record| {
        if rx.has_changed().unwrap_or(false) {
            seen.extend(rx.borrow_and_update().frame_index);
        }
        record.frame_index == Some(8)
    });

    assert_eq!(output.record.rigid_body_positions, [8.1, -2.0, 1.5]);
    assert!(!seen.is_empty());
    assert!(seen.iter().all(|index| index % 2 == 0), "unexpected frames {seen:?}");
    assert_eq!(session.published_hz(), 500.0);
}

#[test]
fn reset_returns_to_an_empty_idle_session() {
    init_tracing();
    let mut session = Session::with_defaults(ReplayTransport::new(recording()));
    tick_until(&mut session, &input(), |r| r.frame_index.is_some());

    let output = session.tick(&TickInput::default().with_reset());

    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(output.log, [STOPPED_MESSAGE]);
    assert_eq!(*output.record, OutputRecord::empty());
    assert!(session.descriptors().is_empty());
}

#[test]
fn unplayable_frame_rate_is_logged_not_raised() {
    init_tracing();
    let mut recording = recording();
    recording.server.frame_rate = 1e-300;
    let mut session = Session::with_defaults(ReplayTransport::new(recording));

    let output = session.tick(&input());

    assert_eq!(session.state(), SessionState::Idle);
    assert!(
        output.log.iter().any(|l| l == "Error: Failed to connect. Check the connection settings.")
    );
}

#[test]
fn stopping_a_slow_replay_returns_promptly() {
    init_tracing();
    let mut recording = recording();
    recording.server.frame_rate = 0.2;
    let mut session = Session::with_defaults(ReplayTransport::new(recording));
    tick_until(&mut session, &input(), |r| r.frame_index == Some(0));

    let started = Instant::now();
    let output = session.tick(&TickInput::default());

    assert!(started.elapsed() < Duration::from_secs(1), "stop took {:?}", started.elapsed());
    assert_eq!(output.log, [STOPPED_MESSAGE]);
}
