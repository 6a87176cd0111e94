//! Session manager and report cycle against a mock broker.

use streetlight::app::commands::AppCommand;
use streetlight::app::events::AppEvent;
use streetlight::app::ports::ConnectError;
use streetlight::app::report::{ReportKind, Reporter};
use streetlight::app::service::NodeState;
use streetlight::config::SessionConfig;
use streetlight::session::{AttemptOutcome, SessionManager};

use crate::mock_hw::{MockBroker, RecordingSink};

const CONTROL: &str = "device/LIGHT_4/control";

fn manager(broker: MockBroker) -> SessionManager<MockBroker> {
    SessionManager::new(broker, SessionConfig::default(), CONTROL)
}

#[test]
fn attempts_closer_than_rate_limit_collapse_to_one() {
    let mut s = manager(MockBroker::failing(ConnectError::Transport, 5));
    assert!(s.attempt_connect(1_000).attempted());
    assert_eq!(s.attempt_connect(5_999), AttemptOutcome::RateLimited);
    assert_eq!(s.broker().attempts, 1);
    assert!(s.attempt_connect(6_000).attempted());
    assert_eq!(s.broker().attempts, 2);
}

#[test]
fn three_transport_failures_pause_for_cooldown() {
    let mut s = manager(MockBroker::failing(ConnectError::Transport, 3));
    for t in [0, 5_000, 10_000] {
        assert_eq!(
            s.attempt_connect(t),
            AttemptOutcome::Failed(ConnectError::Transport)
        );
    }
    assert!(s.status().paused);
    assert_eq!(s.status().retry_count, 3);

    // Both report tasks keep calling during the cooldown.
    for t in (15_000..=70_000).step_by(5_000) {
        assert_eq!(s.attempt_connect(t), AttemptOutcome::Paused, "t={t}");
    }
    assert_eq!(s.broker().attempts, 3);

    assert_eq!(s.attempt_connect(70_001), AttemptOutcome::CooldownElapsed);
    assert_eq!(s.status().retry_count, 0);
    assert_eq!(s.attempt_connect(75_001), AttemptOutcome::Connected);
    assert_eq!(s.broker().attempts, 4);
}

#[test]
fn first_auth_failure_pauses_immediately() {
    let mut s = manager(MockBroker::failing(ConnectError::BadCredentials, 1));
    assert_eq!(
        s.attempt_connect(0),
        AttemptOutcome::Failed(ConnectError::BadCredentials)
    );
    assert!(s.status().paused);
    assert_eq!(s.attempt_connect(5_000), AttemptOutcome::Paused);
    assert_eq!(s.broker().attempts, 1);
}

#[test]
fn connect_subscribes_to_control_and_resets_counter() {
    let mut broker = MockBroker::failing(ConnectError::Timeout, 2);
    broker.script.push_back(Ok(()));
    let mut s = manager(broker);
    s.attempt_connect(0);
    s.attempt_connect(5_000);
    assert_eq!(s.status().retry_count, 2);
    assert_eq!(s.attempt_connect(10_000), AttemptOutcome::Connected);
    assert_eq!(s.status().retry_count, 0);
    assert_eq!(s.broker().subscriptions, [CONTROL]);
    assert_eq!(s.attempt_connect(10_001), AttemptOutcome::AlreadyConnected);
}

#[test]
fn link_down_costs_no_retry_budget() {
    let mut broker = MockBroker::online();
    broker.link = false;
    let mut s = manager(broker);
    for t in (0..60_000).step_by(5_000) {
        assert_eq!(s.attempt_connect(t), AttemptOutcome::LinkDown);
    }
    assert_eq!(s.status().retry_count, 0);
    assert_eq!(s.broker().attempts, 0);
}

#[test]
fn publish_is_dropped_while_offline() {
    let mut s = manager(MockBroker::online());
    assert!(!s.publish_if_connected("device/LIGHT_4/data", b"{}"));
    s.attempt_connect(0);
    assert!(s.publish_if_connected("device/LIGHT_4/data", b"{}"));
    s.broker_mut().connected = false;
    assert!(!s.publish_if_connected("device/LIGHT_4/data", b"{}"));
    assert_eq!(s.broker().published.len(), 1);
}

#[test]
fn data_and_heartbeat_share_one_budget() {
    let reporter = Reporter::new("LIGHT_4").unwrap();
    let state = NodeState::new();
    let mut sink = RecordingSink::default();
    let mut s = manager(MockBroker::failing(ConnectError::Transport, 10));

    // Heartbeat every 5 s, data every 10 s, for one minute.
    for t in (0..60_000u32).step_by(5_000) {
        reporter.run_cycle(ReportKind::Heartbeat, &mut s, &state, t, &mut sink);
        if t % 10_000 == 0 {
            reporter.run_cycle(ReportKind::Data, &mut s, &state, t + 1, &mut sink);
        }
    }
    assert_eq!(s.broker().attempts, 3);
    assert!(s.broker().published.is_empty());
    let attempts = sink
        .events
        .iter()
        .filter(|e| matches!(e, AppEvent::Session(o) if o.attempted()))
        .count();
    assert_eq!(attempts, 3);
}

#[test]
fn report_cycle_publishes_telemetry_and_forwards_control() {
    let reporter = Reporter::new("LIGHT_4").unwrap();
    let state = NodeState::new();
    state.set_ambient_lux(320.0);
    let mut sink = RecordingSink::default();
    let mut s = manager(MockBroker::online());

    s.broker_mut()
        .deliver(CONTROL, br#"{"command":"set_auto_mode","auto_mode":false}"#);
    s.broker_mut()
        .deliver(CONTROL, br#"{"command":"set_brightness","brightness":101}"#);
    assert!(reporter.run_cycle(ReportKind::Data, &mut s, &state, 0, &mut sink));

    let (topic, body) = &s.broker().published[0];
    assert_eq!(topic, "device/LIGHT_4/data");
    let json: serde_json::Value = serde_json::from_slice(body).unwrap();
    assert_eq!(json["ambient_light"], 320.0);
    assert_eq!(json["auto_mode"], true);

    assert_eq!(state.next_command(), Some(AppCommand::SetAutoMode(false)));
    assert_eq!(state.next_command(), None);
    assert!(
        sink.events
            .iter()
            .any(|e| matches!(e, AppEvent::CommandRejected("brightness out of range")))
    );
}
