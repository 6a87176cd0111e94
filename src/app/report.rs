//! Reporting cycle shared by the data and heartbeat tasks.
//!
//! Each cycle makes at most one session attempt, forwards any control
//! messages the broker delivered, then publishes its body if the session is
//! up. Nothing is queued while offline.

use log::{debug, warn};

use crate::app::commands::CommandError;
use crate::app::events::{AppEvent, Heartbeat, Topics};
use crate::app::ports::{BrokerPort, EventSink};
use crate::app::service::NodeState;
use crate::session::SessionManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Data,
    Heartbeat,
}

#[derive(Debug, Clone)]
pub struct Reporter {
    topics: Topics,
    device_id: heapless::String<24>,
}

impl Reporter {
    /// `None` if the device id does not fit the topic or id buffers.
    pub fn new(device_id: &str) -> Option<Self> {
        let mut id = heapless::String::new();
        id.push_str(device_id).ok()?;
        Some(Self {
            topics: Topics::for_device(device_id)?,
            device_id: id,
        })
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Run one report cycle. Returns whether the body was published.
    pub fn run_cycle<B: BrokerPort>(
        &self,
        kind: ReportKind,
        session: &mut SessionManager<B>,
        state: &NodeState,
        now_ms: u32,
        sink: &mut impl EventSink,
    ) -> bool {
        let outcome = session.attempt_connect(now_ms);
        if outcome.attempted() {
            sink.emit(&AppEvent::Session(outcome));
        }

        self.forward_control(session, state, sink);

        let (topic, body) = match kind {
            ReportKind::Data => (&self.topics.data, state.telemetry().to_json()),
            ReportKind::Heartbeat => (
                &self.topics.heartbeat,
                Heartbeat::online(&self.device_id).to_json(),
            ),
        };
        let delivered = match body {
            Ok(body) => session.publish_if_connected(topic, &body),
            Err(e) => {
                warn!("{kind:?} body encoding failed: {e}");
                false
            }
        };
        sink.emit(&AppEvent::Reported {
            heartbeat: kind == ReportKind::Heartbeat,
            delivered,
        });
        delivered
    }

    /// Queue every pending control message for the light task.
    pub fn forward_control<B: BrokerPort>(
        &self,
        session: &mut SessionManager<B>,
        state: &NodeState,
        sink: &mut impl EventSink,
    ) {
        while let Some(msg) = session.poll_inbound() {
            if msg.topic != self.topics.control {
                debug!("ignoring message on {}", msg.topic);
                continue;
            }
            match state.submit_control(&msg.payload) {
                Ok(cmd) => debug!("control command queued: {cmd:?}"),
                Err(e) => sink.emit(&AppEvent::CommandRejected(match e {
                    CommandError::Malformed => "malformed",
                    CommandError::OutOfRange => "brightness out of range",
                })),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mqtt::MqttAdapter;
    use crate::app::commands::AppCommand;
    use crate::config::SessionConfig;
    use core::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[derive(Default)]
    struct Events(Vec<AppEvent>);

    impl EventSink for Events {
        fn emit(&mut self, event: &AppEvent) {
            self.0.push(event.clone());
        }
    }

    fn session() -> SessionManager<MqttAdapter> {
        let broker = MqttAdapter::new(Arc::new(AtomicBool::new(true)));
        SessionManager::new(broker, SessionConfig::default(), "device/LIGHT_4/control")
    }

    #[test]
    fn heartbeat_is_published_after_connect() {
        let reporter = Reporter::new("LIGHT_4").unwrap();
        let mut session = session();
        let state = NodeState::new();
        let mut ev = Events::default();

        assert!(reporter.run_cycle(ReportKind::Heartbeat, &mut session, &state, 0, &mut ev));
        let published = session.broker().sim_published();
        assert_eq!(published[0].0, "device/LIGHT_4/heartbeat");
        assert_eq!(published[0].1, br#"{"device_id":"LIGHT_4","status":"online"}"#);
    }

    #[test]
    fn offline_cycle_is_dropped() {
        let reporter = Reporter::new("LIGHT_4").unwrap();
        let mut session = session();
        session
            .broker_mut()
            .sim_script([Err(crate::app::ports::ConnectError::Timeout)]);
        let state = NodeState::new();
        let mut ev = Events::default();

        assert!(!reporter.run_cycle(ReportKind::Data, &mut session, &state, 0, &mut ev));
        assert!(session.broker().sim_published().is_empty());
        assert!(matches!(
            ev.0.last(),
            Some(AppEvent::Reported {
                heartbeat: false,
                delivered: false
            })
        ));
    }

    #[test]
    fn control_messages_reach_the_queue() {
        let reporter = Reporter::new("LIGHT_4").unwrap();
        let mut session = session();
        let state = NodeState::new();
        let mut ev = Events::default();
        reporter.run_cycle(ReportKind::Heartbeat, &mut session, &state, 0, &mut ev);

        let broker = session.broker_mut();
        broker.sim_deliver("device/LIGHT_4/control", br#"{"command":"set_brightness","brightness":50}"#);
        broker.sim_deliver("device/LIGHT_4/control", b"not json");
        reporter.forward_control(&mut session, &state, &mut ev);

        assert_eq!(
            state.next_command(),
            Some(AppCommand::SetBrightness {
                level: 127,
                percent: 50
            })
        );
        assert!(matches!(ev.0.last(), Some(AppEvent::CommandRejected("malformed"))));
    }
}
