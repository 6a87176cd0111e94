//! Broker session manager: rate-limited reconnects with failure-class backoff.
//!
//! ```text
//!           ┌────────── success ──────────┐
//!           ▼                             │
//!      Connected ──drop──▶ Retrying ──attempt (≥5 s apart)
//!                              │   ▲
//!        3 failures / auth ────┘   └── 60 s after pause: counter reset
//!                              ▼
//!                           Paused
//! ```
//!
//! Both reporting tasks call [`SessionManager::attempt_connect`] every cycle,
//! so the limits here are global across them. The manager never blocks
//! beyond the broker's own connect timeout and never queues payloads.

use log::{debug, info, warn};

use crate::app::ports::{BrokerPort, ConnectError, InboundMessage};
use crate::config::SessionConfig;

/// Signed wrapping distance from `then` to `now`. Negative when `now` was
/// sampled before `then`, as happens when a caller waited on the session
/// lock while another task attempted.
fn elapsed_ms(now: u32, then: u32) -> i64 {
    i64::from(now.wrapping_sub(then) as i32)
}

/// What a call to [`SessionManager::attempt_connect`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Session already up; nothing to do.
    AlreadyConnected,
    /// Network link is down; no attempt made.
    LinkDown,
    /// Last attempt was too recent.
    RateLimited,
    /// Retry budget exhausted and the cooldown is still running.
    Paused,
    /// Cooldown just elapsed; the counter was reset and the next call may attempt.
    CooldownElapsed,
    /// Attempt succeeded and the control topic subscription was issued.
    Connected,
    /// Attempt failed.
    Failed(ConnectError),
}

impl AttemptOutcome {
    /// Whether this call actually reached out to the broker.
    pub const fn attempted(self) -> bool {
        matches!(self, Self::Connected | Self::Failed(_))
    }
}

/// Externally visible session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub connected: bool,
    pub retry_count: u8,
    pub paused: bool,
}

pub struct SessionManager<B: BrokerPort> {
    broker: B,
    cfg: SessionConfig,
    control_topic: heapless::String<64>,
    retry_count: u8,
    /// `None` until the first attempt, so boot is not rate limited.
    last_attempt_ms: Option<u32>,
    /// Start of the current cooldown; set when the budget is exhausted.
    pause_anchor_ms: Option<u32>,
    connected: bool,
}

impl<B: BrokerPort> SessionManager<B> {
    pub fn new(broker: B, cfg: SessionConfig, control_topic: &str) -> Self {
        let mut topic = heapless::String::new();
        if topic.push_str(control_topic).is_err() {
            warn!("control topic longer than 64 bytes, subscription disabled");
        }
        Self {
            broker,
            cfg,
            control_topic: topic,
            retry_count: 0,
            last_attempt_ms: None,
            pause_anchor_ms: None,
            connected: false,
        }
    }

    /// Make at most one connection attempt, subject to rate limit and pause.
    /// Idempotent; call every reporting cycle.
    pub fn attempt_connect(&mut self, now_ms: u32) -> AttemptOutcome {
        let was_connected = self.connected;
        self.connected = self.broker.is_connected();
        if self.connected {
            return AttemptOutcome::AlreadyConnected;
        }
        if was_connected {
            warn!("MQTT session lost");
        }

        if !self.broker.link_up() {
            return AttemptOutcome::LinkDown;
        }

        if let Some(last) = self.last_attempt_ms {
            if elapsed_ms(now_ms, last) < i64::from(self.cfg.rate_limit_ms) {
                return AttemptOutcome::RateLimited;
            }
        }

        if self.retry_count >= self.cfg.max_retries {
            let elapsed = self
                .pause_anchor_ms
                .map_or(i64::MAX, |anchor| elapsed_ms(now_ms, anchor));
            if elapsed > i64::from(self.cfg.cooldown_ms) {
                info!("MQTT retry pause over, resetting counter");
                self.retry_count = 0;
                self.pause_anchor_ms = Some(now_ms);
                return AttemptOutcome::CooldownElapsed;
            }
            debug!("MQTT retries paused ({elapsed} ms into cooldown)");
            return AttemptOutcome::Paused;
        }

        self.last_attempt_ms = Some(now_ms);
        self.retry_count += 1;
        info!(
            "MQTT connect attempt {}/{}",
            self.retry_count, self.cfg.max_retries
        );

        match self.broker.connect() {
            Ok(()) => {
                self.on_connected();
                AttemptOutcome::Connected
            }
            Err(e) => {
                warn!("MQTT connect failed: {e} (code {})", e.code());
                if e.is_auth_failure() {
                    warn!("MQTT auth error, not retrying until cooldown ends");
                    self.retry_count = self.cfg.max_retries;
                }
                if self.retry_count >= self.cfg.max_retries {
                    warn!(
                        "MQTT retry limit reached, paused for {} s",
                        self.cfg.cooldown_ms / 1000
                    );
                    self.pause_anchor_ms = Some(now_ms);
                }
                AttemptOutcome::Failed(e)
            }
        }
    }

    fn on_connected(&mut self) {
        info!("MQTT connected");
        self.retry_count = 0;
        self.pause_anchor_ms = None;
        self.connected = true;
        if self.control_topic.is_empty() {
            return;
        }
        match self.broker.subscribe(&self.control_topic) {
            Ok(()) => info!("subscribed to {}", self.control_topic),
            Err(e) => warn!("subscribe to {} failed: {e}", self.control_topic),
        }
    }

    /// Publish only when the session is up. Never blocks, never queues.
    pub fn publish_if_connected(&mut self, topic: &str, payload: &[u8]) -> bool {
        if !self.broker.is_connected() {
            self.connected = false;
            return false;
        }
        match self.broker.publish(topic, payload) {
            Ok(()) => true,
            Err(e) => {
                warn!("publish to {topic} failed: {e}");
                false
            }
        }
    }

    /// Next inbound control message, if the broker delivered one.
    pub fn poll_inbound(&mut self) -> Option<InboundMessage> {
        self.broker.take_inbound()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            connected: self.connected,
            retry_count: self.retry_count,
            paused: self.retry_count >= self.cfg.max_retries,
        }
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn broker_mut(&mut self) -> &mut B {
        &mut self.broker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::BrokerError;

    #[derive(Default)]
    struct ScriptBroker {
        link: bool,
        connected: bool,
        results: Vec<Result<(), ConnectError>>,
        attempts: usize,
        subscriptions: Vec<String>,
        published: Vec<(String, Vec<u8>)>,
    }

    impl ScriptBroker {
        fn with(results: Vec<Result<(), ConnectError>>) -> Self {
            Self {
                link: true,
                results,
                ..Self::default()
            }
        }
    }

    impl BrokerPort for ScriptBroker {
        fn link_up(&self) -> bool {
            self.link
        }
        fn is_connected(&self) -> bool {
            self.connected
        }
        fn connect(&mut self) -> Result<(), ConnectError> {
            self.attempts += 1;
            let r = if self.results.is_empty() {
                Err(ConnectError::Transport)
            } else {
                self.results.remove(0)
            };
            self.connected = r.is_ok();
            r
        }
        fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
            self.subscriptions.push(topic.to_owned());
            Ok(())
        }
        fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
            self.published.push((topic.to_owned(), payload.to_vec()));
            Ok(())
        }
        fn take_inbound(&mut self) -> Option<InboundMessage> {
            None
        }
    }

    fn manager(results: Vec<Result<(), ConnectError>>) -> SessionManager<ScriptBroker> {
        SessionManager::new(
            ScriptBroker::with(results),
            SessionConfig::default(),
            "device/LIGHT_4/control",
        )
    }

    #[test]
    fn first_attempt_is_not_rate_limited() {
        let mut s = manager(vec![Ok(())]);
        assert_eq!(s.attempt_connect(0), AttemptOutcome::Connected);
        assert!(s.is_connected());
        assert_eq!(s.broker().subscriptions, vec!["device/LIGHT_4/control"]);
    }

    #[test]
    fn attempts_closer_than_rate_limit_collapse() {
        let mut s = manager(vec![]);
        assert!(s.attempt_connect(1_000).attempted());
        assert_eq!(s.attempt_connect(5_999), AttemptOutcome::RateLimited);
        assert_eq!(s.broker().attempts, 1);
        assert!(s.attempt_connect(6_000).attempted());
        assert_eq!(s.broker().attempts, 2);
    }

    #[test]
    fn three_failures_pause_then_reset() {
        let mut s = manager(vec![]);
        for t in [0, 5_000, 10_000] {
            assert!(matches!(s.attempt_connect(t), AttemptOutcome::Failed(_)));
        }
        assert!(s.status().paused);
        assert_eq!(s.status().retry_count, 3);

        for t in (15_000..=70_000).step_by(5_000) {
            assert_eq!(s.attempt_connect(t), AttemptOutcome::Paused, "t={t}");
        }
        assert_eq!(s.broker().attempts, 3);

        assert_eq!(s.attempt_connect(70_001), AttemptOutcome::CooldownElapsed);
        assert_eq!(s.status().retry_count, 0);
        assert!(s.attempt_connect(75_000).attempted());
        assert_eq!(s.broker().attempts, 4);
    }

    #[test]
    fn late_caller_with_older_clock_is_rate_limited() {
        let mut s = manager(vec![]);
        assert!(s.attempt_connect(10_000).attempted());
        assert_eq!(s.attempt_connect(9_999), AttemptOutcome::RateLimited);
        assert_eq!(s.broker().attempts, 1);
    }

    #[test]
    fn older_clock_does_not_end_pause() {
        let mut s = manager(vec![]);
        for t in [0, 5_000, 10_000] {
            s.attempt_connect(t);
        }
        assert!(s.status().paused);
        assert_eq!(s.attempt_connect(9_999), AttemptOutcome::RateLimited);
        assert_eq!(s.attempt_connect(15_000), AttemptOutcome::Paused);
        assert_eq!(s.status().retry_count, 3);
        assert_eq!(s.attempt_connect(70_000), AttemptOutcome::Paused);
        assert_eq!(s.attempt_connect(70_001), AttemptOutcome::CooldownElapsed);
        assert_eq!(s.broker().attempts, 3);
    }

    #[test]
    fn pause_survives_timer_wrap() {
        let mut s = manager(vec![Err(ConnectError::BadCredentials)]);
        let t0 = u32::MAX - 10_000;
        assert!(s.attempt_connect(t0).attempted());
        assert_eq!(s.attempt_connect(t0.wrapping_add(60_000)), AttemptOutcome::Paused);
        assert_eq!(
            s.attempt_connect(t0.wrapping_add(60_001)),
            AttemptOutcome::CooldownElapsed
        );
    }

    #[test]
    fn auth_failure_pauses_immediately() {
        let mut s = manager(vec![Err(ConnectError::BadCredentials)]);
        assert_eq!(
            s.attempt_connect(0),
            AttemptOutcome::Failed(ConnectError::BadCredentials)
        );
        assert!(s.status().paused);
        assert_eq!(s.attempt_connect(5_000), AttemptOutcome::Paused);
        assert_eq!(s.attempt_connect(60_000), AttemptOutcome::Paused);
        assert_eq!(s.attempt_connect(60_001), AttemptOutcome::CooldownElapsed);
        assert_eq!(s.broker().attempts, 1);
    }

    #[test]
    fn success_resets_counter() {
        let mut s = manager(vec![Err(ConnectError::Timeout), Ok(())]);
        s.attempt_connect(0);
        assert_eq!(s.status().retry_count, 1);
        assert_eq!(s.attempt_connect(5_000), AttemptOutcome::Connected);
        assert_eq!(s.status().retry_count, 0);
        assert_eq!(s.attempt_connect(5_001), AttemptOutcome::AlreadyConnected);
    }

    #[test]
    fn link_down_skips_without_consuming_budget() {
        let mut s = manager(vec![Ok(())]);
        s.broker_mut().link = false;
        assert_eq!(s.attempt_connect(0), AttemptOutcome::LinkDown);
        assert_eq!(s.status().retry_count, 0);
        s.broker_mut().link = true;
        assert_eq!(s.attempt_connect(100), AttemptOutcome::Connected);
    }

    #[test]
    fn publish_only_when_connected() {
        let mut s = manager(vec![Ok(())]);
        assert!(!s.publish_if_connected("device/LIGHT_4/data", b"{}"));
        s.attempt_connect(0);
        assert!(s.publish_if_connected("device/LIGHT_4/data", b"{}"));
        assert_eq!(s.broker().published.len(), 1);
    }

    #[test]
    fn dropped_session_is_noticed_on_next_attempt() {
        let mut s = manager(vec![Ok(()), Ok(())]);
        s.attempt_connect(0);
        s.broker_mut().connected = false;
        assert_eq!(s.attempt_connect(10_000), AttemptOutcome::Connected);
        assert_eq!(s.broker().subscriptions.len(), 2);
    }
}
