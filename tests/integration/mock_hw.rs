//! Mock adapters for integration tests.
//!
//! Record every call so tests can assert on the full history without a
//! broker, a UART or an LED.

use std::collections::VecDeque;

use streetlight::app::events::AppEvent;
use streetlight::app::ports::{
    BrokerError, BrokerPort, ConnectError, EventSink, InboundMessage, LightPort, SerialError,
    SerialSource,
};

// ── Broker ────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockBroker {
    pub link: bool,
    pub connected: bool,
    /// Results for upcoming connect attempts; empty means success.
    pub script: VecDeque<Result<(), ConnectError>>,
    pub attempts: u32,
    pub subscriptions: Vec<String>,
    pub published: Vec<(String, Vec<u8>)>,
    pub inbound: VecDeque<InboundMessage>,
}

#[allow(dead_code)]
impl MockBroker {
    pub fn online() -> Self {
        Self {
            link: true,
            ..Self::default()
        }
    }

    pub fn failing(err: ConnectError, times: usize) -> Self {
        let mut broker = Self::online();
        broker.script.extend(std::iter::repeat_n(Err(err), times));
        broker
    }

    pub fn deliver(&mut self, topic: &str, payload: &[u8]) {
        let mut msg = InboundMessage {
            topic: heapless::String::new(),
            payload: heapless::Vec::new(),
        };
        msg.topic.push_str(topic).unwrap();
        msg.payload.extend_from_slice(payload).unwrap();
        self.inbound.push_back(msg);
    }
}

impl BrokerPort for MockBroker {
    fn link_up(&self) -> bool {
        self.link
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn connect(&mut self) -> Result<(), ConnectError> {
        self.attempts += 1;
        let result = self.script.pop_front().unwrap_or(Ok(()));
        self.connected = result.is_ok();
        result
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        self.subscriptions.push(topic.to_owned());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        if !self.connected {
            return Err(BrokerError::NotConnected);
        }
        self.published.push((topic.to_owned(), payload.to_vec()));
        Ok(())
    }

    fn take_inbound(&mut self) -> Option<InboundMessage> {
        self.inbound.pop_front()
    }
}

// ── Serial ────────────────────────────────────────────────────

/// Delivers queued chunks one `read_available` call at a time.
#[derive(Default)]
pub struct MockSerial {
    pub chunks: VecDeque<Vec<u8>>,
    pub fail_next: bool,
}

#[allow(dead_code)]
impl MockSerial {
    pub fn push(&mut self, bytes: &[u8]) {
        self.chunks.push_back(bytes.to_vec());
    }
}

impl SerialSource for MockSerial {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        if std::mem::take(&mut self.fail_next) {
            return Err(SerialError::Io(-1));
        }
        let Some(mut chunk) = self.chunks.pop_front() else {
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            chunk.drain(..n);
            self.chunks.push_front(chunk);
        }
        Ok(n)
    }
}

// ── Lamp + events ─────────────────────────────────────────────

#[derive(Default)]
pub struct MockLamp {
    pub levels: Vec<u8>,
}

#[allow(dead_code)]
impl MockLamp {
    pub fn last(&self) -> u8 {
        self.levels.last().copied().unwrap_or(0)
    }
}

impl LightPort for MockLamp {
    fn set_level(&mut self, level: u8) {
        self.levels.push(level);
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
