//! Outbound events and the JSON bodies published to the broker.
//!
//! [`AppEvent`]s go to the [`EventSink`](super::ports::EventSink) port.
//! [`TelemetryReport`] and [`Heartbeat`] are the exact wire bodies of the
//! data and heartbeat topics; downstream dashboards depend on the key names.

use core::fmt::Write;

use serde::Serialize;

use crate::session::AttemptOutcome;

/// Structured events emitted by the node.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Boot finished; carries the client id used for the broker.
    Started { client_id: heapless::String<48> },

    /// Periodic 1 Hz status snapshot.
    Status(TelemetryReport),

    /// Operating mode or manual level changed by a control command.
    ModeChanged { auto_mode: bool, level: u8 },

    /// A control payload was dropped.
    CommandRejected(&'static str),

    /// A session attempt was made or the session state changed.
    Session(AttemptOutcome),

    /// A report was published (`true`) or skipped while offline.
    Reported { heartbeat: bool, delivered: bool },
}

/// Body of `device/{id}/data`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetryReport {
    /// Lux.
    pub ambient_light: f32,
    /// Output level as 0..=100 percent.
    pub light_brightness: u8,
    /// °C.
    pub temperature: f32,
    /// %RH.
    pub humidity: f32,
    /// µg/m³.
    pub pm25: u16,
    pub battery_level: u8,
    /// Volts.
    pub solar_voltage: f32,
    pub auto_mode: bool,
}

impl TelemetryReport {
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Body of `device/{id}/heartbeat`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heartbeat<'a> {
    pub device_id: &'a str,
    pub status: &'static str,
}

impl<'a> Heartbeat<'a> {
    pub fn online(device_id: &'a str) -> Self {
        Self {
            device_id,
            status: "online",
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

pub type Topic = heapless::String<64>;

/// The three per-device topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub data: Topic,
    pub heartbeat: Topic,
    pub control: Topic,
}

impl Topics {
    /// `None` if the device id makes a topic exceed 64 bytes.
    pub fn for_device(device_id: &str) -> Option<Self> {
        Some(Self {
            data: topic(device_id, "data")?,
            heartbeat: topic(device_id, "heartbeat")?,
            control: topic(device_id, "control")?,
        })
    }
}

fn topic(device_id: &str, leaf: &str) -> Option<Topic> {
    let mut t = Topic::new();
    write!(t, "device/{device_id}/{leaf}").ok()?;
    Some(t)
}
