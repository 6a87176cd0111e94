//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing application events to the ESP-IDF
//! logger (UART / USB-CDC in production, stderr on the host).

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::session::AttemptOutcome;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Status(t) => {
                info!(
                    "STATUS | lux={:.1} | light={}% ({}) | T={:.1}\u{00b0}C RH={:.1}% | \
                     PM2.5={} | bat={}% solar={:.2}V",
                    t.ambient_light,
                    t.light_brightness,
                    if t.auto_mode { "auto" } else { "manual" },
                    t.temperature,
                    t.humidity,
                    t.pm25,
                    t.battery_level,
                    t.solar_voltage,
                );
            }
            AppEvent::ModeChanged { auto_mode, level } => {
                info!(
                    "MODE | {} level={}",
                    if *auto_mode { "auto" } else { "manual" },
                    level
                );
            }
            AppEvent::CommandRejected(reason) => {
                warn!("CMD | rejected: {reason}");
            }
            AppEvent::Session(outcome) => match outcome {
                AttemptOutcome::Failed(e) => warn!("MQTT | attempt failed: {e}"),
                AttemptOutcome::Connected => info!("MQTT | session up"),
                AttemptOutcome::CooldownElapsed => info!("MQTT | cooldown over"),
                other => debug!("MQTT | {other:?}"),
            },
            AppEvent::Reported { heartbeat, delivered } => {
                let kind = if *heartbeat { "heartbeat" } else { "data" };
                if *delivered {
                    debug!("REPORT | {kind} published");
                } else {
                    debug!("REPORT | {kind} skipped, offline");
                }
            }
            AppEvent::Started { client_id } => {
                info!("START | client_id={client_id}");
            }
        }
    }
}
