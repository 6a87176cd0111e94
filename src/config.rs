//! Node configuration parameters
//!
//! All tunable parameters for the street-light node. Defaults match the
//! deployed light curve and telemetry schema; values can be overridden by
//! the config blob persisted in NVS.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::pins::Board;

/// Brightness engine parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightingConfig {
    // --- Ambient thresholds (inclusive lower bounds, lux) ---
    /// At or above this the light is off.
    pub lux_off_threshold: f32,
    pub lux_dim_threshold: f32,
    pub lux_mid_threshold: f32,

    // --- Base levels (0-255) ---
    pub level_dim: u8,
    pub level_mid: u8,
    pub level_dark: u8,
    /// Level forced while motion is latched and the light is not off.
    pub level_motion: u8,

    // --- Animation ---
    /// Motion latch lifetime after the last trigger (milliseconds)
    pub motion_timeout_ms: u32,
    /// Steps in a rising ramp (2 s at 50 ms/tick)
    pub rise_steps: u16,
    /// Steps in a falling ramp (3 s at 50 ms/tick)
    pub fall_steps: u16,
    /// Engine tick period (milliseconds)
    pub tick_period_ms: u32,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            lux_off_threshold: 500.0,
            lux_dim_threshold: 300.0,
            lux_mid_threshold: 100.0,

            level_dim: 50,
            level_mid: 80,
            level_dark: 110,
            level_motion: 255,

            motion_timeout_ms: 5_000,
            rise_steps: 40,
            fall_steps: 60,
            tick_period_ms: 50,
        }
    }
}

/// Broker session retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Consecutive failed attempts before the long pause.
    pub max_retries: u8,
    /// Pause after the retry budget is exhausted (milliseconds)
    pub cooldown_ms: u32,
    /// Minimum spacing between two real attempts (milliseconds)
    pub rate_limit_ms: u32,
    /// Broker connect timeout handed to the client (milliseconds)
    pub connect_timeout_ms: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            cooldown_ms: 60_000,
            rate_limit_ms: 5_000,
            connect_timeout_ms: 5_000,
        }
    }
}

/// Wi-Fi and broker endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub wifi_ssid: heapless::String<32>,
    pub wifi_password: heapless::String<64>,
    /// Delay before re-joining after the station drops (milliseconds)
    pub wifi_reconnect_delay_ms: u32,

    /// e.g. `mqtt://192.168.1.111:1883`
    pub broker_url: heapless::String<96>,
    pub broker_username: heapless::String<32>,
    pub broker_password: heapless::String<64>,
    /// Client id prefix; the MAC suffix is appended at boot.
    pub client_id_base: heapless::String<24>,
    /// Identifier used in topic names and the heartbeat body.
    pub device_id: heapless::String<24>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: fixed("streetlight"),
            wifi_password: fixed(""),
            wifi_reconnect_delay_ms: 10_000,

            broker_url: fixed("mqtt://192.168.1.111:1883"),
            broker_username: fixed(""),
            broker_password: fixed(""),
            client_id_base: fixed("esp32_client"),
            device_id: fixed("LIGHT_4"),
        }
    }
}

/// Periodic task cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub sensor_interval_ms: u32,
    pub pm25_drain_interval_ms: u32,
    pub data_report_interval_ms: u32,
    pub heartbeat_interval_ms: u32,
    pub status_log_interval_ms: u32,
    /// Task watchdog timeout; every task feeds it once per period.
    pub watchdog_timeout_ms: u32,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            sensor_interval_ms: 100,       // 10 Hz
            pm25_drain_interval_ms: 100,   // 10 Hz
            data_report_interval_ms: 10_000,
            heartbeat_interval_ms: 5_000,
            status_log_interval_ms: 1_000, // 1 Hz
            watchdog_timeout_ms: 20_000,
        }
    }
}

/// Complete node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NodeConfig {
    pub board: Board,
    pub lighting: LightingConfig,
    pub session: SessionConfig,
    pub network: NetworkConfig,
    pub tasks: TaskConfig,
}

impl NodeConfig {
    /// Range-check every field. Invalid values are rejected, not clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let l = &self.lighting;
        if !(l.lux_off_threshold > l.lux_dim_threshold
            && l.lux_dim_threshold > l.lux_mid_threshold
            && l.lux_mid_threshold >= 0.0)
        {
            return Err(ConfigError::ValidationFailed(
                "lux thresholds must be strictly descending off > dim > mid >= 0",
            ));
        }
        if l.level_motion == 0 {
            return Err(ConfigError::ValidationFailed("level_motion must be > 0"));
        }
        if !(100..=60_000).contains(&l.motion_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "motion_timeout_ms must be 100..=60000",
            ));
        }
        if l.rise_steps == 0 || l.fall_steps == 0 {
            return Err(ConfigError::ValidationFailed("ramp step counts must be > 0"));
        }
        if !(10..=1_000).contains(&l.tick_period_ms) {
            return Err(ConfigError::ValidationFailed("tick_period_ms must be 10..=1000"));
        }

        let s = &self.session;
        if s.max_retries == 0 {
            return Err(ConfigError::ValidationFailed("max_retries must be > 0"));
        }
        if s.cooldown_ms < s.rate_limit_ms {
            return Err(ConfigError::ValidationFailed(
                "cooldown_ms must be >= rate_limit_ms",
            ));
        }

        let n = &self.network;
        if n.device_id.is_empty() {
            return Err(ConfigError::ValidationFailed("device_id must not be empty"));
        }
        if !n.broker_url.starts_with("mqtt://") && !n.broker_url.starts_with("mqtts://") {
            return Err(ConfigError::ValidationFailed(
                "broker_url must use the mqtt:// or mqtts:// scheme",
            ));
        }

        let t = &self.tasks;
        if t.data_report_interval_ms == 0 || t.heartbeat_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("report intervals must be > 0"));
        }
        if t.watchdog_timeout_ms <= t.data_report_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "watchdog_timeout_ms must exceed the slowest task period",
            ));
        }
        Ok(())
    }
}

/// Build a fixed-capacity string from a literal that is known to fit.
fn fixed<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    // Literals above are all shorter than their capacity.
    let _ = out.push_str(s);
    out
}
