//! Port traits: the hexagonal boundary between node logic and hardware.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ SessionManager / LightService / Pm25Monitor
//! ```
//!
//! Adapters (ESP-MQTT, UART, LEDC, NVS, log) implement these traits. The
//! core consumes them through generics, so every state machine runs on the
//! host against mocks.
//!
//! ## Notes
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - **BrokerPort::connect** must classify authentication failures so the
//!   session manager can skip the incremental retries.

use crate::config::NodeConfig;

// ───────────────────────────────────────────────────────────────
// Broker port (driven adapter: session manager ↔ MQTT client)
// ───────────────────────────────────────────────────────────────

/// Minimal broker client surface used by [`SessionManager`](crate::session::SessionManager).
///
/// None of these calls may block for longer than the client's own connect
/// timeout; publish is fire-and-forget.
pub trait BrokerPort {
    /// Whether the underlying network link (Wi-Fi) is up.
    fn link_up(&self) -> bool;

    /// Whether the broker session is currently established.
    fn is_connected(&self) -> bool;

    /// Perform one connection attempt.
    fn connect(&mut self) -> Result<(), ConnectError>;

    /// Subscribe to a topic on the established session.
    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError>;

    /// Publish a payload, at most once.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError>;

    /// Pop one inbound message received on a subscribed topic, if any.
    fn take_inbound(&mut self) -> Option<InboundMessage>;
}

/// A message delivered on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: heapless::String<64>,
    pub payload: heapless::Vec<u8, 256>,
}

// ───────────────────────────────────────────────────────────────
// Serial port (driven adapter: UART → PM2.5 decoder)
// ───────────────────────────────────────────────────────────────

/// Non-blocking byte source.
pub trait SerialSource {
    /// Copy whatever is buffered (up to `buf.len()`) and return the count.
    /// `Ok(0)` means nothing is waiting.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, SerialError>;
}

// ───────────────────────────────────────────────────────────────
// Light port (driven adapter: level → PWM)
// ───────────────────────────────────────────────────────────────

pub trait LightPort {
    /// Drive the lamp at `level` (0 = off, 255 = full).
    fn set_level(&mut self, level: u8);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: core → logging)
// ───────────────────────────────────────────────────────────────

/// The node emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: config ↔ NVS)
// ───────────────────────────────────────────────────────────────

/// Loads and persists node configuration.
///
/// Implementations MUST call [`NodeConfig::validate`] before persisting and
/// reject invalid ranges with [`ConfigError::ValidationFailed`] instead of
/// clamping them.
pub trait ConfigPort {
    /// Load configuration. Returns [`NodeConfig::default()`] if nothing is
    /// stored yet.
    fn load(&self) -> Result<NodeConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &NodeConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Why a broker connection attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectError {
    /// Broker rejected the username/password (CONNACK 4).
    BadCredentials,
    /// Broker refused the client as not authorised (CONNACK 5).
    NotAuthorized,
    /// Broker refused for another protocol reason (CONNACK 1..3).
    Refused(u8),
    /// TCP connect or CONNACK did not arrive in time.
    Timeout,
    /// Network unreachable, DNS failure, socket error.
    Transport,
}

impl ConnectError {
    /// Authentication failures are not worth retrying inside one cooldown.
    pub const fn is_auth_failure(self) -> bool {
        matches!(self, Self::BadCredentials | Self::NotAuthorized)
    }

    /// Map an MQTT 3.1.1 CONNACK return code onto an error.
    /// `0` (accepted) is not an error and maps to `None`.
    pub const fn from_connack(code: u8) -> Option<Self> {
        match code {
            0 => None,
            4 => Some(Self::BadCredentials),
            5 => Some(Self::NotAuthorized),
            other => Some(Self::Refused(other)),
        }
    }

    /// Numeric code for logs, mirroring the client library's state codes.
    pub const fn code(self) -> i8 {
        match self {
            Self::Timeout => -4,
            Self::Transport => -2,
            Self::Refused(c) => c as i8,
            Self::BadCredentials => 4,
            Self::NotAuthorized => 5,
        }
    }
}

/// Errors from publish / subscribe on an established session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerError {
    NotConnected,
    /// Client queue full or enqueue rejected.
    Rejected,
    TopicTooLong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialError {
    /// Driver returned an error from the read call.
    Io(i32),
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored blob failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConnectError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BadCredentials => write!(f, "bad username or password"),
            Self::NotAuthorized => write!(f, "not authorized"),
            Self::Refused(code) => write!(f, "connection refused (code {code})"),
            Self::Timeout => write!(f, "connect timeout"),
            Self::Transport => write!(f, "transport error"),
        }
    }
}

impl core::fmt::Display for BrokerError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::Rejected => write!(f, "rejected by client"),
            Self::TopicTooLong => write!(f, "topic too long"),
        }
    }
}

impl core::fmt::Display for SerialError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Io(code) => write!(f, "serial I/O error {code}"),
        }
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
