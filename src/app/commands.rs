//! Inbound control commands.
//!
//! Wire form on `device/{id}/control`:
//!
//! ```json
//! {"command": "set_brightness", "brightness": 40}
//! {"command": "set_auto_mode", "auto_mode": true}
//! ```
//!
//! Malformed JSON, unknown commands and out-of-range values are rejected
//! here and never reach the light controller.

use serde::Deserialize;

use crate::lighting::percent_to_level;

/// Commands the light controller accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    /// Switch to manual mode at a fixed 0..=255 level.
    SetBrightness { level: u8, percent: u8 },
    /// Enter (`true`) or leave (`false`) automatic mode.
    SetAutoMode(bool),
}

/// Why a control payload was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Not JSON, unknown `command`, or a required field is missing.
    Malformed,
    /// `brightness` outside 0..=100.
    OutOfRange,
}

impl core::fmt::Display for CommandError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed control payload"),
            Self::OutOfRange => write!(f, "brightness out of range"),
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum ControlMessage {
    // Wide integer so that e.g. -5 or 300 parse and are rejected as out of
    // range rather than as malformed.
    SetBrightness { brightness: i64 },
    SetAutoMode { auto_mode: bool },
}

impl AppCommand {
    /// Parse and range-check a control payload.
    pub fn parse(payload: &[u8]) -> Result<Self, CommandError> {
        let msg: ControlMessage =
            serde_json::from_slice(payload).map_err(|_| CommandError::Malformed)?;
        match msg {
            ControlMessage::SetBrightness { brightness } => {
                let percent = u8::try_from(brightness).map_err(|_| CommandError::OutOfRange)?;
                let level = percent_to_level(percent).ok_or(CommandError::OutOfRange)?;
                Ok(Self::SetBrightness { level, percent })
            }
            ControlMessage::SetAutoMode { auto_mode } => Ok(Self::SetAutoMode(auto_mode)),
        }
    }
}
